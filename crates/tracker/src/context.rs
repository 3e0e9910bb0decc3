//! Conversation context tracker
//!
//! Accumulates per-conversation state independent of the progress tracker:
//! which fields the agent asked for (and how often), what the caller has
//! provided, per-child sub-contexts, and the anomaly list. Never throws;
//! unknown fields are ignored.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use callsim_config::TrackerSettings;
use callsim_core::{
    ClassificationResult, DataField, FlowState, LegacyIntent, ResponseCategory, TerminalState,
};

use crate::anomaly::{Anomaly, AnomalyKind};
use crate::progress::flow_state_for;

/// Why a field had to be requested again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatReason {
    ClarificationNeeded,
    UserCorrection,
    ContextSwitch,
    AgentConfirmation,
    Unknown,
}

/// Request history for one data field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldRequest {
    /// Agent turns at which the field was requested
    pub turns: Vec<u32>,
    /// Active child index at each request
    pub child_indices: Vec<usize>,
    /// Flagged exactly once when the repeat threshold is reached
    pub was_repeated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_reason: Option<RepeatReason>,
}

/// A value the caller provided
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidedField {
    /// Current value (latest mention)
    pub value: String,
    /// Value from the first mention, kept for contradiction detection
    pub first_value: String,
    /// Turn of the first mention; later mentions never overwrite this
    pub first_turn: u32,
    /// Turn of the latest mention
    pub last_turn: u32,
}

/// Per-child sub-context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    /// Age in years, derived from the DOB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Other child-specific fields
    #[serde(default)]
    pub fields: HashMap<DataField, String>,
    /// Whether a booking was completed for this child
    #[serde(default)]
    pub booked: bool,
}

/// Snapshot of one agent turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub turn: u32,
    pub category: ResponseCategory,
    pub intent: LegacyIntent,
    pub flow_state: FlowState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_fields: Vec<DataField>,
}

/// Terminal event, recorded once
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerminalEvent {
    pub state: TerminalState,
    pub turn: u32,
}

/// The full per-conversation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    pub field_requests: HashMap<DataField, FieldRequest>,
    pub fields_provided: HashMap<DataField, ProvidedField>,
    pub children: BTreeMap<usize, ChildContext>,
    pub active_child: usize,
    pub snapshots: Vec<TurnSnapshot>,
    /// Caller replies, kept for repeat-reason inference
    pub user_replies: Vec<(u32, String)>,
    pub anomalies: Vec<Anomaly>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalEvent>,
}

impl ConversationContext {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            field_requests: HashMap::new(),
            fields_provided: HashMap::new(),
            children: BTreeMap::new(),
            active_child: 0,
            snapshots: Vec::new(),
            user_replies: Vec::new(),
            anomalies: Vec::new(),
            terminal: None,
        }
    }
}

const HEDGE_MARKERS: &[&str] = &["i think", "maybe", "not sure", "i guess", "um,", "uh,", "possibly"];
const CORRECTION_MARKERS: &[&str] = &["actually", "wait", "no,"];

/// Tracks one conversation's context
pub struct ContextTracker {
    ctx: RwLock<ConversationContext>,
    settings: TrackerSettings,
}

impl ContextTracker {
    pub fn new(session_id: impl Into<String>, settings: TrackerSettings) -> Self {
        Self {
            ctx: RwLock::new(ConversationContext::new(session_id.into())),
            settings,
        }
    }

    /// Record one classified agent turn
    pub fn record_agent_turn(&self, turn: u32, classification: &ClassificationResult) {
        let mut ctx = self.ctx.write();
        let intent = LegacyIntent::from_classification(classification);
        let flow_state = flow_state_for(intent)
            .or_else(|| ctx.snapshots.last().map(|s| s.flow_state))
            .unwrap_or_default();

        // Field-already-provided must look at state prior to this request.
        let already_provided: Vec<DataField> = classification
            .requested_fields
            .iter()
            .copied()
            .filter(|field| {
                ctx.fields_provided
                    .get(field)
                    .map(|p| p.last_turn + 2 >= turn)
                    .unwrap_or(false)
            })
            .collect();

        for &field in &classification.requested_fields {
            if field == DataField::Unknown {
                continue;
            }
            let active_child = ctx.active_child;
            let needs_repeat_flag = {
                let request = ctx.field_requests.entry(field).or_default();
                request.turns.push(turn);
                request.child_indices.push(active_child);
                request.turns.len() >= self.settings.max_repetition_count && !request.was_repeated
            };

            if needs_repeat_flag {
                let reason = Self::infer_repeat_reason(&ctx, field);
                if let Some(request) = ctx.field_requests.get_mut(&field) {
                    request.was_repeated = true;
                    request.repeat_reason = Some(reason);
                }
                tracing::debug!(field = field.as_str(), ?reason, "field request repeated");
            }
        }

        ctx.snapshots.push(TurnSnapshot {
            turn,
            category: classification.category,
            intent,
            flow_state,
            requested_fields: classification.requested_fields.clone(),
        });

        if classification.terminal_state.is_terminal() && ctx.terminal.is_none() {
            ctx.terminal = Some(TerminalEvent {
                state: classification.terminal_state,
                turn,
            });
        }

        if self.settings.anomaly_detection {
            self.detect_anomalies(&mut ctx, turn, classification, &already_provided);
        }
    }

    /// Record the caller's reply and the fields it provided
    pub fn record_user_turn(&self, turn: u32, reply: &str, provided: &[(DataField, String)]) {
        let mut ctx = self.ctx.write();
        ctx.user_replies.push((turn, reply.to_string()));

        for (field, value) in provided {
            if *field == DataField::Unknown {
                continue;
            }

            match ctx.fields_provided.get_mut(field) {
                Some(existing) => {
                    if normalize_value(&existing.value) != normalize_value(value) {
                        let anomaly = Anomaly::new(
                            AnomalyKind::Contradiction,
                            turn,
                            format!(
                                "field {} changed from '{}' to '{}'",
                                field, existing.value, value
                            ),
                        )
                        .with_context(serde_json::json!({
                            "field": field.as_str(),
                            "previous": existing.value,
                            "current": value,
                            "first_turn": existing.first_turn,
                        }));
                        existing.value = value.clone();
                        existing.last_turn = turn;
                        ctx.anomalies.push(anomaly);
                    } else {
                        existing.last_turn = turn;
                    }
                }
                None => {
                    ctx.fields_provided.insert(
                        *field,
                        ProvidedField {
                            value: value.clone(),
                            first_value: value.clone(),
                            first_turn: turn,
                            last_turn: turn,
                        },
                    );
                }
            }

            if field.is_child_specific() {
                let index = ctx.active_child;
                let child = ctx.children.entry(index).or_default();
                match field {
                    DataField::ChildName => child.name = Some(value.clone()),
                    DataField::ChildDob => {
                        child.dob = Some(value.clone());
                        child.age = derive_age(value);
                    }
                    DataField::ChildAge => child.age = value.trim().parse().ok(),
                    _ => {
                        child.fields.insert(*field, value.clone());
                    }
                }
            }
        }
    }

    /// Switch the child under discussion
    pub fn set_active_child(&self, index: usize) {
        let mut ctx = self.ctx.write();
        ctx.active_child = index;
        ctx.children.entry(index).or_default();
    }

    /// Mark the active child's booking complete
    pub fn mark_child_booked(&self) {
        let mut ctx = self.ctx.write();
        let index = ctx.active_child;
        ctx.children.entry(index).or_default().booked = true;
    }

    /// Clone of the full context
    pub fn context(&self) -> ConversationContext {
        self.ctx.read().clone()
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.ctx.read().anomalies.clone()
    }

    pub fn request_history(&self, field: DataField) -> Option<FieldRequest> {
        self.ctx.read().field_requests.get(&field).cloned()
    }

    pub fn provided(&self, field: DataField) -> Option<ProvidedField> {
        self.ctx.read().fields_provided.get(&field).cloned()
    }

    fn infer_repeat_reason(ctx: &ConversationContext, field: DataField) -> RepeatReason {
        // Inspect the last three caller replies for hedges and corrections.
        let recent: Vec<&str> = ctx
            .user_replies
            .iter()
            .rev()
            .take(3)
            .map(|(_, text)| text.as_str())
            .collect();

        let contains_any = |markers: &[&str]| {
            recent.iter().any(|reply| {
                let lower = reply.to_lowercase();
                markers.iter().any(|m| lower.contains(m))
            })
        };

        if contains_any(HEDGE_MARKERS) {
            return RepeatReason::ClarificationNeeded;
        }
        if contains_any(CORRECTION_MARKERS) {
            return RepeatReason::UserCorrection;
        }

        if let Some(request) = ctx.field_requests.get(&field) {
            let n = request.child_indices.len();
            if n >= 2 && request.child_indices[n - 1] != request.child_indices[n - 2] {
                return RepeatReason::ContextSwitch;
            }
        }

        if let Some(previous) = ctx.snapshots.last() {
            if previous.category == ResponseCategory::ConfirmOrDeny {
                return RepeatReason::AgentConfirmation;
            }
        }

        RepeatReason::Unknown
    }

    fn detect_anomalies(
        &self,
        ctx: &mut ConversationContext,
        turn: u32,
        classification: &ClassificationResult,
        already_provided: &[DataField],
    ) {
        // unexpected_transfer: transfer fired early with almost nothing collected
        if classification.terminal_state == TerminalState::TransferInitiated
            && turn < 5
            && ctx.fields_provided.len() < 3
        {
            ctx.anomalies.push(
                Anomaly::new(
                    AnomalyKind::UnexpectedTransfer,
                    turn,
                    format!(
                        "transfer at turn {turn} with only {} fields collected",
                        ctx.fields_provided.len()
                    ),
                )
                .with_context(serde_json::json!({
                    "fields_collected": ctx.fields_provided.len(),
                })),
            );
        }

        // premature_booking: booking confirmed before the identity basics
        if classification.terminal_state == TerminalState::BookingConfirmed {
            let missing: Vec<&str> = [DataField::ParentName, DataField::ParentPhone, DataField::ChildName]
                .iter()
                .filter(|f| !ctx.fields_provided.contains_key(*f))
                .map(|f| f.as_str())
                .collect();
            if !missing.is_empty() {
                ctx.anomalies.push(
                    Anomaly::new(
                        AnomalyKind::PrematureBooking,
                        turn,
                        format!("booking confirmed with {} still unprovided", missing.join(", ")),
                    )
                    .with_context(serde_json::json!({ "missing": missing })),
                );
            }
        }

        // stuck_conversation: identical flow states, nothing collected (flagged once)
        let stuck_window = self.settings.stuck_threshold as usize;
        if turn >= self.settings.stuck_threshold
            && ctx.fields_provided.is_empty()
            && ctx.snapshots.len() >= stuck_window
            && !ctx
                .anomalies
                .iter()
                .any(|a| a.kind == AnomalyKind::StuckConversation)
        {
            let tail = &ctx.snapshots[ctx.snapshots.len() - stuck_window..];
            let first = tail[0].flow_state;
            if tail.iter().all(|s| s.flow_state == first) {
                ctx.anomalies.push(
                    Anomaly::new(
                        AnomalyKind::StuckConversation,
                        turn,
                        format!("flow state {first} unchanged for {stuck_window} turns with no fields collected"),
                    )
                    .with_context(serde_json::json!({ "flow_state": first.as_str() })),
                );
            }
        }

        // loop_detected: ABAB category pattern over the last 4 agent turns
        if ctx.snapshots.len() >= 4
            && !ctx
                .anomalies
                .iter()
                .any(|a| a.kind == AnomalyKind::LoopDetected && a.turn + 2 > turn)
        {
            let tail = &ctx.snapshots[ctx.snapshots.len() - 4..];
            if tail[0].category == tail[2].category && tail[1].category == tail[3].category {
                ctx.anomalies.push(
                    Anomaly::new(
                        AnomalyKind::LoopDetected,
                        turn,
                        format!(
                            "repeating {}/{} pattern over the last 4 turns",
                            tail[0].category, tail[1].category
                        ),
                    )
                    .with_context(serde_json::json!({
                        "pattern": [tail[0].category.as_str(), tail[1].category.as_str()],
                    })),
                );
            }
        }

        // field_already_provided: agent re-requested something it was just given
        for field in already_provided {
            ctx.anomalies.push(
                Anomaly::new(
                    AnomalyKind::FieldAlreadyProvided,
                    turn,
                    format!("agent asked for {field} which was provided within the last 2 turns"),
                )
                .with_context(serde_json::json!({ "field": field.as_str() })),
            );
        }
    }
}

fn normalize_value(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Derive age in whole years from a DOB string ("YYYY-MM-DD" or "MM/DD/YYYY")
pub fn derive_age(dob: &str) -> Option<u32> {
    let dob = dob.trim();
    let parsed = NaiveDate::parse_from_str(dob, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(dob, "%m/%d/%Y"))
        .ok()?;
    let today = Utc::now().date_naive();
    let mut age = today.year() - parsed.year();
    if (today.month(), today.day()) < (parsed.month(), parsed.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsim_core::{ClassificationResult, ResponseCategory};

    fn tracker() -> ContextTracker {
        ContextTracker::new("test-session", TrackerSettings::default())
    }

    fn ask(fields: &[DataField]) -> ClassificationResult {
        ClassificationResult::new(ResponseCategory::ProvideData, 0.85)
            .with_fields(fields.to_vec())
    }

    #[test]
    fn test_repetition_flagged_exactly_once() {
        let t = tracker();
        t.record_agent_turn(1, &ask(&[DataField::ParentPhone]));
        t.record_user_turn(1, "555-0182", &[(DataField::ParentPhone, "555-0182".into())]);
        t.record_agent_turn(3, &ask(&[DataField::ParentPhone]));

        let request = t.request_history(DataField::ParentPhone).unwrap();
        assert!(request.was_repeated);
        assert_eq!(request.turns, vec![1, 3]);
        let first_reason = request.repeat_reason;
        assert!(first_reason.is_some());

        // a third request neither re-flags nor changes the reason
        t.record_agent_turn(5, &ask(&[DataField::ParentPhone]));
        let request = t.request_history(DataField::ParentPhone).unwrap();
        assert!(request.was_repeated);
        assert_eq!(request.turns, vec![1, 3, 5]);
        assert_eq!(request.repeat_reason, first_reason);
    }

    #[test]
    fn test_repeat_reason_user_correction() {
        let t = tracker();
        t.record_agent_turn(1, &ask(&[DataField::ChildDob]));
        t.record_user_turn(1, "Actually, wait, it's June not July", &[]);
        t.record_agent_turn(2, &ask(&[DataField::ChildDob]));

        let request = t.request_history(DataField::ChildDob).unwrap();
        assert_eq!(request.repeat_reason, Some(RepeatReason::UserCorrection));
    }

    #[test]
    fn test_repeat_reason_clarification() {
        let t = tracker();
        t.record_agent_turn(1, &ask(&[DataField::InsuranceProvider]));
        t.record_user_turn(1, "Um, I think it's Delta maybe?", &[]);
        t.record_agent_turn(2, &ask(&[DataField::InsuranceProvider]));

        let request = t.request_history(DataField::InsuranceProvider).unwrap();
        assert_eq!(
            request.repeat_reason,
            Some(RepeatReason::ClarificationNeeded)
        );
    }

    #[test]
    fn test_repeat_reason_context_switch() {
        let t = tracker();
        t.record_agent_turn(1, &ask(&[DataField::ChildName]));
        t.record_user_turn(1, "Arjun", &[(DataField::ChildName, "Arjun".into())]);
        t.set_active_child(1);
        t.record_agent_turn(4, &ask(&[DataField::ChildName]));

        let request = t.request_history(DataField::ChildName).unwrap();
        assert_eq!(request.repeat_reason, Some(RepeatReason::ContextSwitch));
    }

    #[test]
    fn test_contradiction_only_on_real_change() {
        let t = tracker();
        t.record_user_turn(1, "555-0182", &[(DataField::ParentPhone, "555-0182".into())]);
        // formatting difference only
        t.record_user_turn(2, "555 0182", &[(DataField::ParentPhone, "555 0182".into())]);
        assert!(t.anomalies().is_empty());

        t.record_user_turn(3, "555-9999", &[(DataField::ParentPhone, "555-9999".into())]);
        let anomalies = t.anomalies();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::Contradiction);

        // first provenance preserved
        let provided = t.provided(DataField::ParentPhone).unwrap();
        assert_eq!(provided.first_turn, 1);
        assert_eq!(provided.first_value, "555-0182");
        assert_eq!(provided.value, "555-9999");
    }

    #[test]
    fn test_child_age_derived_from_dob() {
        let t = tracker();
        t.record_user_turn(1, "2014-06-21", &[(DataField::ChildDob, "2014-06-21".into())]);
        let ctx = t.context();
        let child = ctx.children.get(&0).unwrap();
        assert_eq!(child.dob.as_deref(), Some("2014-06-21"));
        assert!(child.age.unwrap() >= 10);
    }

    #[test]
    fn test_unexpected_transfer_anomaly() {
        let t = tracker();
        let c = ClassificationResult::new(ResponseCategory::Acknowledge, 0.95)
            .with_terminal(TerminalState::TransferInitiated);
        t.record_agent_turn(2, &c);
        assert!(t
            .anomalies()
            .iter()
            .any(|a| a.kind == AnomalyKind::UnexpectedTransfer));
    }

    #[test]
    fn test_premature_booking_anomaly() {
        let t = tracker();
        t.record_user_turn(1, "Dana", &[(DataField::ParentName, "Dana Reyes".into())]);
        let c = ClassificationResult::new(ResponseCategory::Acknowledge, 0.95)
            .with_terminal(TerminalState::BookingConfirmed);
        t.record_agent_turn(2, &c);

        let anomalies = t.anomalies();
        let premature = anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::PrematureBooking)
            .unwrap();
        assert!(premature.description.contains("parent_phone"));
        assert!(premature.description.contains("child_name"));
    }

    #[test]
    fn test_loop_detected() {
        let t = tracker();
        for turn in 1..=4 {
            let c = if turn % 2 == 1 {
                ask(&[DataField::ParentPhone])
            } else {
                ClassificationResult::new(ResponseCategory::ConfirmOrDeny, 0.85)
            };
            t.record_agent_turn(turn, &c);
        }
        assert!(t.anomalies().iter().any(|a| a.kind == AnomalyKind::LoopDetected));
    }

    #[test]
    fn test_stuck_conversation() {
        let t = tracker();
        for turn in 1..=5 {
            t.record_agent_turn(turn, &ask(&[DataField::ParentPhone]));
        }
        let anomalies = t.anomalies();
        assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::StuckConversation));
        // flagged once even as the stall continues
        t.record_agent_turn(6, &ask(&[DataField::ParentPhone]));
        let count = t
            .anomalies()
            .iter()
            .filter(|a| a.kind == AnomalyKind::StuckConversation)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_field_already_provided() {
        let t = tracker();
        t.record_user_turn(3, "555-0182", &[(DataField::ParentPhone, "555-0182".into())]);
        t.record_agent_turn(4, &ask(&[DataField::ParentPhone]));
        assert!(t
            .anomalies()
            .iter()
            .any(|a| a.kind == AnomalyKind::FieldAlreadyProvided));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let t = tracker();
        t.record_agent_turn(1, &ask(&[DataField::Unknown]));
        t.record_user_turn(1, "anything", &[(DataField::Unknown, "anything".into())]);
        let ctx = t.context();
        assert!(ctx.field_requests.is_empty());
        assert!(ctx.fields_provided.is_empty());
    }

    #[test]
    fn test_derive_age_formats() {
        assert!(derive_age("2014-06-21").is_some());
        assert!(derive_age("06/21/2014").is_some());
        assert!(derive_age("sometime in June").is_none());
    }
}
