//! Conversation progress tracker
//!
//! Maintains the authoritative field-collection / flow-state / goal state
//! for one conversation. The flow-state machine is a lookup, not a graph
//! walk: an intent with no mapping leaves the state unchanged. The two
//! persistent flags, once set, are never reset by later turns.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use callsim_config::TrackerSettings;
use callsim_core::{
    ClassificationResult, DataField, FlowState, Goal, GoalContext, LegacyIntent, Severity,
};

use crate::evaluator::evaluate_goal;

/// Flow state for an intent; `None` leaves the current state unchanged
pub fn flow_state_for(intent: LegacyIntent) -> Option<FlowState> {
    match intent {
        LegacyIntent::Greeting => Some(FlowState::Greeting),
        LegacyIntent::AskingParentName
        | LegacyIntent::AskingParentPhone
        | LegacyIntent::AskingParentEmail => Some(FlowState::CollectingParentInfo),
        LegacyIntent::AskingChildName | LegacyIntent::AskingChildDob => {
            Some(FlowState::CollectingChildInfo)
        }
        LegacyIntent::AskingHistory => Some(FlowState::CollectingHistory),
        LegacyIntent::AskingInsurance => Some(FlowState::CollectingInsurance),
        LegacyIntent::ProposingTimes => Some(FlowState::Scheduling),
        LegacyIntent::ConfirmingDetails => Some(FlowState::Booking),
        LegacyIntent::ConfirmingBooking => Some(FlowState::Confirmation),
        LegacyIntent::InitiatingTransfer => Some(FlowState::Transfer),
        LegacyIntent::SayingGoodbye => Some(FlowState::Ended),
        LegacyIntent::Acknowledging | LegacyIntent::Unknown => None,
    }
}

/// Collectable field an intent gathers; `None` collects nothing
pub fn collectable_field_for(intent: LegacyIntent) -> Option<DataField> {
    match intent {
        LegacyIntent::Greeting => Some(DataField::VisitReason),
        LegacyIntent::AskingParentName => Some(DataField::ParentName),
        LegacyIntent::AskingParentPhone => Some(DataField::ParentPhone),
        LegacyIntent::AskingParentEmail => Some(DataField::ParentEmail),
        LegacyIntent::AskingChildName => Some(DataField::ChildName),
        LegacyIntent::AskingChildDob => Some(DataField::ChildDob),
        LegacyIntent::AskingHistory => Some(DataField::PreviousVisit),
        LegacyIntent::AskingInsurance => Some(DataField::InsuranceProvider),
        LegacyIntent::ProposingTimes => Some(DataField::AppointmentTime),
        _ => None,
    }
}

/// A collected field with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedField {
    /// Raw caller reply that satisfied the field
    pub value: String,
    /// Turn of the first occurrence; canonical, never overwritten
    pub turn: u32,
    /// Whether the agent later confirmed it back
    pub confirmed: bool,
}

/// One entry of the intent history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRecord {
    pub intent: LegacyIntent,
    pub confidence: f32,
    pub turn: u32,
}

/// Issue kinds detected during progress updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Repeating,
    Stuck,
    UnknownIntent,
}

/// A detected issue, reported with transcript-aligned turn numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressIssue {
    pub kind: IssueKind,
    /// Transcript-aligned turn (2 x internal turn)
    pub turn: u32,
    pub severity: Severity,
    pub description: String,
}

/// Authoritative progress state for one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    /// Current internal turn number (agent turns, 1-based)
    pub turn: u32,
    pub intent_history: Vec<IntentRecord>,
    pub collected: HashMap<DataField, CollectedField>,
    /// Declared fields not yet collected
    pub pending: Vec<DataField>,
    pub flow_state: FlowState,
    pub completed_goals: Vec<String>,
    pub failed_goals: Vec<String>,
    pub issues: Vec<ProgressIssue>,
    /// Persistent: once true, never reset
    pub booking_confirmed: bool,
    /// Persistent: once true, never reset
    pub transfer_initiated: bool,
    pub started_at: DateTime<Utc>,
}

impl ProgressState {
    fn new(pending: Vec<DataField>) -> Self {
        Self {
            turn: 0,
            intent_history: Vec::new(),
            collected: HashMap::new(),
            pending,
            flow_state: FlowState::Greeting,
            completed_goals: Vec::new(),
            failed_goals: Vec::new(),
            issues: Vec::new(),
            booking_confirmed: false,
            transfer_initiated: false,
            started_at: Utc::now(),
        }
    }

    /// Snapshot handed to goal predicates and the evaluator
    pub fn goal_context(&self) -> GoalContext {
        GoalContext {
            collected: self
                .collected
                .iter()
                .map(|(field, c)| (*field, c.value.clone()))
                .collect(),
            booking_confirmed: self.booking_confirmed,
            transfer_initiated: self.transfer_initiated,
            flow_state: self.flow_state,
            turn_count: self.turn,
            elapsed_ms: (Utc::now() - self.started_at).num_milliseconds().max(0) as u64,
        }
    }

    pub fn last_intent(&self) -> Option<LegacyIntent> {
        self.intent_history.last().map(|r| r.intent)
    }
}

/// Tracks one conversation's progress against its goals
pub struct ProgressTracker {
    state: RwLock<ProgressState>,
    goals: Vec<Goal>,
    settings: TrackerSettings,
}

impl ProgressTracker {
    pub fn new(goals: Vec<Goal>, settings: TrackerSettings) -> Self {
        // Pending starts as the union of the data-collection goals' fields.
        let mut pending: Vec<DataField> = Vec::new();
        for goal in &goals {
            for field in &goal.required_fields {
                if !pending.contains(field) {
                    pending.push(*field);
                }
            }
        }

        Self {
            state: RwLock::new(ProgressState::new(pending)),
            goals,
            settings,
        }
    }

    /// Process one classified agent turn and the caller's reply to it
    pub fn update_progress(
        &self,
        classification: &ClassificationResult,
        user_reply: &str,
        turn: u32,
    ) {
        let intent = LegacyIntent::from_classification(classification);
        let mut state = self.state.write();

        state.turn = turn;
        state.intent_history.push(IntentRecord {
            intent,
            confidence: classification.confidence,
            turn,
        });

        // Persistent flags are set here and never cleared.
        match intent {
            LegacyIntent::ConfirmingBooking => state.booking_confirmed = true,
            LegacyIntent::InitiatingTransfer => state.transfer_initiated = true,
            _ => {}
        }

        if let Some(flow_state) = flow_state_for(intent) {
            state.flow_state = flow_state;
        }

        // First occurrence wins; later mentions never overwrite.
        if let Some(field) = collectable_field_for(intent) {
            if !state.collected.contains_key(&field) && !user_reply.trim().is_empty() {
                state.collected.insert(
                    field,
                    CollectedField {
                        value: user_reply.trim().to_string(),
                        turn,
                        confirmed: false,
                    },
                );
                state.pending.retain(|f| *f != field);
            }
        }

        if self.settings.issue_detection {
            self.detect_issues(&mut state, intent, classification.confidence, turn);
        }

        self.evaluate_goals(&mut state);
    }

    /// External injection: a booking was confirmed out of band
    pub fn mark_booking_confirmed(&self) {
        let mut state = self.state.write();
        state.booking_confirmed = true;
        self.evaluate_goals(&mut state);
    }

    /// External injection: a transfer was initiated out of band
    pub fn mark_transfer_initiated(&self) {
        let mut state = self.state.write();
        state.transfer_initiated = true;
        self.evaluate_goals(&mut state);
    }

    /// Clone of the full progress state
    pub fn state(&self) -> ProgressState {
        self.state.read().clone()
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn is_goal_completed(&self, id: &str) -> bool {
        self.state.read().completed_goals.iter().any(|g| g == id)
    }

    fn detect_issues(
        &self,
        state: &mut ProgressState,
        intent: LegacyIntent,
        confidence: f32,
        turn: u32,
    ) {
        let reported_turn = 2 * turn;

        // repeating: the same intent across the last N consecutive turns
        let window = self.settings.max_repetition_count;
        if state.intent_history.len() >= window {
            let tail = &state.intent_history[state.intent_history.len() - window..];
            if tail.iter().all(|r| r.intent == intent)
                && intent != LegacyIntent::Acknowledging
                && intent != LegacyIntent::Unknown
            {
                state.issues.push(ProgressIssue {
                    kind: IssueKind::Repeating,
                    turn: reported_turn,
                    severity: Severity::Medium,
                    description: format!("intent {intent} repeated over the last {window} turns"),
                });
            }
        }

        // stuck: past the threshold with nothing collected (flagged once)
        if turn >= self.settings.stuck_threshold
            && state.collected.is_empty()
            && !state.issues.iter().any(|i| i.kind == IssueKind::Stuck)
        {
            state.issues.push(ProgressIssue {
                kind: IssueKind::Stuck,
                turn: reported_turn,
                severity: Severity::High,
                description: format!("no fields collected after {turn} turns"),
            });
        }

        // unknown intent with low confidence
        if intent == LegacyIntent::Unknown && confidence < 0.5 {
            state.issues.push(ProgressIssue {
                kind: IssueKind::UnknownIntent,
                turn: reported_turn,
                severity: Severity::Low,
                description: format!("unclassifiable agent turn (confidence {confidence:.2})"),
            });
        }
    }

    /// Re-evaluate all goals not yet completed. A goal in `completed_goals`
    /// is never re-evaluated or removed.
    fn evaluate_goals(&self, state: &mut ProgressState) {
        let ctx = state.goal_context();
        let last_intent = state.last_intent();

        for goal in &self.goals {
            if state.completed_goals.iter().any(|g| *g == goal.id)
                || state.failed_goals.iter().any(|g| *g == goal.id)
            {
                continue;
            }
            let result = evaluate_goal(goal, &ctx, last_intent, &state.completed_goals);
            if result.passed {
                tracing::debug!(goal = %goal.id, "goal completed");
                state.completed_goals.push(goal.id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsim_core::{ResponseCategory, TerminalState};

    fn classification(category: ResponseCategory, fields: &[DataField]) -> ClassificationResult {
        ClassificationResult::new(category, 0.85).with_fields(fields.to_vec())
    }

    fn tracker_with(goals: Vec<Goal>) -> ProgressTracker {
        ProgressTracker::new(goals, TrackerSettings::default())
    }

    #[test]
    fn test_flow_state_lookup() {
        assert_eq!(
            flow_state_for(LegacyIntent::AskingParentPhone),
            Some(FlowState::CollectingParentInfo)
        );
        assert_eq!(flow_state_for(LegacyIntent::Acknowledging), None);
    }

    #[test]
    fn test_field_collection_first_wins() {
        let t = tracker_with(vec![Goal::data_collection(
            "basics",
            vec![DataField::ParentPhone],
        )]);

        let c = classification(ResponseCategory::ProvideData, &[DataField::ParentPhone]);
        t.update_progress(&c, "555-0182", 1);
        t.update_progress(&c, "555-9999", 2);

        let state = t.state();
        let collected = state.collected.get(&DataField::ParentPhone).unwrap();
        assert_eq!(collected.value, "555-0182");
        assert_eq!(collected.turn, 1);
        assert!(!state.pending.contains(&DataField::ParentPhone));
    }

    #[test]
    fn test_persistent_flag_monotonicity() {
        let t = tracker_with(vec![Goal::booking_confirmed("booked")]);

        let booking = ClassificationResult::new(ResponseCategory::Acknowledge, 0.95)
            .with_terminal(TerminalState::BookingConfirmed);
        t.update_progress(&booking, "great, thanks", 4);
        assert!(t.state().booking_confirmed);
        assert!(t.is_goal_completed("booked"));

        // A goodbye after booking must not erase the booking fact.
        let goodbye = ClassificationResult::new(ResponseCategory::Acknowledge, 0.9)
            .with_terminal(TerminalState::ConversationEnded);
        t.update_progress(&goodbye, "", 5);

        let state = t.state();
        assert!(state.booking_confirmed);
        assert_eq!(state.flow_state, FlowState::Ended);
        assert!(t.is_goal_completed("booked"));
    }

    #[test]
    fn test_goal_completed_stays_completed() {
        let t = tracker_with(vec![Goal::data_collection(
            "phone",
            vec![DataField::ParentPhone],
        )]);
        let c = classification(ResponseCategory::ProvideData, &[DataField::ParentPhone]);
        t.update_progress(&c, "555-0182", 1);
        assert!(t.is_goal_completed("phone"));

        // more turns do not remove it
        let other = classification(ResponseCategory::ProvideData, &[DataField::ChildName]);
        t.update_progress(&other, "Mia", 2);
        assert!(t.is_goal_completed("phone"));
        assert_eq!(t.state().completed_goals.len(), 1);
    }

    #[test]
    fn test_repeating_issue_turn_alignment() {
        let t = tracker_with(vec![]);
        let c = classification(ResponseCategory::ProvideData, &[DataField::ParentPhone]);
        // Same intent with empty replies so nothing is collected and the
        // intent keeps repeating.
        t.update_progress(&c, "", 1);
        t.update_progress(&c, "", 2);

        let state = t.state();
        let issue = state
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::Repeating)
            .unwrap();
        assert_eq!(issue.turn, 4); // 2 x internal turn 2
    }

    #[test]
    fn test_stuck_issue_flagged_once() {
        let t = tracker_with(vec![]);
        let c = ClassificationResult::new(ResponseCategory::Acknowledge, 0.9);
        for turn in 1..=7 {
            t.update_progress(&c, "", turn);
        }
        let stuck = t
            .state()
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::Stuck)
            .count();
        assert_eq!(stuck, 1);
    }

    #[test]
    fn test_unknown_intent_issue() {
        let t = tracker_with(vec![]);
        let c = ClassificationResult::new(ResponseCategory::ProvideData, 0.3)
            .with_fields(vec![DataField::Unknown]);
        t.update_progress(&c, "what?", 1);
        assert!(t
            .state()
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::UnknownIntent));
    }

    #[test]
    fn test_external_injection() {
        let t = tracker_with(vec![Goal::transfer_initiated("handoff")]);
        t.mark_transfer_initiated();
        assert!(t.state().transfer_initiated);
        assert!(t.is_goal_completed("handoff"));
    }

    #[test]
    fn test_unmapped_intent_keeps_flow_state() {
        let t = tracker_with(vec![]);
        let ask = classification(ResponseCategory::ProvideData, &[DataField::ParentPhone]);
        t.update_progress(&ask, "555-0182", 1);
        assert_eq!(t.state().flow_state, FlowState::CollectingParentInfo);

        let ack = ClassificationResult::new(ResponseCategory::Acknowledge, 0.9);
        t.update_progress(&ack, "ok", 2);
        assert_eq!(t.state().flow_state, FlowState::CollectingParentInfo);
    }
}
