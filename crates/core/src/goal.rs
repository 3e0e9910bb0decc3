//! Goals, constraints, and evaluation outputs
//!
//! A test case declares goals (what the conversation should achieve) and
//! constraints (what must or must not occur). Both are read-only during
//! execution; the tracker and evaluator produce the result types below.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classification::DataField;
use crate::intent::FlowState;

/// What kind of success a goal describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    DataCollection,
    BookingConfirmed,
    TransferInitiated,
    ConversationEnded,
    Custom,
}

/// Snapshot of conversation progress handed to custom goal predicates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalContext {
    /// Fields collected so far, with the caller's raw values
    pub collected: BTreeMap<DataField, String>,
    /// Persistent booking flag
    pub booking_confirmed: bool,
    /// Persistent transfer flag
    pub transfer_initiated: bool,
    /// Current flow state
    pub flow_state: FlowState,
    /// Agent turns processed so far
    pub turn_count: u32,
    /// Wall-clock time elapsed
    pub elapsed_ms: u64,
}

/// Predicate over a progress snapshot
pub type GoalPredicate = Arc<dyn Fn(&GoalContext) -> bool + Send + Sync>;

/// A declared success condition
#[derive(Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Stable identifier, referenced in results
    pub id: String,
    /// Goal type
    pub goal_type: GoalType,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Fields that must all be collected (data_collection goals)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<DataField>,
    /// Whether failing this goal fails the test
    #[serde(default = "default_required")]
    pub required: bool,
    /// Custom success predicate (custom goals)
    #[serde(skip)]
    pub predicate: Option<GoalPredicate>,
}

fn default_required() -> bool {
    true
}

impl Goal {
    pub fn new(id: impl Into<String>, goal_type: GoalType) -> Self {
        Self {
            id: id.into(),
            goal_type,
            description: String::new(),
            required_fields: Vec::new(),
            required: true,
            predicate: None,
        }
    }

    /// Goal requiring a set of collected fields
    pub fn data_collection(id: impl Into<String>, fields: Vec<DataField>) -> Self {
        let mut goal = Self::new(id, GoalType::DataCollection);
        goal.required_fields = fields;
        goal
    }

    /// Goal requiring a confirmed booking
    pub fn booking_confirmed(id: impl Into<String>) -> Self {
        Self::new(id, GoalType::BookingConfirmed)
    }

    /// Goal requiring an initiated transfer
    pub fn transfer_initiated(id: impl Into<String>) -> Self {
        Self::new(id, GoalType::TransferInitiated)
    }

    /// Goal requiring the conversation to have ended cleanly
    pub fn conversation_ended(id: impl Into<String>) -> Self {
        Self::new(id, GoalType::ConversationEnded)
    }

    /// Custom goal with a predicate over the progress snapshot
    pub fn custom(
        id: impl Into<String>,
        predicate: impl Fn(&GoalContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        let mut goal = Self::new(id, GoalType::Custom);
        goal.predicate = Some(Arc::new(predicate));
        goal
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl std::fmt::Debug for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Goal")
            .field("id", &self.id)
            .field("goal_type", &self.goal_type)
            .field("required_fields", &self.required_fields)
            .field("required", &self.required)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What kind of invariant a constraint declares
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Predicate must be true at the end
    MustHappen,
    /// Predicate must be false at the end
    MustNotHappen,
    /// Conversation must finish within this many agent turns
    MaxTurns(u32),
    /// Conversation must finish within this wall-clock budget
    MaxTimeMs(u64),
}

impl std::fmt::Debug for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::MustHappen => write!(f, "must_happen"),
            ConstraintKind::MustNotHappen => write!(f, "must_not_happen"),
            ConstraintKind::MaxTurns(n) => write!(f, "max_turns({n})"),
            ConstraintKind::MaxTimeMs(ms) => write!(f, "max_time_ms({ms})"),
        }
    }
}

/// A declared invariant contributing to the final verdict
#[derive(Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Stable identifier
    pub id: String,
    /// Constraint kind
    pub kind: ConstraintKind,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Severity when violated
    pub severity: Severity,
    /// Predicate for must_happen / must_not_happen
    #[serde(skip)]
    pub predicate: Option<GoalPredicate>,
}

impl Constraint {
    pub fn max_turns(id: impl Into<String>, turns: u32, severity: Severity) -> Self {
        Self {
            id: id.into(),
            kind: ConstraintKind::MaxTurns(turns),
            description: format!("conversation must finish within {turns} turns"),
            severity,
            predicate: None,
        }
    }

    pub fn max_time_ms(id: impl Into<String>, ms: u64, severity: Severity) -> Self {
        Self {
            id: id.into(),
            kind: ConstraintKind::MaxTimeMs(ms),
            description: format!("conversation must finish within {ms} ms"),
            severity,
            predicate: None,
        }
    }

    pub fn must_happen(
        id: impl Into<String>,
        severity: Severity,
        predicate: impl Fn(&GoalContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ConstraintKind::MustHappen,
            description: String::new(),
            severity,
            predicate: Some(Arc::new(predicate)),
        }
    }

    pub fn must_not_happen(
        id: impl Into<String>,
        severity: Severity,
        predicate: impl Fn(&GoalContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ConstraintKind::MustNotHappen,
            description: String::new(),
            severity,
            predicate: Some(Arc::new(predicate)),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Outcome of one goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalResult {
    pub goal_id: String,
    pub passed: bool,
    /// Required fields still missing (data_collection goals)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<DataField>,
    /// Why the goal passed or failed
    #[serde(default)]
    pub detail: String,
}

/// A violated constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint_id: String,
    pub severity: Severity,
    pub description: String,
    /// Transcript-aligned turn number (2 x internal turn), when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

/// Final verdict for one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalTestResult {
    pub passed: bool,
    pub goal_results: Vec<GoalResult>,
    pub violations: Vec<ConstraintViolation>,
    /// Diagnostic summary; not machine-parsed
    pub summary: String,
    /// Final progress snapshot
    pub final_context: GoalContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_builders() {
        let goal = Goal::data_collection(
            "collect-basics",
            vec![DataField::ParentPhone, DataField::ChildName],
        );
        assert_eq!(goal.goal_type, GoalType::DataCollection);
        assert!(goal.required);
        assert_eq!(goal.required_fields.len(), 2);

        let optional = Goal::booking_confirmed("book").optional();
        assert!(!optional.required);
    }

    #[test]
    fn test_custom_predicate() {
        let goal = Goal::custom("fast-finish", |ctx| ctx.turn_count <= 6);
        let mut ctx = GoalContext::default();
        ctx.turn_count = 4;
        assert!(goal.predicate.as_ref().unwrap()(&ctx));
        ctx.turn_count = 9;
        assert!(!goal.predicate.as_ref().unwrap()(&ctx));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_constraint_builders() {
        let c = Constraint::max_turns("turns", 10, Severity::High);
        assert!(matches!(c.kind, ConstraintKind::MaxTurns(10)));
        assert!(c.description.contains("10"));
    }
}
