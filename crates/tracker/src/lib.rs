//! Conversation tracking and goal evaluation
//!
//! Features:
//! - Context tracker: field request history, repeat reasons, per-child
//!   sub-contexts, anomaly detection
//! - Progress tracker: flow-state machine, persistent flags, field
//!   collection, issue detection, per-turn goal evaluation
//! - Goal evaluator: final pass/fail verdict with constraint checking

pub mod anomaly;
pub mod context;
pub mod evaluator;
pub mod progress;

pub use anomaly::{Anomaly, AnomalyKind};
pub use context::{
    ChildContext, ContextTracker, ConversationContext, FieldRequest, ProvidedField,
    RepeatReason, TerminalEvent, TurnSnapshot, derive_age,
};
pub use evaluator::{evaluate_goal, GoalEvaluator};
pub use progress::{
    collectable_field_for, flow_state_for, CollectedField, IntentRecord, IssueKind,
    ProgressIssue, ProgressState, ProgressTracker,
};
