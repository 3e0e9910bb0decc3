//! Conversational anomaly types
//!
//! Anomalies are appended to the conversation's anomaly list as they are
//! detected and are never removed.

use serde::{Deserialize, Serialize};

use callsim_core::Severity;

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Transfer fired early with almost nothing collected
    UnexpectedTransfer,
    /// Booking confirmed before the identity basics were collected
    PrematureBooking,
    /// Same flow state repeating with zero fields collected
    StuckConversation,
    /// ABAB category pattern across the last four agent turns
    LoopDetected,
    /// Agent asked for something it was just given
    FieldAlreadyProvided,
    /// Caller gave a genuinely different value for an already-provided field
    Contradiction,
}

impl AnomalyKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            AnomalyKind::UnexpectedTransfer => Severity::High,
            AnomalyKind::PrematureBooking => Severity::High,
            AnomalyKind::StuckConversation => Severity::Medium,
            AnomalyKind::LoopDetected => Severity::Medium,
            AnomalyKind::FieldAlreadyProvided => Severity::Low,
            AnomalyKind::Contradiction => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::UnexpectedTransfer => "unexpected_transfer",
            AnomalyKind::PrematureBooking => "premature_booking",
            AnomalyKind::StuckConversation => "stuck_conversation",
            AnomalyKind::LoopDetected => "loop_detected",
            AnomalyKind::FieldAlreadyProvided => "field_already_provided",
            AnomalyKind::Contradiction => "contradiction",
        }
    }
}

/// One detected anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    /// Agent turn at which it was detected
    pub turn: u32,
    pub description: String,
    /// Structured context for downstream tooling
    #[serde(default)]
    pub context: serde_json::Value,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, turn: u32, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            turn,
            description: description.into(),
            context: serde_json::Value::Null,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}
