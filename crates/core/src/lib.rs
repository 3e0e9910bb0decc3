//! Core types and traits for the conversation test engine
//!
//! This crate provides the foundational types used across all other crates:
//! - Classification vocabulary and results
//! - Conversation turns and transcripts
//! - Caller personas (the simulated caller's data inventory)
//! - Goals, constraints, and evaluation outputs
//! - The legacy intent / flow-state vocabulary for the progress tracker
//! - The `LlmProvider` trait boundary
//! - Error types

pub mod classification;
pub mod conversation;
pub mod error;
pub mod goal;
pub mod intent;
pub mod persona;
pub mod traits;

pub use classification::{
    ClassificationResult, ConfirmationSubject, DataField, ExpectedAnswer, ResponseCategory,
    TerminalState,
};
pub use conversation::{Transcript, Turn, TurnRole};
pub use error::{Error, Result};
pub use goal::{
    Constraint, ConstraintKind, ConstraintViolation, Goal, GoalContext, GoalPredicate,
    GoalResult, GoalTestResult, GoalType, Severity,
};
pub use intent::{FlowState, LegacyIntent};
pub use persona::{
    CallerPersona, ChildProfile, PersonaTemplates, SchedulingPreferences, TimeOfDay, Verbosity,
};
pub use traits::{LlmProvider, LlmReply, LlmRequest, ProviderStatus};
