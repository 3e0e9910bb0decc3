//! Test-case runner for the conversation test engine
//!
//! Features:
//! - `TestCase` declaration (persona + goals + constraints + turn budget)
//! - `ConversationRunner`: the classify -> track -> respond turn loop
//! - `DialogueAgent` trait for the agent under test
//! - Structured failure reports

pub mod report;
pub mod runner;
pub mod test_case;

pub use report::{FailedGoal, FailureReport, ReportCounters};
pub use runner::{ConversationOutcome, ConversationRunner, DialogueAgent};
pub use test_case::TestCase;
