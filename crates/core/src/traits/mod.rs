//! Traits for pluggable external collaborators

mod llm;

pub use llm::{LlmProvider, LlmReply, LlmRequest, ProviderStatus};
