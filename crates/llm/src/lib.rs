//! LLM provider implementations
//!
//! Features:
//! - `OllamaProvider`: local Ollama HTTP backend with retry/backoff
//! - `ScriptedProvider`: deterministic canned-reply provider for tests

pub mod backend;
pub mod scripted;

pub use backend::OllamaProvider;
pub use scripted::ScriptedProvider;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for callsim_core::Error {
    fn from(err: LlmError) -> Self {
        callsim_core::Error::Llm(err.to_string())
    }
}
