//! Error types shared across the workspace

use thiserror::Error;

/// Core errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Classification error: {0}")]
    Classification(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tracker error: {0}")]
    Tracker(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Harness error: {0}")]
    Harness(String),

    #[error("Timeout")]
    Timeout,
}

/// Result alias using the core error
pub type Result<T> = std::result::Result<T, Error>;
