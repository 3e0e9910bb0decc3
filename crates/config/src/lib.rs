//! Configuration management for the conversation test engine
//!
//! Supports loading configuration from:
//! - YAML/TOML files
//! - Environment variables (CALLSIM_ prefix)
//! - Runtime overrides

pub mod settings;

pub use settings::{
    ClassifierSettings, LlmSettings, ResponderSettings, Settings, TrackerSettings,
    load_settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
