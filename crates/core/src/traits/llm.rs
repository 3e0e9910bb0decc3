//! LLM provider trait
//!
//! The only operation in the engine that may block on external I/O. Callers
//! bound every `execute` with a timeout and fall back to deterministic
//! behavior on failure; an unavailable provider must never abort a turn.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One completion request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Full prompt text
    pub prompt: String,
    /// Model override; provider default when `None`
    pub model: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
    /// Hard deadline for the call
    pub timeout: Duration,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            max_tokens: 512,
            temperature: 0.1,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Successful completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmReply {
    /// Generated text
    pub content: String,
    /// Which provider produced it
    pub provider: String,
    /// Wall-clock duration of the call
    pub duration_ms: u64,
}

/// Result of an availability probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub available: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderStatus {
    pub fn up(provider: impl Into<String>) -> Self {
        Self {
            available: true,
            provider: provider.into(),
            error: None,
        }
    }

    pub fn down(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            available: false,
            provider: provider.into(),
            error: Some(error.into()),
        }
    }
}

/// Language model interface
///
/// Failures are typed results, never panics; `execute` must be safe to call
/// repeatedly.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion
    async fn execute(&self, request: LlmRequest) -> Result<LlmReply>;

    /// Probe whether the backend can serve requests right now
    async fn check_availability(&self) -> ProviderStatus;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn execute(&self, request: LlmRequest) -> Result<LlmReply> {
            Ok(LlmReply {
                content: request.prompt,
                provider: "echo".to_string(),
                duration_ms: 1,
            })
        }

        async fn check_availability(&self) -> ProviderStatus {
            ProviderStatus::up("echo")
        }

        fn provider_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_echo_provider() {
        let provider = EchoProvider;
        assert!(provider.check_availability().await.available);
        let reply = provider.execute(LlmRequest::new("hello")).await.unwrap();
        assert_eq!(reply.content, "hello");
    }

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("p")
            .with_model("m")
            .with_max_tokens(64)
            .with_temperature(0.0)
            .with_timeout(Duration::from_secs(8));
        assert_eq!(request.model.as_deref(), Some("m"));
        assert_eq!(request.max_tokens, 64);
        assert_eq!(request.timeout, Duration::from_secs(8));
    }
}
