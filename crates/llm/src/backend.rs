//! Ollama-style HTTP provider
//!
//! Speaks the local Ollama generate API. Transient failures retry with
//! exponential backoff; 4xx responses fail immediately.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use callsim_config::LlmSettings;
use callsim_core::{LlmProvider, LlmReply, LlmRequest, ProviderStatus, Result};

use crate::LlmError;

/// HTTP LLM provider against an Ollama endpoint
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    settings: LlmSettings,
}

impl OllamaProvider {
    /// Create a provider; fails only if the HTTP client cannot be built
    pub fn new(settings: LlmSettings) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.settings.endpoint, path)
    }

    async fn execute_request(
        &self,
        request: &OllamaGenerateRequest,
    ) -> std::result::Result<OllamaGenerateResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url("/generate"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            // 5xx errors are retryable, 4xx are not
            if status.is_server_error() {
                return Err(LlmError::Network(format!("server error {status}: {error}")));
            }
            return Err(LlmError::Api(error));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn execute(&self, request: LlmRequest) -> Result<LlmReply> {
        let start = Instant::now();

        let body = OllamaGenerateRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.settings.model.clone()),
            prompt: request.prompt.clone(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(request.temperature),
                num_predict: Some(request.max_tokens as i32),
            }),
        };

        let mut last_error = None;
        let mut backoff = Duration::from_millis(100);

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    "LLM request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.settings.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            if start.elapsed() >= request.timeout {
                break;
            }

            match self.execute_request(&body).await {
                Ok(result) => {
                    return Ok(LlmReply {
                        content: result.response,
                        provider: "ollama".to_string(),
                        duration_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Err(e) if Self::is_retryable(&e) => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Network("max retries exceeded".to_string()))
            .into())
    }

    async fn check_availability(&self) -> ProviderStatus {
        match self.client.get(self.api_url("/tags")).send().await {
            Ok(response) if response.status().is_success() => ProviderStatus::up("ollama"),
            Ok(response) => ProviderStatus::down("ollama", format!("status {}", response.status())),
            Err(e) => ProviderStatus::down("ollama", e.to_string()),
        }
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = OllamaProvider::new(LlmSettings::default()).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
    }

    #[test]
    fn test_api_url() {
        let provider = OllamaProvider::new(LlmSettings::default()).unwrap();
        assert_eq!(
            provider.api_url("/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn test_retryable_split() {
        assert!(OllamaProvider::is_retryable(&LlmError::Network("x".into())));
        assert!(OllamaProvider::is_retryable(&LlmError::Timeout));
        assert!(!OllamaProvider::is_retryable(&LlmError::Api("bad".into())));
    }
}
