//! Two-tier response classifier
//!
//! Tier 1 is the deterministic rule matcher; Tier 2 is the LLM fallback,
//! consulted only below the confidence threshold and only while the
//! provider reports itself available. `classify` is total: loss of the LLM
//! can never abort classification.

use std::sync::Arc;
use std::time::Duration;

use callsim_core::{CallerPersona, ClassificationResult, LlmProvider, Transcript};
use callsim_config::ClassifierSettings;

use crate::cache::ClassificationCache;
use crate::tier1::PatternMatcher;
use crate::tier2::LlmTier;

/// The classifier's public face
pub struct ResponseClassifier {
    matcher: PatternMatcher,
    llm: Option<LlmTier>,
    cache: ClassificationCache,
    settings: ClassifierSettings,
}

impl ResponseClassifier {
    /// Deterministic-only classifier (no LLM tier)
    pub fn new(settings: ClassifierSettings) -> Self {
        let cache = ClassificationCache::new(
            settings.cache_capacity,
            Duration::from_secs(settings.cache_ttl_seconds),
        );
        Self {
            matcher: PatternMatcher::new(),
            llm: None,
            cache,
            settings,
        }
    }

    /// Classifier with the LLM fallback tier attached
    pub fn with_provider(settings: ClassifierSettings, provider: Arc<dyn LlmProvider>) -> Self {
        let mut classifier = Self::new(settings.clone());
        classifier.llm = Some(LlmTier::new(provider, settings));
        classifier
    }

    /// Swap in a custom rule table (tests, domain variants)
    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Classify one agent utterance. Total: always returns a result.
    pub async fn classify(
        &self,
        utterance: &str,
        history: &Transcript,
        persona: &CallerPersona,
    ) -> ClassificationResult {
        if let Some(hit) = self.cache.get(utterance) {
            tracing::debug!("classification cache hit");
            return hit;
        }

        let tier1 = self.matcher.classify(utterance);

        let result = if tier1.confidence >= self.settings.confidence_threshold {
            tier1
        } else {
            self.try_llm(utterance, history, persona, tier1).await
        };

        self.cache.insert(utterance, result.clone());
        result
    }

    async fn try_llm(
        &self,
        utterance: &str,
        history: &Transcript,
        persona: &CallerPersona,
        tier1: ClassificationResult,
    ) -> ClassificationResult {
        let Some(llm) = &self.llm else {
            return tier1;
        };

        let status = llm.provider().check_availability().await;
        if !status.available {
            tracing::debug!(
                provider = %status.provider,
                "LLM unavailable, keeping Tier-1 result"
            );
            return tier1;
        }

        match llm.classify(utterance, history, persona).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "LLM classification failed, keeping Tier-1 result");
                tier1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use callsim_core::{
        Error, LlmReply, LlmRequest, PersonaTemplates, ProviderStatus, ResponseCategory, Result,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that replays one canned reply and counts executions
    struct CountingProvider {
        reply: String,
        calls: AtomicUsize,
        available: bool,
    }

    impl CountingProvider {
        fn new(reply: &str, available: bool) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                available,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        async fn execute(&self, _request: LlmRequest) -> Result<LlmReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LlmReply {
                content: self.reply.clone(),
                provider: "counting".to_string(),
                duration_ms: 1,
            })
        }

        async fn check_availability(&self) -> ProviderStatus {
            if self.available {
                ProviderStatus::up("counting")
            } else {
                ProviderStatus::down("counting", "offline")
            }
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn execute(&self, _request: LlmRequest) -> Result<LlmReply> {
            Err(Error::Llm("boom".to_string()))
        }

        async fn check_availability(&self) -> ProviderStatus {
            ProviderStatus::up("failing")
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    fn settings() -> ClassifierSettings {
        ClassifierSettings::default()
    }

    #[tokio::test]
    async fn test_threshold_gating() {
        // High-confidence Tier-1 match: the provider must never be called.
        let provider = Arc::new(CountingProvider::new(
            r#"{"category": "acknowledge", "confidence": 0.9}"#,
            true,
        ));
        let classifier = ResponseClassifier::with_provider(settings(), provider.clone());

        let result = classifier
            .classify(
                "Can I have your phone number?",
                &Transcript::new(),
                &PersonaTemplates::new_patient_parent(),
            )
            .await;

        assert_eq!(result.category, ResponseCategory::ProvideData);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_consulted_below_threshold() {
        let provider = Arc::new(CountingProvider::new(
            r#"{"category": "express_preference", "confidence": 0.85}"#,
            true,
        ));
        let classifier = ResponseClassifier::with_provider(settings(), provider.clone());

        let result = classifier
            .classify(
                "The weather is lovely today",
                &Transcript::new(),
                &PersonaTemplates::new_patient_parent(),
            )
            .await;

        assert_eq!(result.category, ResponseCategory::ExpressPreference);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_provider_keeps_tier1() {
        let provider = Arc::new(CountingProvider::new("{}", false));
        let classifier = ResponseClassifier::with_provider(settings(), provider.clone());

        let result = classifier
            .classify(
                "The weather is lovely today",
                &Transcript::new(),
                &PersonaTemplates::new_patient_parent(),
            )
            .await;

        assert_eq!(result.confidence, 0.3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_tier1() {
        let classifier =
            ResponseClassifier::with_provider(settings(), Arc::new(FailingProvider));

        let result = classifier
            .classify(
                "The weather is lovely today",
                &Transcript::new(),
                &PersonaTemplates::new_patient_parent(),
            )
            .await;

        // Tier-1 placeholder survives total LLM failure.
        assert_eq!(result.category, ResponseCategory::ProvideData);
        assert_eq!(result.confidence, 0.3);
    }

    #[tokio::test]
    async fn test_cache_idempotency() {
        let provider = Arc::new(CountingProvider::new(
            r#"{"category": "acknowledge", "confidence": 0.9}"#,
            true,
        ));
        let classifier = ResponseClassifier::with_provider(settings(), provider.clone());
        let persona = PersonaTemplates::new_patient_parent();
        let history = Transcript::new();

        let first = classifier
            .classify("The weather is lovely today", &history, &persona)
            .await;
        let second = classifier
            .classify("The weather is lovely today", &history, &persona)
            .await;

        assert_eq!(first, second);
        // Second call was served from the cache.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
