//! Scripted provider for tests
//!
//! Replays a fixed sequence of canned replies and counts `execute` calls,
//! which makes the threshold-gating and cache-idempotency properties
//! directly assertable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use callsim_core::{Error, LlmProvider, LlmReply, LlmRequest, ProviderStatus, Result};

/// Deterministic provider backed by canned replies
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    /// Reply replayed once the script is exhausted
    fallback: Option<String>,
    calls: AtomicUsize,
    available: bool,
}

impl ScriptedProvider {
    /// Provider replaying the given replies in order
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
            calls: AtomicUsize::new(0),
            available: true,
        }
    }

    /// Provider that always returns the same reply
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.into()),
            calls: AtomicUsize::new(0),
            available: true,
        }
    }

    /// Provider that reports itself unavailable
    pub fn offline() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
            available: false,
        }
    }

    /// How many times `execute` was invoked
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn execute(&self, _request: LlmRequest) -> Result<LlmReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .replies
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone());

        match next {
            Some(content) => Ok(LlmReply {
                content,
                provider: "scripted".to_string(),
                duration_ms: 0,
            }),
            None => Err(Error::Llm("script exhausted".to_string())),
        }
    }

    async fn check_availability(&self) -> ProviderStatus {
        if self.available {
            ProviderStatus::up("scripted")
        } else {
            ProviderStatus::down("scripted", "offline by construction")
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}
