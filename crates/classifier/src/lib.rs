//! Two-tier response classifier
//!
//! Features:
//! - Priority-ordered declarative rule table (Tier 1)
//! - Booking-confirmation follow-up post-pass
//! - LLM fallback with enum sanitization (Tier 2)
//! - Shared TTL + size-bounded result cache

pub mod cache;
pub mod classifier;
pub mod rules;
pub mod tier1;
pub mod tier2;

pub use cache::{cache_key, ClassificationCache};
pub use classifier::ResponseClassifier;
pub use rules::{default_rule_table, extract_offered_options, ClassifierRule, Pattern};
pub use tier1::{normalize, PatternMatcher};
pub use tier2::{parse_llm_classification, LlmTier};
