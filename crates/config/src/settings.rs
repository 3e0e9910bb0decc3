//! Engine settings

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Classifier configuration
    #[serde(default)]
    pub classifier: ClassifierSettings,

    /// Tracker configuration
    #[serde(default)]
    pub tracker: TrackerSettings,

    /// Responder configuration
    #[serde(default)]
    pub responder: ResponderSettings,

    /// LLM backend configuration
    #[serde(default)]
    pub llm: LlmSettings,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Below this Tier-1 confidence the LLM tier is consulted
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Agent-turn history window embedded in the LLM prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Result cache capacity (entries)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Result cache TTL (seconds)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Hard deadline for one LLM classification call (seconds)
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_seconds: u64,
}

fn default_confidence_threshold() -> f32 {
    0.75
}
fn default_history_window() -> usize {
    4
}
fn default_cache_capacity() -> usize {
    256
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_llm_timeout() -> u64 {
    15
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            history_window: default_history_window(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_seconds: default_cache_ttl(),
            llm_timeout_seconds: default_llm_timeout(),
        }
    }
}

/// Context/progress tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// A field requested this many times is flagged as repeated
    #[serde(default = "default_max_repetition")]
    pub max_repetition_count: usize,

    /// Turn threshold for stuck-conversation detection
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,

    /// Enable anomaly detection in the context tracker
    #[serde(default = "default_true")]
    pub anomaly_detection: bool,

    /// Enable issue detection in the progress tracker
    #[serde(default = "default_true")]
    pub issue_detection: bool,
}

fn default_max_repetition() -> usize {
    2
}
fn default_stuck_threshold() -> u32 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            max_repetition_count: default_max_repetition(),
            stuck_threshold: default_stuck_threshold(),
            anomaly_detection: true,
            issue_detection: true,
        }
    }
}

/// Responder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderSettings {
    /// Allow the deliberate-silence simulation (empty reply)
    #[serde(default)]
    pub allow_silence: bool,

    /// Seed for phrase-pool selection; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase_seed: Option<u64>,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            allow_silence: false,
            phrase_seed: None,
        }
    }
}

/// LLM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// API endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model name/ID
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    /// Maximum retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "qwen2.5:7b-instruct-q4_K_M".to_string()
}
fn default_max_tokens() -> usize {
    512
}
fn default_temperature() -> f32 {
    0.1
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Load settings from an optional file plus CALLSIM_ env overrides
///
/// `CALLSIM_CLASSIFIER__CONFIDENCE_THRESHOLD=0.8` overrides
/// `classifier.confidence_threshold`.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CALLSIM").separator("__"),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;

    if !(0.0..=1.0).contains(&settings.classifier.confidence_threshold) {
        return Err(ConfigError::InvalidValue {
            field: "classifier.confidence_threshold".to_string(),
            message: "must be within 0.0..=1.0".to_string(),
        });
    }

    tracing::debug!(
        threshold = settings.classifier.confidence_threshold,
        cache_ttl = settings.classifier.cache_ttl_seconds,
        "settings loaded"
    );

    Ok(settings)
}
