//! Response strategy engine
//!
//! Features:
//! - Category-dispatched reply synthesis with the confirm/deny override
//!   ladder
//! - Persona data mapper (field -> inventory value)
//! - Smart fallback table scanned against the agent's own wording
//! - Verbosity-aware formatter with phrase pools

pub mod data_map;
pub mod engine;
pub mod fallback;
pub mod format;

pub use data_map::persona_value;
pub use engine::{ResponseContext, ResponseStrategyEngine};
pub use fallback::{default_fallback_rules, smart_fallback, FallbackRule};
pub use format::{PhraseKind, ResponseFormatter};
