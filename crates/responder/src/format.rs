//! Response formatter
//!
//! Wraps semantic reply content in persona-voiced phrasing keyed by the
//! verbosity trait. A randomly chosen prefix/suffix from a fixed pool per
//! category injects lexical variety without changing semantic content.
//! Decision logic never depends on which variant was chosen.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use callsim_core::Verbosity;

/// Phrase pool category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseKind {
    /// Handing over a datum
    Data,
    /// Affirmative answers
    Confirm,
    /// Negative answers
    Deny,
    /// Choosing an option
    Select,
    /// Stating a soft preference
    Preference,
    /// Acknowledging information
    Acknowledge,
    /// Asking the agent to clarify
    Clarify,
}

const DATA_PREFIXES: &[&str] = &["Sure, ", "Of course, ", "Yes, ", "It's ", "That would be "];
const CONFIRM_PREFIXES: &[&str] = &["", "Mm-hmm, ", "Sure, ", "Of course, "];
const DENY_PREFIXES: &[&str] = &["", "Well, ", "Hmm, "];
const SELECT_PREFIXES: &[&str] = &["", "Let's do ", "I'd go with ", "We'd prefer "];
const PREFERENCE_PREFIXES: &[&str] = &["", "Honestly, ", "For us, "];
const ACK_PREFIXES: &[&str] = &["", "Okay, ", "Got it, ", "Alright, "];
const CLARIFY_PREFIXES: &[&str] = &["Sorry, ", "I'm sorry, ", "Apologies, "];

const VERBOSE_SUFFIXES: &[&str] = &[
    " Thanks so much.",
    " I appreciate it.",
    " Hope that helps.",
    " Just let me know if you need anything else.",
];

/// Persona-voice-aware phrasing
pub struct ResponseFormatter {
    rng: Mutex<StdRng>,
}

impl ResponseFormatter {
    /// Formatter with OS-seeded randomness
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic formatter for tests and reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Wrap semantic content in persona-voiced phrasing
    ///
    /// Terse personas get the bare content; normal personas get a prefix;
    /// verbose personas get a prefix and sometimes a suffix.
    pub fn decorate(&self, verbosity: Verbosity, kind: PhraseKind, core: &str) -> String {
        if core.is_empty() {
            return String::new();
        }

        match verbosity {
            Verbosity::Terse => core.to_string(),
            Verbosity::Normal => format!("{}{}", self.pick_prefix(kind), core),
            Verbosity::Verbose => {
                let mut reply = format!("{}{}", self.pick_prefix(kind), core);
                let mut rng = self.rng.lock();
                if rng.gen_bool(0.5) {
                    let suffix = VERBOSE_SUFFIXES[rng.gen_range(0..VERBOSE_SUFFIXES.len())];
                    reply.push_str(suffix);
                }
                reply
            }
        }
    }

    fn pick_prefix(&self, kind: PhraseKind) -> &'static str {
        let pool = match kind {
            PhraseKind::Data => DATA_PREFIXES,
            PhraseKind::Confirm => CONFIRM_PREFIXES,
            PhraseKind::Deny => DENY_PREFIXES,
            PhraseKind::Select => SELECT_PREFIXES,
            PhraseKind::Preference => PREFERENCE_PREFIXES,
            PhraseKind::Acknowledge => ACK_PREFIXES,
            PhraseKind::Clarify => CLARIFY_PREFIXES,
        };
        let mut rng = self.rng.lock();
        pool[rng.gen_range(0..pool.len())]
    }
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terse_is_bare() {
        let formatter = ResponseFormatter::with_seed(7);
        assert_eq!(
            formatter.decorate(Verbosity::Terse, PhraseKind::Data, "555-0182"),
            "555-0182"
        );
    }

    #[test]
    fn test_normal_keeps_core_content() {
        let formatter = ResponseFormatter::with_seed(7);
        let reply = formatter.decorate(Verbosity::Normal, PhraseKind::Data, "555-0182");
        assert!(reply.contains("555-0182"));
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = ResponseFormatter::with_seed(42);
        let b = ResponseFormatter::with_seed(42);
        for _ in 0..5 {
            assert_eq!(
                a.decorate(Verbosity::Verbose, PhraseKind::Confirm, "yes"),
                b.decorate(Verbosity::Verbose, PhraseKind::Confirm, "yes")
            );
        }
    }

    #[test]
    fn test_empty_core_stays_empty() {
        let formatter = ResponseFormatter::with_seed(7);
        assert_eq!(
            formatter.decorate(Verbosity::Verbose, PhraseKind::Acknowledge, ""),
            ""
        );
    }
}
