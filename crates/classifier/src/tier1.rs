//! Tier-1 deterministic pattern matcher
//!
//! Pure function of the utterance: scans the priority-ordered rule table,
//! first matching pattern wins, then runs the booking-confirmation
//! post-pass. Never fails; returns a low-confidence placeholder when no
//! rule matches.

use callsim_core::{
    ClassificationResult, ConfirmationSubject, ExpectedAnswer, ResponseCategory, TerminalState,
};

use crate::rules::{default_rule_table, extract_offered_options, ClassifierRule};

/// Lowercase and collapse whitespace
pub fn normalize(utterance: &str) -> String {
    utterance
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic first-match rule scanner
pub struct PatternMatcher {
    rules: Vec<ClassifierRule>,
}

impl PatternMatcher {
    /// Build with the default hand-authored table
    pub fn new() -> Self {
        Self {
            rules: default_rule_table(),
        }
    }

    /// Build with a custom table (sorted here; the sort is stable)
    pub fn with_rules(mut rules: Vec<ClassifierRule>) -> Self {
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classify one utterance
    pub fn classify(&self, utterance: &str) -> ClassificationResult {
        let normalized = normalize(utterance);

        let mut result = match self.first_matching(&normalized) {
            Some((rule, pattern_desc)) => {
                let mut r = ClassificationResult::new(rule.category, rule.confidence)
                    .with_fields(rule.fields.clone())
                    .with_terminal(rule.terminal)
                    .with_reasoning(format!("rule '{}' matched '{}'", rule.name, pattern_desc));
                r.confirmation_subject = rule.subject;
                r.expected_answer = rule.expected_answer;
                if rule.extract_options {
                    r.offered_options = extract_offered_options(utterance);
                }
                r
            }
            None => ClassificationResult::unknown_placeholder(),
        };

        result.booking_mentioned = mentions_booking(&normalized)
            || result.terminal_state == TerminalState::BookingConfirmed;
        result.transfer_mentioned = normalized.contains("transfer")
            || result.terminal_state == TerminalState::TransferInitiated;

        if result.terminal_state == TerminalState::BookingConfirmed {
            result.confirmed_this_turn = true;
            self.downgrade_if_follow_up(&normalized, &mut result);
        }

        result
    }

    fn first_matching(&self, normalized: &str) -> Option<(&ClassifierRule, String)> {
        for rule in &self.rules {
            if let Some(pattern) = rule.first_match(normalized) {
                return Some((rule, pattern.describe()));
            }
        }
        None
    }

    /// Booking confirmation plus a trailing question in the same utterance
    /// must not suppress the caller's need to answer the question.
    fn downgrade_if_follow_up(&self, normalized: &str, result: &mut ClassificationResult) {
        let subject = if normalized.contains("address") || normalized.contains("directions") {
            Some(ConfirmationSubject::WantsAddress)
        } else if normalized.contains("anything else") {
            Some(ConfirmationSubject::AnythingElse)
        } else if normalized.contains("does that work") || normalized.contains("does that time work")
        {
            Some(ConfirmationSubject::AppointmentTime)
        } else if normalized.contains("would you like") || normalized.contains("do you want") {
            Some(ConfirmationSubject::General)
        } else {
            None
        };

        if let Some(subject) = subject {
            tracing::debug!(?subject, "downgrading terminal booking to follow-up question");
            result.category = ResponseCategory::ConfirmOrDeny;
            result.confirmation_subject = Some(subject);
            result.expected_answer = Some(ExpectedAnswer::Either);
            result.terminal_state = TerminalState::None;
            result
                .reasoning
                .push_str("; follow-up question downgraded terminal state");
        }
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn mentions_booking(normalized: &str) -> bool {
    normalized.contains("book")
        || normalized.contains("schedul")
        || normalized.contains("appointment")
        || normalized.contains("availability")
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsim_core::DataField;

    fn matcher() -> PatternMatcher {
        PatternMatcher::new()
    }

    #[test]
    fn test_determinism() {
        let m = matcher();
        let a = m.classify("Can I have your phone number?");
        let b = m.classify("Can I have your phone number?");
        assert_eq!(a, b);
        assert_eq!(a.requested_fields, vec![DataField::ParentPhone]);
    }

    #[test]
    fn test_booking_confirmed_with_follow_up_question() {
        // Scenario A
        let result = matcher().classify(
            "Your appointment has been successfully scheduled for Monday at 9am. \
             Would you like the address?",
        );
        assert_eq!(result.category, ResponseCategory::ConfirmOrDeny);
        assert_eq!(
            result.confirmation_subject,
            Some(ConfirmationSubject::WantsAddress)
        );
        assert_eq!(result.terminal_state, TerminalState::None);
        assert!(result.confirmed_this_turn);
        assert!(result.booking_mentioned);
    }

    #[test]
    fn test_in_progress_guard() {
        // Scenario B
        let result = matcher().classify("Let me check availability for you");
        assert_eq!(result.category, ResponseCategory::Acknowledge);
        assert_eq!(result.terminal_state, TerminalState::None);
        assert!(result.booking_mentioned);
        assert!(!result.confirmed_this_turn);
    }

    #[test]
    fn test_future_tense_never_terminal() {
        let result = matcher().classify("I'll schedule that for you right now.");
        assert_eq!(result.terminal_state, TerminalState::None);
    }

    #[test]
    fn test_plain_booking_confirmation_stays_terminal() {
        let result = matcher().classify("Great news, your appointment has been booked.");
        assert_eq!(result.terminal_state, TerminalState::BookingConfirmed);
        assert!(result.confirmed_this_turn);
    }

    #[test]
    fn test_combined_card_and_special_needs() {
        // Scenario D
        let result = matcher().classify(
            "Please remember to bring your insurance card. \
             Also, does your child have any special needs we should know about?",
        );
        assert_eq!(result.category, ResponseCategory::ProvideData);
        assert!(result.requested_fields.contains(&DataField::SpecialNeeds));
        assert!(result.requested_fields.contains(&DataField::CardReminder));
    }

    #[test]
    fn test_select_options_extraction() {
        let result = matcher().classify("Would you prefer morning or afternoon?");
        assert_eq!(result.category, ResponseCategory::SelectFromOptions);
        assert_eq!(result.offered_options, vec!["morning", "afternoon"]);
    }

    #[test]
    fn test_transfer() {
        let result = matcher().classify("Let me transfer you to our scheduling team.");
        // Guard outranks: "let me" phrases guard only covers check/verify/see.
        assert_eq!(result.terminal_state, TerminalState::TransferInitiated);
        assert!(result.transfer_mentioned);
    }

    #[test]
    fn test_no_match_placeholder() {
        let result = matcher().classify("The weather is lovely today");
        assert_eq!(result.category, ResponseCategory::ProvideData);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.requested_fields, vec![DataField::Unknown]);
    }

    #[test]
    fn test_catch_all_question() {
        let result = matcher().classify("Hmm, what about the thing we discussed?");
        assert_eq!(result.category, ResponseCategory::ClarifyRequest);
    }

    #[test]
    fn test_priority_beats_lower_rule() {
        // Both "anything else" (158) and the question catch-all (5) match;
        // the higher priority rule decides.
        let result = matcher().classify("Is there anything else I can help you with?");
        assert_eq!(result.category, ResponseCategory::ConfirmOrDeny);
        assert_eq!(
            result.confirmation_subject,
            Some(ConfirmationSubject::AnythingElse)
        );
    }
}
