//! Tier-2 LLM fallback classifier
//!
//! Consulted only when Tier-1 confidence is below the configured threshold
//! and the provider reports itself available. The raw LLM output is parsed
//! and then sanitized: enum-like fields outside the known vocabulary are
//! coerced to safe defaults. Any parse failure surfaces as an error so the
//! caller can fall back to the Tier-1 result.

use std::sync::Arc;

use callsim_core::{
    CallerPersona, ClassificationResult, ConfirmationSubject, DataField, Error, ExpectedAnswer,
    LlmProvider, LlmRequest, ResponseCategory, Result, TerminalState, Transcript,
};
use callsim_config::ClassifierSettings;
use serde::Deserialize;

/// LLM-backed classification tier
pub struct LlmTier {
    provider: Arc<dyn LlmProvider>,
    settings: ClassifierSettings,
}

impl LlmTier {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: ClassifierSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Classify via the LLM; errors mean "use the Tier-1 result instead"
    pub async fn classify(
        &self,
        utterance: &str,
        history: &Transcript,
        persona: &CallerPersona,
    ) -> Result<ClassificationResult> {
        let prompt = self.build_prompt(utterance, history, persona);
        let timeout = std::time::Duration::from_secs(self.settings.llm_timeout_seconds);
        let request = LlmRequest::new(prompt)
            .with_temperature(0.0)
            .with_timeout(timeout);

        let reply = tokio::time::timeout(timeout, self.provider.execute(request))
            .await
            .map_err(|_| Error::Timeout)??;

        tracing::debug!(
            provider = %reply.provider,
            duration_ms = reply.duration_ms,
            "LLM classification reply"
        );

        parse_llm_classification(&reply.content)
    }

    fn build_prompt(
        &self,
        utterance: &str,
        history: &Transcript,
        persona: &CallerPersona,
    ) -> String {
        let mut history_block = String::new();
        for turn in history.recent(self.settings.history_window) {
            history_block.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
        if history_block.is_empty() {
            history_block.push_str("(start of conversation)\n");
        }

        format!(
            r#"You are analyzing one utterance from an appointment-scheduling assistant to decide what the caller should do next.

Respond with a single JSON object and nothing else:
{{
  "category": "provide_data | confirm_or_deny | select_from_options | acknowledge | clarify_request | express_preference",
  "confidence": 0.0-1.0,
  "requested_fields": ["parent_name", "parent_phone", "parent_email", "child_name", "child_dob", "child_age", "insurance_provider", "insurance_id", "appointment_date", "appointment_time", "location_preference", "visit_reason", "special_needs", "card_reminder", "previous_visit", "previous_treatment"],
  "confirmation_subject": "general | wants_address | anything_else | scheduling_intent | orthodontic_scope | previous_visit | previous_treatment | special_needs | appointment_time | booking_details",
  "expected_answer": "yes | no | either",
  "offered_options": ["..."],
  "terminal_state": "none | booking_confirmed | transfer_initiated | conversation_ended | error_terminal",
  "booking_mentioned": true/false,
  "transfer_mentioned": true/false,
  "reasoning": "one sentence"
}}

Rules:
- terminal_state "booking_confirmed" requires PAST tense: the booking already happened ("has been scheduled", "is confirmed"). Future or in-progress phrasing ("I'll schedule", "let me check availability") is terminal_state "none".
- terminal_state "transfer_initiated" only when the assistant is actually handing the call off now.
- If the utterance both confirms a booking and asks a follow-up question, classify the question (confirm_or_deny) and set terminal_state "none".
- Omit fields that do not apply.

Recent conversation:
{history_block}
Caller persona: {persona_summary}

Utterance to classify: "{utterance}""#,
            history_block = history_block,
            persona_summary = persona.summary(),
            utterance = utterance,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    category: Option<String>,
    confidence: Option<f32>,
    #[serde(default)]
    requested_fields: Vec<String>,
    confirmation_subject: Option<String>,
    expected_answer: Option<String>,
    #[serde(default)]
    offered_options: Vec<String>,
    terminal_state: Option<String>,
    #[serde(default)]
    booking_mentioned: bool,
    #[serde(default)]
    transfer_mentioned: bool,
    #[serde(default)]
    reasoning: String,
}

/// Parse and sanitize an LLM classification reply
///
/// Unknown enum values are coerced rather than discarded; a confirmation
/// subject that actually names a data field is moved into the field list
/// (LLMs routinely confuse "what it's confirming" with "what it wants").
pub fn parse_llm_classification(content: &str) -> Result<ClassificationResult> {
    let json = extract_json_object(content)
        .ok_or_else(|| Error::Classification("no JSON object in LLM reply".to_string()))?;

    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| Error::Classification(format!("malformed LLM JSON: {e}")))?;

    let category = raw
        .category
        .as_deref()
        .and_then(ResponseCategory::parse)
        .unwrap_or(ResponseCategory::ProvideData);

    let mut fields: Vec<DataField> = Vec::new();
    for name in &raw.requested_fields {
        match DataField::parse(name) {
            Some(field) if !fields.contains(&field) => fields.push(field),
            Some(_) => {}
            None => tracing::debug!(field = name.as_str(), "dropping unknown field from LLM"),
        }
    }

    let subject = match raw.confirmation_subject.as_deref() {
        None => None,
        Some(s) => match ConfirmationSubject::parse(s) {
            Some(subject) => Some(subject),
            None => {
                // The "subject" may actually be a data-field name.
                if let Some(field) = DataField::parse(s) {
                    if !fields.contains(&field) {
                        fields.push(field);
                    }
                    None
                } else {
                    Some(ConfirmationSubject::General)
                }
            }
        },
    };

    let expected_answer = raw.expected_answer.as_deref().and_then(ExpectedAnswer::parse);
    let terminal_state = raw
        .terminal_state
        .as_deref()
        .and_then(TerminalState::parse)
        .unwrap_or(TerminalState::None);

    let mut result = ClassificationResult::new(category, raw.confidence.unwrap_or(0.6));
    result.requested_fields = fields;
    result.confirmation_subject = subject;
    result.expected_answer = expected_answer;
    result.offered_options = raw.offered_options;
    result.terminal_state = terminal_state;
    result.booking_mentioned =
        raw.booking_mentioned || terminal_state == TerminalState::BookingConfirmed;
    result.transfer_mentioned =
        raw.transfer_mentioned || terminal_state == TerminalState::TransferInitiated;
    result.confirmed_this_turn = terminal_state == TerminalState::BookingConfirmed;
    result.reasoning = raw.reasoning;

    Ok(result)
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end > start {
        Some(&content[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_reply() {
        let content = r#"{"category": "confirm_or_deny", "confidence": 0.9,
            "confirmation_subject": "anything_else", "expected_answer": "no"}"#;
        let result = parse_llm_classification(content).unwrap();
        assert_eq!(result.category, ResponseCategory::ConfirmOrDeny);
        assert_eq!(
            result.confirmation_subject,
            Some(ConfirmationSubject::AnythingElse)
        );
        assert_eq!(result.expected_answer, Some(ExpectedAnswer::No));
    }

    #[test]
    fn test_parse_reply_with_prose() {
        let content = "Sure! Here's the classification:\n\
            {\"category\": \"acknowledge\", \"confidence\": 0.8}\nHope that helps.";
        let result = parse_llm_classification(content).unwrap();
        assert_eq!(result.category, ResponseCategory::Acknowledge);
    }

    #[test]
    fn test_unknown_subject_coerced_to_general() {
        let content = r#"{"category": "confirm_or_deny", "confidence": 0.7,
            "confirmation_subject": "the_weather"}"#;
        let result = parse_llm_classification(content).unwrap();
        assert_eq!(
            result.confirmation_subject,
            Some(ConfirmationSubject::General)
        );
    }

    #[test]
    fn test_field_named_as_subject_moves_to_fields() {
        let content = r#"{"category": "provide_data", "confidence": 0.7,
            "confirmation_subject": "parent_phone"}"#;
        let result = parse_llm_classification(content).unwrap();
        assert_eq!(result.confirmation_subject, None);
        assert_eq!(result.requested_fields, vec![DataField::ParentPhone]);
    }

    #[test]
    fn test_unknown_fields_dropped() {
        let content = r#"{"category": "provide_data", "confidence": 0.7,
            "requested_fields": ["parent_phone", "favorite_color"]}"#;
        let result = parse_llm_classification(content).unwrap();
        assert_eq!(result.requested_fields, vec![DataField::ParentPhone]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse_llm_classification("I could not classify that.").is_err());
        assert!(parse_llm_classification("{not json}").is_err());
    }

    #[test]
    fn test_terminal_sets_mention_flags() {
        let content = r#"{"category": "acknowledge", "confidence": 0.9,
            "terminal_state": "booking_confirmed"}"#;
        let result = parse_llm_classification(content).unwrap();
        assert!(result.booking_mentioned);
        assert!(result.confirmed_this_turn);
    }
}
