//! Smart fallback table
//!
//! When classification fails to attach a field even though the intent is
//! obvious from wording, this ordered phrase-pattern table is scanned
//! against the agent's utterance directly. It is maintained independently
//! of the classifier's rule table and the two may disagree; both are
//! independently testable.

use once_cell::sync::Lazy;

use callsim_core::DataField;

/// One fallback rule: any listed phrase implies the field
#[derive(Debug, Clone)]
pub struct FallbackRule {
    pub name: &'static str,
    pub phrases: &'static [&'static str],
    pub field: DataField,
}

/// The ordered fallback table; earlier rules win
pub fn default_fallback_rules() -> Vec<FallbackRule> {
    vec![
        FallbackRule {
            name: "dob_words",
            phrases: &["date of birth", "born", "birthday", "birth date"],
            field: DataField::ChildDob,
        },
        FallbackRule {
            name: "phone_words",
            phrases: &["phone", "reach you", "call you back", "number"],
            field: DataField::ParentPhone,
        },
        FallbackRule {
            name: "email_words",
            phrases: &["email", "e-mail"],
            field: DataField::ParentEmail,
        },
        FallbackRule {
            name: "insurance_words",
            phrases: &["insurance", "coverage", "carrier"],
            field: DataField::InsuranceProvider,
        },
        FallbackRule {
            name: "child_words",
            phrases: &["child", "son", "daughter", "patient", "kid"],
            field: DataField::ChildName,
        },
        FallbackRule {
            name: "time_words",
            phrases: &["what time", "when would", "time work"],
            field: DataField::AppointmentTime,
        },
        FallbackRule {
            name: "name_words",
            phrases: &["name"],
            field: DataField::ParentName,
        },
        FallbackRule {
            name: "reason_words",
            phrases: &["help you", "calling about", "reason"],
            field: DataField::VisitReason,
        },
    ]
}

static FALLBACK_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(default_fallback_rules);

/// Scan the agent's utterance; first rule with any matching phrase wins
pub fn smart_fallback(utterance: &str) -> Option<DataField> {
    let lower = utterance.to_lowercase();
    FALLBACK_RULES
        .iter()
        .find(|rule| rule.phrases.iter().any(|p| lower.contains(p)))
        .map(|rule| {
            tracing::debug!(rule = rule.name, field = rule.field.as_str(), "smart fallback hit");
            rule.field
        })
}
