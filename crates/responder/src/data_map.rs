//! Persona data mapper
//!
//! Maps a requested data field to the persona's inventory value for the
//! child currently under discussion. Unknown or unfilled fields map to
//! `None`; the engine handles the fallback.

use chrono::{Datelike, NaiveDate, Utc};

use callsim_core::{CallerPersona, DataField};

/// Look up the persona's value for one field
pub fn persona_value(persona: &CallerPersona, field: DataField, child_index: usize) -> Option<String> {
    let child = persona.child(child_index);

    match field {
        DataField::ParentName => non_empty(&persona.parent_name),
        DataField::ParentPhone => non_empty(&persona.parent_phone),
        DataField::ParentEmail => persona.parent_email.clone(),
        DataField::ChildName => child.map(|c| c.name.clone()),
        DataField::ChildDob => child.map(|c| c.dob.clone()),
        DataField::ChildAge => child
            .and_then(|c| age_from_dob(&c.dob))
            .map(|age| age.to_string()),
        DataField::InsuranceProvider => persona.insurance_provider.clone(),
        DataField::InsuranceId => persona.insurance_id.clone(),
        DataField::AppointmentDate => persona.scheduling.day_of_week.clone(),
        DataField::AppointmentTime => persona
            .scheduling
            .time_of_day
            .map(|t| t.as_str().to_string()),
        DataField::LocationPreference => persona.scheduling.location.clone(),
        DataField::VisitReason => non_empty(&persona.visit_reason),
        DataField::SpecialNeeds => Some(match child.and_then(|c| c.special_needs.clone()) {
            Some(note) => note,
            None => "no special needs".to_string(),
        }),
        DataField::CardReminder => Some("we'll bring the insurance card".to_string()),
        DataField::PreviousVisit => child.map(|c| yes_no(!c.new_patient)),
        DataField::PreviousTreatment => child.map(|c| yes_no(c.prior_treatment)),
        DataField::Unknown => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

fn age_from_dob(dob: &str) -> Option<u32> {
    let parsed = NaiveDate::parse_from_str(dob.trim(), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(dob.trim(), "%m/%d/%Y"))
        .ok()?;
    let today = Utc::now().date_naive();
    let mut age = today.year() - parsed.year();
    if (today.month(), today.day()) < (parsed.month(), parsed.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}
