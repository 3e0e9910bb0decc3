//! Caller persona and data inventory
//!
//! The persona parameterizes the simulated caller: the data it can hand
//! over when asked (parent, children, insurance), its scheduling
//! preferences, and its speaking style. Read-only during a conversation.

use serde::{Deserialize, Serialize};

/// How wordy the simulated caller is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Verbosity {
    /// Bare answers ("555-0182.")
    Terse,
    /// One natural sentence
    #[default]
    Normal,
    /// Extra chatter around the answer
    Verbose,
}

/// Preferred time of day for appointments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
        }
    }
}

/// One child on the caller's account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildProfile {
    /// Child's full name
    pub name: String,
    /// Date of birth, "YYYY-MM-DD"
    pub dob: String,
    /// Never been seen at this practice
    pub new_patient: bool,
    /// Prior orthodontic treatment elsewhere
    pub prior_treatment: bool,
    /// Special needs note, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_needs: Option<String>,
}

impl ChildProfile {
    pub fn new(name: impl Into<String>, dob: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dob: dob.into(),
            new_patient: true,
            prior_treatment: false,
            special_needs: None,
        }
    }

    pub fn with_prior_treatment(mut self, prior: bool) -> Self {
        self.prior_treatment = prior;
        self
    }

    pub fn with_special_needs(mut self, note: impl Into<String>) -> Self {
        self.special_needs = Some(note.into());
        self
    }

    pub fn returning(mut self) -> Self {
        self.new_patient = false;
        self
    }
}

/// Scheduling preferences consulted when the agent offers options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulingPreferences {
    /// Preferred time of day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    /// Preferred day of week, lowercase ("monday")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    /// Preferred office/location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// The simulated caller's complete data inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerPersona {
    /// Persona identifier
    pub name: String,
    /// Parent/guardian full name
    pub parent_name: String,
    /// Callback phone number
    pub parent_phone: String,
    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_email: Option<String>,
    /// Children, in the order the caller mentions them
    pub children: Vec<ChildProfile>,
    /// Insurance carrier name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_provider: Option<String>,
    /// Insurance member id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_id: Option<String>,
    /// Scheduling preferences
    #[serde(default)]
    pub scheduling: SchedulingPreferences,
    /// The reason the caller originally gave for calling
    pub visit_reason: String,
    /// Speaking style
    #[serde(default)]
    pub verbosity: Verbosity,
    /// Volunteers unasked-for details when answering
    #[serde(default)]
    pub offers_extra_info: bool,
}

impl CallerPersona {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_name: String::new(),
            parent_phone: String::new(),
            parent_email: None,
            children: Vec::new(),
            insurance_provider: None,
            insurance_id: None,
            scheduling: SchedulingPreferences::default(),
            visit_reason: "schedule an appointment".to_string(),
            verbosity: Verbosity::Normal,
            offers_extra_info: false,
        }
    }

    pub fn with_parent(mut self, name: impl Into<String>, phone: impl Into<String>) -> Self {
        self.parent_name = name.into();
        self.parent_phone = phone.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.parent_email = Some(email.into());
        self
    }

    pub fn with_child(mut self, child: ChildProfile) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_insurance(mut self, provider: impl Into<String>, member_id: impl Into<String>) -> Self {
        self.insurance_provider = Some(provider.into());
        self.insurance_id = Some(member_id.into());
        self
    }

    pub fn with_visit_reason(mut self, reason: impl Into<String>) -> Self {
        self.visit_reason = reason.into();
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_scheduling(mut self, scheduling: SchedulingPreferences) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Child currently under discussion (`index` from the context tracker)
    pub fn child(&self, index: usize) -> Option<&ChildProfile> {
        self.children.get(index)
    }

    /// Whether the stated reason for calling is orthodontic
    pub fn reason_is_orthodontic(&self) -> bool {
        let reason = self.visit_reason.to_lowercase();
        reason.contains("ortho") || reason.contains("braces") || reason.contains("aligner")
    }

    /// One-line summary embedded in LLM prompts
    pub fn summary(&self) -> String {
        let children = self
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Parent {} calling about: {}. Children: {}.",
            self.parent_name,
            self.visit_reason,
            if children.is_empty() { "none" } else { &children }
        )
    }
}

/// Pre-defined persona templates for common test scenarios
pub struct PersonaTemplates;

impl PersonaTemplates {
    /// Cooperative parent booking a first orthodontic consult
    pub fn new_patient_parent() -> CallerPersona {
        CallerPersona::new("new_patient_parent")
            .with_parent("Dana Reyes", "555-0182")
            .with_email("dana.reyes@example.com")
            .with_child(ChildProfile::new("Mia Reyes", "2014-06-21"))
            .with_insurance("Delta Dental", "DD-4491002")
            .with_visit_reason("braces consultation for my daughter")
    }

    /// Returning family with two children and prior treatment
    pub fn returning_family() -> CallerPersona {
        CallerPersona::new("returning_family")
            .with_parent("Priya Natarajan", "555-0147")
            .with_child(
                ChildProfile::new("Arjun Natarajan", "2012-02-09")
                    .returning()
                    .with_prior_treatment(true),
            )
            .with_child(ChildProfile::new("Meera Natarajan", "2015-11-30"))
            .with_insurance("MetLife", "ML-7720913")
            .with_visit_reason("follow-up adjustment for my son")
    }

    /// Caller whose reason is not orthodontic at all
    pub fn general_dental_caller() -> CallerPersona {
        CallerPersona::new("general_dental_caller")
            .with_parent("Sam Okafor", "555-0119")
            .with_child(ChildProfile::new("Ada Okafor", "2016-03-05"))
            .with_visit_reason("a chipped tooth")
            .with_verbosity(Verbosity::Terse)
    }
}
