//! Classification vocabulary and results
//!
//! The classifier turns one agent utterance into a `ClassificationResult`:
//! what the agent is doing (category), what data it wants (fields), what it
//! is confirming (subject), and whether the conversation just reached a
//! definitive endpoint (terminal state).

use serde::{Deserialize, Serialize};

/// What the agent's utterance is asking the caller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ResponseCategory {
    /// Agent wants a piece of data (name, phone, DOB, ...)
    #[default]
    ProvideData,
    /// Agent asked a yes/no question
    ConfirmOrDeny,
    /// Agent offered explicit alternatives to choose from
    SelectFromOptions,
    /// Agent made a statement that only needs acknowledgment
    Acknowledge,
    /// Agent's utterance was unclear; caller should ask for clarification
    ClarifyRequest,
    /// Agent asked for a soft preference rather than a datum
    ExpressPreference,
}

impl ResponseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCategory::ProvideData => "provide_data",
            ResponseCategory::ConfirmOrDeny => "confirm_or_deny",
            ResponseCategory::SelectFromOptions => "select_from_options",
            ResponseCategory::Acknowledge => "acknowledge",
            ResponseCategory::ClarifyRequest => "clarify_request",
            ResponseCategory::ExpressPreference => "express_preference",
        }
    }

    /// Parse a category name, tolerating unknown input
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "provide_data" => Some(ResponseCategory::ProvideData),
            "confirm_or_deny" => Some(ResponseCategory::ConfirmOrDeny),
            "select_from_options" => Some(ResponseCategory::SelectFromOptions),
            "acknowledge" => Some(ResponseCategory::Acknowledge),
            "clarify_request" => Some(ResponseCategory::ClarifyRequest),
            "express_preference" => Some(ResponseCategory::ExpressPreference),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named datum the conversation aims to gather
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DataField {
    ParentName,
    ParentPhone,
    ParentEmail,
    ChildName,
    ChildDob,
    ChildAge,
    InsuranceProvider,
    InsuranceId,
    AppointmentDate,
    AppointmentTime,
    LocationPreference,
    VisitReason,
    SpecialNeeds,
    CardReminder,
    PreviousVisit,
    PreviousTreatment,
    Unknown,
}

impl DataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataField::ParentName => "parent_name",
            DataField::ParentPhone => "parent_phone",
            DataField::ParentEmail => "parent_email",
            DataField::ChildName => "child_name",
            DataField::ChildDob => "child_dob",
            DataField::ChildAge => "child_age",
            DataField::InsuranceProvider => "insurance_provider",
            DataField::InsuranceId => "insurance_id",
            DataField::AppointmentDate => "appointment_date",
            DataField::AppointmentTime => "appointment_time",
            DataField::LocationPreference => "location_preference",
            DataField::VisitReason => "visit_reason",
            DataField::SpecialNeeds => "special_needs",
            DataField::CardReminder => "card_reminder",
            DataField::PreviousVisit => "previous_visit",
            DataField::PreviousTreatment => "previous_treatment",
            DataField::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "parent_name" | "caller_name" => Some(DataField::ParentName),
            "parent_phone" | "caller_phone" | "phone" => Some(DataField::ParentPhone),
            "parent_email" | "email" => Some(DataField::ParentEmail),
            "child_name" | "patient_name" => Some(DataField::ChildName),
            "child_dob" | "date_of_birth" | "dob" => Some(DataField::ChildDob),
            "child_age" | "age" => Some(DataField::ChildAge),
            "insurance_provider" | "insurance" => Some(DataField::InsuranceProvider),
            "insurance_id" | "member_id" => Some(DataField::InsuranceId),
            "appointment_date" => Some(DataField::AppointmentDate),
            "appointment_time" => Some(DataField::AppointmentTime),
            "location_preference" | "location" => Some(DataField::LocationPreference),
            "visit_reason" | "reason" => Some(DataField::VisitReason),
            "special_needs" => Some(DataField::SpecialNeeds),
            "card_reminder" => Some(DataField::CardReminder),
            "previous_visit" => Some(DataField::PreviousVisit),
            "previous_treatment" => Some(DataField::PreviousTreatment),
            "unknown" => Some(DataField::Unknown),
            _ => None,
        }
    }

    /// Whether the field belongs to a specific child rather than the caller
    pub fn is_child_specific(&self) -> bool {
        matches!(
            self,
            DataField::ChildName
                | DataField::ChildDob
                | DataField::ChildAge
                | DataField::SpecialNeeds
                | DataField::PreviousVisit
                | DataField::PreviousTreatment
        )
    }
}

impl std::fmt::Display for DataField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a confirm-or-deny question is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ConfirmationSubject {
    #[default]
    General,
    WantsAddress,
    AnythingElse,
    SchedulingIntent,
    OrthodonticScope,
    PreviousVisit,
    PreviousTreatment,
    SpecialNeeds,
    AppointmentTime,
    BookingDetails,
}

impl ConfirmationSubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationSubject::General => "general",
            ConfirmationSubject::WantsAddress => "wants_address",
            ConfirmationSubject::AnythingElse => "anything_else",
            ConfirmationSubject::SchedulingIntent => "scheduling_intent",
            ConfirmationSubject::OrthodonticScope => "orthodontic_scope",
            ConfirmationSubject::PreviousVisit => "previous_visit",
            ConfirmationSubject::PreviousTreatment => "previous_treatment",
            ConfirmationSubject::SpecialNeeds => "special_needs",
            ConfirmationSubject::AppointmentTime => "appointment_time",
            ConfirmationSubject::BookingDetails => "booking_details",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" => Some(ConfirmationSubject::General),
            "wants_address" => Some(ConfirmationSubject::WantsAddress),
            "anything_else" => Some(ConfirmationSubject::AnythingElse),
            "scheduling_intent" => Some(ConfirmationSubject::SchedulingIntent),
            "orthodontic_scope" => Some(ConfirmationSubject::OrthodonticScope),
            "previous_visit" => Some(ConfirmationSubject::PreviousVisit),
            "previous_treatment" => Some(ConfirmationSubject::PreviousTreatment),
            "special_needs" => Some(ConfirmationSubject::SpecialNeeds),
            "appointment_time" => Some(ConfirmationSubject::AppointmentTime),
            "booking_details" => Some(ConfirmationSubject::BookingDetails),
            _ => None,
        }
    }
}

/// Hint for which answer the agent expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedAnswer {
    Yes,
    No,
    Either,
}

impl ExpectedAnswer {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Some(ExpectedAnswer::Yes),
            "no" => Some(ExpectedAnswer::No),
            "either" => Some(ExpectedAnswer::Either),
            _ => None,
        }
    }
}

/// A definitive conversation endpoint signalled by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum TerminalState {
    #[default]
    None,
    BookingConfirmed,
    TransferInitiated,
    ConversationEnded,
    ErrorTerminal,
}

impl TerminalState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TerminalState::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::None => "none",
            TerminalState::BookingConfirmed => "booking_confirmed",
            TerminalState::TransferInitiated => "transfer_initiated",
            TerminalState::ConversationEnded => "conversation_ended",
            TerminalState::ErrorTerminal => "error_terminal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(TerminalState::None),
            "booking_confirmed" => Some(TerminalState::BookingConfirmed),
            "transfer_initiated" => Some(TerminalState::TransferInitiated),
            "conversation_ended" => Some(TerminalState::ConversationEnded),
            "error_terminal" => Some(TerminalState::ErrorTerminal),
            _ => None,
        }
    }
}

/// Structured interpretation of one agent utterance
///
/// Created fresh per classification call; immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Primary category
    pub category: ResponseCategory,
    /// Confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Data fields the agent asked for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_fields: Vec<DataField>,
    /// What a confirm-or-deny question is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_subject: Option<ConfirmationSubject>,
    /// Which answer the agent expects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_answer: Option<ExpectedAnswer>,
    /// Options offered for select_from_options
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offered_options: Vec<String>,
    /// Terminal state, if any
    #[serde(default)]
    pub terminal_state: TerminalState,
    /// Utterance mentioned booking/scheduling activity
    #[serde(default)]
    pub booking_mentioned: bool,
    /// Utterance mentioned a transfer
    #[serde(default)]
    pub transfer_mentioned: bool,
    /// A booking was confirmed in this very turn (survives the
    /// follow-up-question downgrade)
    #[serde(default)]
    pub confirmed_this_turn: bool,
    /// Free-text reasoning for diagnostics
    #[serde(default)]
    pub reasoning: String,
}

impl ClassificationResult {
    /// Create a result with just a category and confidence
    pub fn new(category: ResponseCategory, confidence: f32) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            requested_fields: Vec::new(),
            confirmation_subject: None,
            expected_answer: None,
            offered_options: Vec::new(),
            terminal_state: TerminalState::None,
            booking_mentioned: false,
            transfer_mentioned: false,
            confirmed_this_turn: false,
            reasoning: String::new(),
        }
    }

    /// Low-confidence placeholder used when no rule matches
    pub fn unknown_placeholder() -> Self {
        let mut result = Self::new(ResponseCategory::ProvideData, 0.3);
        result.requested_fields.push(DataField::Unknown);
        result.reasoning = "no pattern matched".to_string();
        result
    }

    pub fn with_fields(mut self, fields: Vec<DataField>) -> Self {
        self.requested_fields = fields;
        self
    }

    pub fn with_subject(mut self, subject: ConfirmationSubject) -> Self {
        self.confirmation_subject = Some(subject);
        self
    }

    pub fn with_terminal(mut self, terminal: TerminalState) -> Self {
        self.terminal_state = terminal;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}
