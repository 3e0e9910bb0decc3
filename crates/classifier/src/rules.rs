//! Declarative rule table for Tier-1 classification
//!
//! Rules are plain data: category, patterns, confidence, priority, and the
//! structured outcome to emit on a match. The table is sorted once by
//! priority descending; the sort is stable, so rules sharing a priority
//! keep their declaration order. Several hand-tuned priorities rely on
//! exactly that.

use once_cell::sync::Lazy;
use regex::Regex;

use callsim_core::{
    ConfirmationSubject, DataField, ExpectedAnswer, ResponseCategory, TerminalState,
};

/// A textual match condition against the normalized utterance
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Utterance contains this phrase
    Contains(&'static str),
    /// Utterance contains every listed phrase
    AllOf(&'static [&'static str]),
}

impl Pattern {
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            Pattern::Contains(phrase) => normalized.contains(phrase),
            Pattern::AllOf(phrases) => phrases.iter().all(|p| normalized.contains(p)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Pattern::Contains(phrase) => (*phrase).to_string(),
            Pattern::AllOf(phrases) => phrases.join(" + "),
        }
    }
}

/// One classification rule
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    /// Rule name for diagnostics
    pub name: &'static str,
    /// Category emitted on match
    pub category: ResponseCategory,
    /// Patterns checked in declaration order; first hit wins
    pub patterns: Vec<Pattern>,
    /// Fixed confidence emitted on match
    pub confidence: f32,
    /// Higher priority rules are scanned first
    pub priority: i32,
    /// Data fields the agent is asking for
    pub fields: Vec<DataField>,
    /// Confirmation subject for confirm_or_deny
    pub subject: Option<ConfirmationSubject>,
    /// Expected-answer hint
    pub expected_answer: Option<ExpectedAnswer>,
    /// Terminal state emitted on match
    pub terminal: TerminalState,
    /// Run the offered-options extractor on the utterance
    pub extract_options: bool,
}

impl ClassifierRule {
    fn new(name: &'static str, category: ResponseCategory, priority: i32, confidence: f32) -> Self {
        Self {
            name,
            category,
            patterns: Vec::new(),
            confidence,
            priority,
            fields: Vec::new(),
            subject: None,
            expected_answer: None,
            terminal: TerminalState::None,
            extract_options: false,
        }
    }

    fn contains(mut self, phrases: &'static [&'static str]) -> Self {
        self.patterns
            .extend(phrases.iter().copied().map(Pattern::Contains));
        self
    }

    fn all_of(mut self, phrases: &'static [&'static str]) -> Self {
        self.patterns.push(Pattern::AllOf(phrases));
        self
    }

    fn fields(mut self, fields: &[DataField]) -> Self {
        self.fields = fields.to_vec();
        self
    }

    fn subject(mut self, subject: ConfirmationSubject) -> Self {
        self.subject = Some(subject);
        self
    }

    fn expects(mut self, answer: ExpectedAnswer) -> Self {
        self.expected_answer = Some(answer);
        self
    }

    fn terminal(mut self, terminal: TerminalState) -> Self {
        self.terminal = terminal;
        self
    }

    fn options(mut self) -> Self {
        self.extract_options = true;
        self
    }

    /// First matching pattern, in declaration order
    pub fn first_match(&self, normalized: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.matches(normalized))
    }
}

/// Build the hand-authored rule table, sorted by priority descending
///
/// The in-progress guards sit above the booking-confirmation rules so that
/// "I'll schedule that now" is never read as a completed booking.
pub fn default_rule_table() -> Vec<ClassifierRule> {
    let mut rules = vec![
        // --- guards against in-progress phrasing misread as terminal ---
        ClassifierRule::new("booking_in_progress_guard", ResponseCategory::Acknowledge, 200, 0.9)
            .contains(&[
                "let me check",
                "let me verify",
                "let me see",
                "let me look",
                "i'll check",
                "i will check",
                "checking availability",
                "one moment while",
                "i'll schedule",
                "i will schedule",
                "i'm scheduling",
                "let me book",
                "let me get that scheduled",
                "i'll go ahead and schedule",
            ]),
        // --- terminal states ---
        ClassifierRule::new("booking_confirmed", ResponseCategory::Acknowledge, 190, 0.95)
            .contains(&[
                "has been successfully scheduled",
                "has been scheduled",
                "has been booked",
                "is confirmed for",
                "appointment is confirmed",
                "successfully booked",
                "you're all set for",
                "you are all set",
                "we've got you scheduled",
                "booked you in",
                "is scheduled for",
            ])
            .terminal(TerminalState::BookingConfirmed),
        ClassifierRule::new("transfer_initiated", ResponseCategory::Acknowledge, 185, 0.95)
            .contains(&[
                "transfer you",
                "transferring you",
                "connect you with",
                "connect you to",
                "put you through",
                "hold while i transfer",
            ])
            .terminal(TerminalState::TransferInitiated),
        ClassifierRule::new("conversation_ended", ResponseCategory::Acknowledge, 180, 0.9)
            .contains(&[
                "goodbye",
                "bye now",
                "have a great day",
                "have a wonderful day",
                "have a good day",
                "take care",
            ])
            .terminal(TerminalState::ConversationEnded),
        // --- combined card reminder + special needs question ---
        // Must outrank the lone special-needs rule so both fields survive.
        ClassifierRule::new("card_reminder_special_needs", ResponseCategory::ProvideData, 170, 0.9)
            .all_of(&["insurance card", "special needs"])
            .all_of(&["your card", "special needs"])
            .fields(&[DataField::SpecialNeeds, DataField::CardReminder]),
        // --- confirm-or-deny subjects ---
        ClassifierRule::new("wants_address", ResponseCategory::ConfirmOrDeny, 160, 0.9)
            .contains(&[
                "would you like the address",
                "do you need the address",
                "want the address",
                "need directions",
            ])
            .subject(ConfirmationSubject::WantsAddress)
            .expects(ExpectedAnswer::Either),
        ClassifierRule::new("anything_else", ResponseCategory::ConfirmOrDeny, 158, 0.9)
            .contains(&["anything else", "what else can i"])
            .subject(ConfirmationSubject::AnythingElse)
            .expects(ExpectedAnswer::Either),
        ClassifierRule::new("orthodontic_scope", ResponseCategory::ConfirmOrDeny, 156, 0.9)
            .contains(&[
                "calling about orthodontic",
                "regarding orthodontic",
                "about orthodontics",
                "is this about braces",
            ])
            .subject(ConfirmationSubject::OrthodonticScope)
            .expects(ExpectedAnswer::Yes),
        ClassifierRule::new("scheduling_intent", ResponseCategory::ConfirmOrDeny, 154, 0.9)
            .contains(&[
                "would you like to schedule",
                "do you want to schedule",
                "shall we schedule",
                "would you like to book",
                "want to set up an appointment",
                "would you like to come in",
            ])
            .subject(ConfirmationSubject::SchedulingIntent)
            .expects(ExpectedAnswer::Yes),
        ClassifierRule::new("previous_visit", ResponseCategory::ConfirmOrDeny, 152, 0.85)
            .contains(&[
                "been seen here before",
                "been to our office",
                "visited us before",
                "a patient with us",
                "first visit",
            ])
            .subject(ConfirmationSubject::PreviousVisit)
            .expects(ExpectedAnswer::Either),
        ClassifierRule::new("previous_treatment", ResponseCategory::ConfirmOrDeny, 151, 0.85)
            .contains(&[
                "had braces before",
                "previous orthodontic treatment",
                "prior treatment",
                "any orthodontic work",
            ])
            .subject(ConfirmationSubject::PreviousTreatment)
            .expects(ExpectedAnswer::Either),
        ClassifierRule::new("special_needs", ResponseCategory::ConfirmOrDeny, 150, 0.85)
            .contains(&[
                "any special needs",
                "special needs or accommodations",
                "accommodations we should know",
            ])
            .subject(ConfirmationSubject::SpecialNeeds)
            .expects(ExpectedAnswer::Either),
        ClassifierRule::new("time_confirmation", ResponseCategory::ConfirmOrDeny, 145, 0.85)
            .contains(&[
                "does that time work",
                "does that work for you",
                "is that time okay",
                "work for you?",
            ])
            .subject(ConfirmationSubject::AppointmentTime)
            .expects(ExpectedAnswer::Yes),
        // --- offered alternatives ---
        ClassifierRule::new("select_time_options", ResponseCategory::SelectFromOptions, 140, 0.85)
            .contains(&["morning or afternoon"])
            .all_of(&["prefer", " or "])
            .all_of(&["we have", " or "])
            .all_of(&["works better", " or "])
            .fields(&[DataField::AppointmentTime])
            .options(),
        // --- data requests ---
        ClassifierRule::new("ask_parent_name", ResponseCategory::ProvideData, 130, 0.85)
            .contains(&[
                "your full name",
                "your name",
                "may i have your name",
                "who am i speaking with",
                "name for the account",
            ])
            .fields(&[DataField::ParentName]),
        ClassifierRule::new("ask_parent_phone", ResponseCategory::ProvideData, 128, 0.85)
            .contains(&[
                "phone number",
                "best number",
                "callback number",
                "number to reach you",
            ])
            .fields(&[DataField::ParentPhone]),
        ClassifierRule::new("ask_parent_email", ResponseCategory::ProvideData, 126, 0.85)
            .contains(&["email address", "your email"])
            .fields(&[DataField::ParentEmail]),
        ClassifierRule::new("ask_child_name", ResponseCategory::ProvideData, 124, 0.85)
            .contains(&[
                "child's name",
                "patient's name",
                "your son's name",
                "your daughter's name",
                "name of the patient",
                "who is the appointment for",
            ])
            .fields(&[DataField::ChildName]),
        ClassifierRule::new("ask_child_dob", ResponseCategory::ProvideData, 122, 0.85)
            .contains(&["date of birth", "birth date", "birthday", "when was he born", "when was she born"])
            .fields(&[DataField::ChildDob]),
        ClassifierRule::new("ask_child_age", ResponseCategory::ProvideData, 121, 0.85)
            .contains(&["how old"])
            .fields(&[DataField::ChildAge]),
        ClassifierRule::new("ask_insurance_id", ResponseCategory::ProvideData, 119, 0.85)
            .contains(&["member id", "policy number", "insurance id"])
            .fields(&[DataField::InsuranceId]),
        ClassifierRule::new("ask_insurance", ResponseCategory::ProvideData, 118, 0.85)
            .contains(&[
                "insurance provider",
                "insurance carrier",
                "what insurance",
                "dental insurance",
                "insurance information",
            ])
            .fields(&[DataField::InsuranceProvider]),
        ClassifierRule::new("ask_appointment_day", ResponseCategory::ProvideData, 116, 0.85)
            .contains(&["what day works", "which day works", "what day would you like"])
            .fields(&[DataField::AppointmentDate]),
        ClassifierRule::new("ask_appointment_time", ResponseCategory::ProvideData, 115, 0.85)
            .contains(&["what time works", "what time would you like", "when would you like to come in"])
            .fields(&[DataField::AppointmentTime]),
        ClassifierRule::new("ask_location", ResponseCategory::ProvideData, 114, 0.85)
            .contains(&["which location", "which office", "closer to you"])
            .fields(&[DataField::LocationPreference]),
        ClassifierRule::new("ask_visit_reason", ResponseCategory::ProvideData, 100, 0.8)
            .contains(&[
                "how can i help",
                "how may i help",
                "what can i do for you",
                "reason for your call",
                "what brings you",
            ])
            .fields(&[DataField::VisitReason]),
        // --- soft preference ---
        ClassifierRule::new("express_preference", ResponseCategory::ExpressPreference, 90, 0.8)
            .contains(&[
                "do you have a preference",
                "any preference",
                "whatever works best for you",
            ]),
        // --- informational statements ---
        ClassifierRule::new("address_info", ResponseCategory::Acknowledge, 80, 0.85)
            .contains(&["our address is", "we are located", "we're located", "located at"]),
        ClassifierRule::new("parking_info", ResponseCategory::Acknowledge, 80, 0.85)
            .contains(&["parking"]),
        ClassifierRule::new("card_reminder_info", ResponseCategory::Acknowledge, 78, 0.8)
            .contains(&["bring your insurance card", "bring the insurance card"]),
        ClassifierRule::new("agent_asks_repeat", ResponseCategory::ClarifyRequest, 60, 0.8)
            .contains(&["could you repeat", "say that again", "didn't catch that"]),
        // --- low-priority catch-all: an unparsed question ---
        ClassifierRule::new("unparsed_question", ResponseCategory::ClarifyRequest, 5, 0.4)
            .contains(&["?"]),
    ];

    // Stable: equal priorities keep declaration order.
    rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
    rules
}

static OPTION_LEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:would you (?:prefer|like)|do you (?:prefer|want)|prefer|rather)\s+(.+?)[?.!]?$")
        .expect("option lead regex")
});

static OPTION_AVAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)we have\s+(.+?)\s+(?:available|open)").expect("option avail regex")
});

static OPTION_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*|\s+or\s+").expect("option split regex"));

/// Extract offered alternatives ("morning or afternoon", "Monday at 9, or
/// Tuesday at 2") from an utterance
pub fn extract_offered_options(utterance: &str) -> Vec<String> {
    let tail = OPTION_LEAD
        .captures(utterance)
        .or_else(|| OPTION_AVAIL.captures(utterance))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            // last sentence containing " or "
            utterance
                .split(['.', '!'])
                .rev()
                .find(|s| s.contains(" or "))
                .map(|s| s.trim_end_matches('?').to_string())
        });

    match tail {
        Some(tail) => OPTION_SPLIT
            .split(&tail)
            .map(|s| s.trim().trim_end_matches(['?', '.', '!']).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => Vec::new(),
    }
}
