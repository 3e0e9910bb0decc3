//! Response strategy engine
//!
//! Converts a classification plus a caller persona into the next caller
//! utterance. Never throws; always produces some text, or the defined
//! empty string for a deliberate silence simulation.

use callsim_core::{
    CallerPersona, ClassificationResult, ConfirmationSubject, ResponseCategory, Verbosity,
};
use callsim_config::ResponderSettings;

use crate::data_map::persona_value;
use crate::fallback::smart_fallback;
use crate::format::{PhraseKind, ResponseFormatter};

/// Running context the engine consults when choosing a reply
#[derive(Debug, Clone, Default)]
pub struct ResponseContext {
    /// The agent utterance being answered (used by the smart fallback)
    pub agent_utterance: String,
    /// The booking has already been completed this conversation
    pub booking_completed: bool,
    /// Index of the child currently under discussion
    pub active_child: usize,
}

impl ResponseContext {
    pub fn new(agent_utterance: impl Into<String>) -> Self {
        Self {
            agent_utterance: agent_utterance.into(),
            booking_completed: false,
            active_child: 0,
        }
    }

    pub fn booking_completed(mut self, completed: bool) -> Self {
        self.booking_completed = completed;
        self
    }

    pub fn active_child(mut self, index: usize) -> Self {
        self.active_child = index;
        self
    }
}

/// Synthesizes the simulated caller's replies
pub struct ResponseStrategyEngine {
    formatter: ResponseFormatter,
    settings: ResponderSettings,
}

impl ResponseStrategyEngine {
    pub fn new(settings: ResponderSettings) -> Self {
        let formatter = match settings.phrase_seed {
            Some(seed) => ResponseFormatter::with_seed(seed),
            None => ResponseFormatter::new(),
        };
        Self {
            formatter,
            settings,
        }
    }

    /// Generate the caller's next line
    pub fn generate_response(
        &self,
        classification: &ClassificationResult,
        persona: &CallerPersona,
        context: &ResponseContext,
    ) -> String {
        match classification.category {
            ResponseCategory::ProvideData => self.provide_data(classification, persona, context),
            ResponseCategory::ConfirmOrDeny => self.confirm_or_deny(classification, persona, context),
            ResponseCategory::SelectFromOptions => self.select_option(classification, persona),
            ResponseCategory::Acknowledge => self.acknowledge(classification, persona, context),
            ResponseCategory::ClarifyRequest => self.decorate(
                persona.verbosity,
                PhraseKind::Clarify,
                "could you say that again?",
            ),
            ResponseCategory::ExpressPreference => self.express_preference(persona),
        }
    }

    fn provide_data(
        &self,
        classification: &ClassificationResult,
        persona: &CallerPersona,
        context: &ResponseContext,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();
        for field in &classification.requested_fields {
            if let Some(value) = persona_value(persona, *field, context.active_child) {
                parts.push(value);
            }
        }

        if !parts.is_empty() {
            let core = parts.join(", and ");
            return self.decorate(persona.verbosity, PhraseKind::Data, &core);
        }

        // Classification attached no usable field; the wording itself may
        // still make the intent obvious.
        if let Some(field) = smart_fallback(&context.agent_utterance) {
            if let Some(value) = persona_value(persona, field, context.active_child) {
                return self.decorate(persona.verbosity, PhraseKind::Data, &value);
            }
        }

        // An uncertain reply is more likely to stall the agent into a
        // repeat loop than a cooperative affirmative.
        self.decorate(persona.verbosity, PhraseKind::Confirm, "yes, that's right")
    }

    fn confirm_or_deny(
        &self,
        classification: &ClassificationResult,
        persona: &CallerPersona,
        context: &ResponseContext,
    ) -> String {
        let utterance = context.agent_utterance.to_lowercase();
        let subject = classification.confirmation_subject.unwrap_or_default();

        // Override ladder, in precedence order.
        if context.booking_completed
            && (subject == ConfirmationSubject::AnythingElse || utterance.contains("anything else"))
        {
            return self.decorate(
                persona.verbosity,
                PhraseKind::Deny,
                "no, that's everything, thank you",
            );
        }

        if subject == ConfirmationSubject::OrthodonticScope && !persona.reason_is_orthodontic() {
            let core = format!("no, I'm actually calling about {}", persona.visit_reason);
            return self.decorate(persona.verbosity, PhraseKind::Deny, &core);
        }

        if subject == ConfirmationSubject::SchedulingIntent {
            return self.decorate(
                persona.verbosity,
                PhraseKind::Confirm,
                "yes, I'd like to schedule an appointment",
            );
        }

        match subject {
            ConfirmationSubject::PreviousVisit => {
                let new_patient = persona
                    .child(context.active_child)
                    .map(|c| c.new_patient)
                    .unwrap_or(true);
                if new_patient {
                    self.decorate(
                        persona.verbosity,
                        PhraseKind::Deny,
                        "no, this would be our first visit",
                    )
                } else {
                    self.decorate(
                        persona.verbosity,
                        PhraseKind::Confirm,
                        "yes, we've been in before",
                    )
                }
            }
            ConfirmationSubject::PreviousTreatment => {
                let prior = persona
                    .child(context.active_child)
                    .map(|c| c.prior_treatment)
                    .unwrap_or(false);
                if prior {
                    self.decorate(
                        persona.verbosity,
                        PhraseKind::Confirm,
                        "yes, there was some treatment before",
                    )
                } else {
                    self.decorate(persona.verbosity, PhraseKind::Deny, "no, nothing before")
                }
            }
            ConfirmationSubject::SpecialNeeds => {
                match persona
                    .child(context.active_child)
                    .and_then(|c| c.special_needs.clone())
                {
                    Some(note) => {
                        let core = format!("yes, {note}");
                        self.decorate(persona.verbosity, PhraseKind::Confirm, &core)
                    }
                    None => self.decorate(persona.verbosity, PhraseKind::Deny, "no special needs"),
                }
            }
            // The simulated caller is cooperative by default.
            _ => self.decorate(persona.verbosity, PhraseKind::Confirm, "yes, that works"),
        }
    }

    fn select_option(
        &self,
        classification: &ClassificationResult,
        persona: &CallerPersona,
    ) -> String {
        let options = &classification.offered_options;

        if options.is_empty() {
            return self.express_preference(persona);
        }

        let chosen = Self::pick_option(options, persona)
            .unwrap_or_else(|| options[0].clone());
        let core = format!("{chosen} would be great");
        self.decorate(persona.verbosity, PhraseKind::Select, &core)
    }

    /// Option choice precedence: time of day, then location, then day of week
    fn pick_option(options: &[String], persona: &CallerPersona) -> Option<String> {
        if let Some(time) = persona.scheduling.time_of_day {
            if let Some(option) = options
                .iter()
                .find(|o| o.to_lowercase().contains(time.as_str()))
            {
                return Some(option.clone());
            }
        }
        if let Some(location) = &persona.scheduling.location {
            if let Some(option) = options
                .iter()
                .find(|o| o.to_lowercase().contains(&location.to_lowercase()))
            {
                return Some(option.clone());
            }
        }
        if let Some(day) = &persona.scheduling.day_of_week {
            if let Some(option) = options
                .iter()
                .find(|o| o.to_lowercase().contains(&day.to_lowercase()))
            {
                return Some(option.clone());
            }
        }
        None
    }

    fn acknowledge(
        &self,
        classification: &ClassificationResult,
        persona: &CallerPersona,
        context: &ResponseContext,
    ) -> String {
        let utterance = context.agent_utterance.to_lowercase();

        if context.booking_completed && utterance.contains("anything else") {
            return self.decorate(
                persona.verbosity,
                PhraseKind::Deny,
                "no, that's all, thank you",
            );
        }

        let core = if classification.confirmed_this_turn
            || utterance.contains("confirmed")
            || utterance.contains("scheduled")
        {
            "perfect, thank you so much"
        } else if utterance.contains("address") || utterance.contains("located") {
            "got the address, thank you"
        } else if utterance.contains("parking") {
            "good to know about the parking, thanks"
        } else {
            // Deliberate silence: after a closed booking there is nothing
            // left for a generic acknowledgment to add.
            if self.settings.allow_silence && context.booking_completed {
                return String::new();
            }
            "okay"
        };

        self.decorate(persona.verbosity, PhraseKind::Acknowledge, core)
    }

    fn express_preference(&self, persona: &CallerPersona) -> String {
        let core = if let Some(time) = persona.scheduling.time_of_day {
            format!("{}s usually work best for us", time.as_str())
        } else if let Some(day) = &persona.scheduling.day_of_week {
            format!("{day} would be ideal")
        } else if let Some(location) = &persona.scheduling.location {
            format!("the {location} office is closer for us")
        } else {
            "we're pretty flexible".to_string()
        };
        self.decorate(persona.verbosity, PhraseKind::Preference, &core)
    }

    fn decorate(&self, verbosity: Verbosity, kind: PhraseKind, core: &str) -> String {
        self.formatter.decorate(verbosity, kind, core)
    }
}
