//! Legacy intent vocabulary and flow states
//!
//! The progress tracker consumes classifications through a coarser,
//! intent-shaped lens. The adaptation from `ClassificationResult` to
//! `LegacyIntent` is a fixed mapping, not a second classifier.

use serde::{Deserialize, Serialize};

use crate::classification::{
    ClassificationResult, DataField, ResponseCategory, TerminalState,
};

/// Coarse per-turn intent consumed by the progress tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyIntent {
    Greeting,
    AskingParentName,
    AskingParentPhone,
    AskingParentEmail,
    AskingChildName,
    AskingChildDob,
    AskingHistory,
    AskingInsurance,
    ProposingTimes,
    ConfirmingDetails,
    ConfirmingBooking,
    InitiatingTransfer,
    SayingGoodbye,
    Acknowledging,
    Unknown,
}

impl LegacyIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyIntent::Greeting => "greeting",
            LegacyIntent::AskingParentName => "asking_parent_name",
            LegacyIntent::AskingParentPhone => "asking_parent_phone",
            LegacyIntent::AskingParentEmail => "asking_parent_email",
            LegacyIntent::AskingChildName => "asking_child_name",
            LegacyIntent::AskingChildDob => "asking_child_dob",
            LegacyIntent::AskingHistory => "asking_history",
            LegacyIntent::AskingInsurance => "asking_insurance",
            LegacyIntent::ProposingTimes => "proposing_times",
            LegacyIntent::ConfirmingDetails => "confirming_details",
            LegacyIntent::ConfirmingBooking => "confirming_booking",
            LegacyIntent::InitiatingTransfer => "initiating_transfer",
            LegacyIntent::SayingGoodbye => "saying_goodbye",
            LegacyIntent::Acknowledging => "acknowledging",
            LegacyIntent::Unknown => "unknown",
        }
    }

    /// Adapt a classification to the legacy intent vocabulary
    ///
    /// Terminal states win over the category; within `provide_data` the
    /// first requested field decides.
    pub fn from_classification(c: &ClassificationResult) -> Self {
        match c.terminal_state {
            TerminalState::BookingConfirmed => return LegacyIntent::ConfirmingBooking,
            TerminalState::TransferInitiated => return LegacyIntent::InitiatingTransfer,
            TerminalState::ConversationEnded => return LegacyIntent::SayingGoodbye,
            TerminalState::ErrorTerminal => return LegacyIntent::Unknown,
            TerminalState::None => {}
        }
        // A downgraded booking confirmation still counts as one.
        if c.confirmed_this_turn {
            return LegacyIntent::ConfirmingBooking;
        }
        match c.category {
            ResponseCategory::ProvideData => match c.requested_fields.first() {
                Some(DataField::ParentName) => LegacyIntent::AskingParentName,
                Some(DataField::ParentPhone) => LegacyIntent::AskingParentPhone,
                Some(DataField::ParentEmail) => LegacyIntent::AskingParentEmail,
                Some(DataField::ChildName) => LegacyIntent::AskingChildName,
                Some(DataField::ChildDob) | Some(DataField::ChildAge) => {
                    LegacyIntent::AskingChildDob
                }
                Some(DataField::PreviousVisit)
                | Some(DataField::PreviousTreatment)
                | Some(DataField::SpecialNeeds)
                | Some(DataField::CardReminder) => LegacyIntent::AskingHistory,
                Some(DataField::InsuranceProvider) | Some(DataField::InsuranceId) => {
                    LegacyIntent::AskingInsurance
                }
                Some(DataField::AppointmentDate)
                | Some(DataField::AppointmentTime)
                | Some(DataField::LocationPreference) => LegacyIntent::ProposingTimes,
                Some(DataField::VisitReason) => LegacyIntent::Greeting,
                Some(DataField::Unknown) | None => LegacyIntent::Unknown,
            },
            ResponseCategory::SelectFromOptions | ResponseCategory::ExpressPreference => {
                LegacyIntent::ProposingTimes
            }
            ResponseCategory::ConfirmOrDeny => LegacyIntent::ConfirmingDetails,
            ResponseCategory::Acknowledge => LegacyIntent::Acknowledging,
            ResponseCategory::ClarifyRequest => LegacyIntent::Unknown,
        }
    }
}

impl std::fmt::Display for LegacyIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse label for the conversation's current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum FlowState {
    #[default]
    Greeting,
    CollectingParentInfo,
    CollectingChildInfo,
    CollectingHistory,
    CollectingInsurance,
    Scheduling,
    Booking,
    Confirmation,
    Transfer,
    Ended,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Greeting => "greeting",
            FlowState::CollectingParentInfo => "collecting_parent_info",
            FlowState::CollectingChildInfo => "collecting_child_info",
            FlowState::CollectingHistory => "collecting_history",
            FlowState::CollectingInsurance => "collecting_insurance",
            FlowState::Scheduling => "scheduling",
            FlowState::Booking => "booking",
            FlowState::Confirmation => "confirmation",
            FlowState::Transfer => "transfer",
            FlowState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::ConfirmationSubject;

    #[test]
    fn test_terminal_wins_over_category() {
        let c = ClassificationResult::new(ResponseCategory::Acknowledge, 0.9)
            .with_terminal(TerminalState::TransferInitiated);
        assert_eq!(
            LegacyIntent::from_classification(&c),
            LegacyIntent::InitiatingTransfer
        );
    }

    #[test]
    fn test_downgraded_booking_still_confirms() {
        let mut c = ClassificationResult::new(ResponseCategory::ConfirmOrDeny, 0.9)
            .with_subject(ConfirmationSubject::WantsAddress);
        c.confirmed_this_turn = true;
        assert_eq!(
            LegacyIntent::from_classification(&c),
            LegacyIntent::ConfirmingBooking
        );
    }

    #[test]
    fn test_first_field_decides() {
        let c = ClassificationResult::new(ResponseCategory::ProvideData, 0.85)
            .with_fields(vec![DataField::ChildDob, DataField::ChildName]);
        assert_eq!(
            LegacyIntent::from_classification(&c),
            LegacyIntent::AskingChildDob
        );
    }

    #[test]
    fn test_no_fields_is_unknown() {
        let c = ClassificationResult::new(ResponseCategory::ProvideData, 0.3);
        assert_eq!(LegacyIntent::from_classification(&c), LegacyIntent::Unknown);
    }
}
