//! Conversation state machine — which step of the flow the user is in.

use serde::{Deserialize, Serialize};

/// The states of the booking conversation.
///
/// The booking path progresses `Welcome → MainMenu → LocationCapture →
/// ServiceSelection → TimeSelection → PaymentMethod → PaymentConfirmation →
/// Prediagnosis` and cycles back to `MainMenu` on completion. The remaining
/// states are self-contained menu sub-flows that return to `MainMenu`.
/// There is no terminal state — the machine is cyclic by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Welcome,
    MainMenu,
    LocationCapture,
    ServiceSelection,
    TimeSelection,
    PaymentMethod,
    PaymentConfirmation,
    Prediagnosis,
    ViewBookings,
    RescheduleCancel,
    RescheduleTimeSelection,
    Notifications,
    LoyaltyProgram,
    VanTracking,
    BundleRecommendations,
    ReferralSystem,
    Support,
}

impl ConversationState {
    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Self-loops (validation re-prompts) are always valid; every state can
    /// fall back to `MainMenu`.
    pub fn can_transition_to(&self, target: ConversationState) -> bool {
        use ConversationState::*;

        if *self == target || target == MainMenu {
            return true;
        }

        matches!(
            (self, target),
            // Booking path
            (Welcome, LocationCapture)
                | (MainMenu, LocationCapture)
                | (LocationCapture, ServiceSelection)
                | (ServiceSelection, TimeSelection)
                | (TimeSelection, PaymentMethod)
                | (PaymentMethod, PaymentConfirmation)
                | (PaymentConfirmation, Prediagnosis)
                // Menu sub-flows
                | (MainMenu, ViewBookings)
                | (MainMenu, RescheduleCancel)
                | (RescheduleCancel, RescheduleTimeSelection)
                | (MainMenu, Notifications)
                | (MainMenu, LoyaltyProgram)
                | (MainMenu, VanTracking)
                | (MainMenu, BundleRecommendations)
                | (MainMenu, ReferralSystem)
                | (MainMenu, Support)
                | (Welcome, Support)
                // A sub-flow can hand off into a fresh booking
                | (ViewBookings, LocationCapture)
                | (VanTracking, LocationCapture)
                | (BundleRecommendations, LocationCapture)
        )
    }

    /// States whose menu accepts only the listed numeric keys (strict menus
    /// that never route free text to the advisory gateway).
    pub fn is_strict_menu(&self) -> bool {
        matches!(
            self,
            Self::ServiceSelection
                | Self::TimeSelection
                | Self::PaymentMethod
                | Self::RescheduleTimeSelection
        )
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::Welcome
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Welcome => "welcome",
            Self::MainMenu => "main_menu",
            Self::LocationCapture => "location_capture",
            Self::ServiceSelection => "service_selection",
            Self::TimeSelection => "time_selection",
            Self::PaymentMethod => "payment_method",
            Self::PaymentConfirmation => "payment_confirmation",
            Self::Prediagnosis => "prediagnosis",
            Self::ViewBookings => "view_bookings",
            Self::RescheduleCancel => "reschedule_cancel",
            Self::RescheduleTimeSelection => "reschedule_time_selection",
            Self::Notifications => "notifications",
            Self::LoyaltyProgram => "loyalty_program",
            Self::VanTracking => "van_tracking",
            Self::BundleRecommendations => "bundle_recommendations",
            Self::ReferralSystem => "referral_system",
            Self::Support => "support",
        };
        write!(f, "{s}")
    }
}

/// All states, for totality tests.
pub const ALL_STATES: [ConversationState; 17] = [
    ConversationState::Welcome,
    ConversationState::MainMenu,
    ConversationState::LocationCapture,
    ConversationState::ServiceSelection,
    ConversationState::TimeSelection,
    ConversationState::PaymentMethod,
    ConversationState::PaymentConfirmation,
    ConversationState::Prediagnosis,
    ConversationState::ViewBookings,
    ConversationState::RescheduleCancel,
    ConversationState::RescheduleTimeSelection,
    ConversationState::Notifications,
    ConversationState::LoyaltyProgram,
    ConversationState::VanTracking,
    ConversationState::BundleRecommendations,
    ConversationState::ReferralSystem,
    ConversationState::Support,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_path_transitions_are_valid() {
        use ConversationState::*;
        let path = [
            (Welcome, MainMenu),
            (MainMenu, LocationCapture),
            (LocationCapture, ServiceSelection),
            (ServiceSelection, TimeSelection),
            (TimeSelection, PaymentMethod),
            (PaymentMethod, PaymentConfirmation),
            (PaymentConfirmation, Prediagnosis),
            (Prediagnosis, MainMenu),
        ];
        for (from, to) in path {
            assert!(from.can_transition_to(to), "{from} -> {to} should be valid");
        }
    }

    #[test]
    fn self_loops_are_always_valid() {
        for state in ALL_STATES {
            assert!(state.can_transition_to(state));
        }
    }

    #[test]
    fn every_state_can_return_to_main_menu() {
        for state in ALL_STATES {
            assert!(state.can_transition_to(ConversationState::MainMenu));
        }
    }

    #[test]
    fn skipping_booking_steps_is_invalid() {
        use ConversationState::*;
        assert!(!LocationCapture.can_transition_to(TimeSelection));
        assert!(!ServiceSelection.can_transition_to(PaymentMethod));
        assert!(!MainMenu.can_transition_to(Prediagnosis));
    }

    #[test]
    fn going_backward_is_invalid() {
        use ConversationState::*;
        assert!(!TimeSelection.can_transition_to(ServiceSelection));
        assert!(!Prediagnosis.can_transition_to(PaymentMethod));
    }

    #[test]
    fn display_matches_serde() {
        for state in ALL_STATES {
            let display = format!("{state}");
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(format!("\"{display}\""), json);
        }
    }

    #[test]
    fn strict_menus_are_the_fixed_key_states() {
        use ConversationState::*;
        assert!(ServiceSelection.is_strict_menu());
        assert!(TimeSelection.is_strict_menu());
        assert!(PaymentMethod.is_strict_menu());
        assert!(!MainMenu.is_strict_menu());
        assert!(!Prediagnosis.is_strict_menu());
    }
}
