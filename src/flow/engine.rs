//! The pure transition function of the conversation state machine.
//!
//! `step()` takes the session, the inbound text, and produces the next
//! state plus at most one side-effect intent. It performs no I/O: effects
//! are executed by the dispatcher (`bot::Bot`), which also composes the
//! reply for effect-dependent steps.
//!
//! Totality: every (state, input) pair yields a defined outcome — at worst
//! a self-loop re-prompt. Re-prompting mutates nothing, so redelivery of
//! the same invalid input is idempotent.

use crate::catalog::{PaymentMethod, service_by_key, slot_by_key};
use crate::flow::menu::{self, MenuIntent, match_menu};
use crate::flow::prompts;
use crate::flow::state::ConversationState;
use crate::profile::NotificationPref;
use crate::session::Session;

/// A side-effect intent for the dispatcher to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Resolve the captured location into a zone/fee/ETA quote.
    ResolveLogistics { location: String },
    /// Route free text to the advisory gateway.
    AskAdvisory { text: String },
    /// Initiate payment for the draft's logistics fee.
    InitiatePayment { method: PaymentMethod },
    /// Commit the draft booking.
    CompleteBooking,
    /// First contact: greet with personalized recommendations.
    ShowWelcome,
    ShowBookings,
    ShowLoyalty,
    ShowLoyaltyHistory,
    ShowReferral,
    GenerateReferral,
    RedeemReferral { code: String },
    ToggleNotificationPref { pref: NotificationPref },
    ShowNotificationPrefs,
    ShowVanTracking,
    ShowBundles,
    CancelActiveBooking,
    RescheduleActiveBooking { slot_key: String },
}

/// Outcome of one transition step.
///
/// `reply` is `None` exactly when the effect's result is needed to compose
/// the message (the dispatcher builds it from `prompts`).
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub reply: Option<String>,
    pub effect: Option<Effect>,
}

impl StepOutcome {
    fn reply(text: String) -> Self {
        Self {
            reply: Some(text),
            effect: None,
        }
    }

    fn effect(effect: Effect) -> Self {
        Self {
            reply: None,
            effect: Some(effect),
        }
    }
}

/// Advance the session by one inbound message.
pub fn step(session: &mut Session, input: &str) -> StepOutcome {
    use ConversationState as S;

    match session.state {
        S::Welcome => step_welcome(session, input),
        S::MainMenu => step_main_menu(session, input),
        S::LocationCapture => step_location_capture(session, input),
        S::ServiceSelection => step_service_selection(session, input),
        S::TimeSelection => step_time_selection(session, input),
        S::PaymentMethod => step_payment_method(session, input),
        S::PaymentConfirmation => step_payment_confirmation(session, input),
        S::Prediagnosis => step_prediagnosis(session, input),
        S::ViewBookings => step_view_bookings(session, input),
        S::RescheduleCancel => step_reschedule_cancel(session, input),
        S::RescheduleTimeSelection => step_reschedule_time(session, input),
        S::Notifications => step_notifications(session, input),
        S::LoyaltyProgram => step_loyalty(session, input),
        S::VanTracking => step_van_tracking(session, input),
        S::BundleRecommendations => step_bundles(session, input),
        S::ReferralSystem => step_referral(session, input),
        S::Support => step_support(session, input),
    }
}

fn step_welcome(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::WELCOME_MENU, input) {
        Some(MenuIntent::StartBooking) => {
            session.state = ConversationState::LocationCapture;
            StepOutcome::reply(prompts::request_location())
        }
        _ => {
            session.state = ConversationState::MainMenu;
            StepOutcome::effect(Effect::ShowWelcome)
        }
    }
}

fn step_main_menu(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::MAIN_MENU, input) {
        Some(MenuIntent::StartBooking) => {
            session.state = ConversationState::LocationCapture;
            StepOutcome::reply(prompts::request_location())
        }
        Some(MenuIntent::ViewBookings) => {
            session.state = ConversationState::ViewBookings;
            StepOutcome::effect(Effect::ShowBookings)
        }
        Some(MenuIntent::RescheduleCancel) => {
            session.state = ConversationState::RescheduleCancel;
            StepOutcome::reply(prompts::reschedule_cancel_menu())
        }
        Some(MenuIntent::Support) => {
            session.state = ConversationState::Support;
            StepOutcome::reply(prompts::support())
        }
        Some(MenuIntent::Notifications) => {
            session.state = ConversationState::Notifications;
            StepOutcome::effect(Effect::ShowNotificationPrefs)
        }
        Some(MenuIntent::Loyalty) => {
            session.state = ConversationState::LoyaltyProgram;
            StepOutcome::effect(Effect::ShowLoyalty)
        }
        Some(MenuIntent::VanTracking) => {
            session.state = ConversationState::VanTracking;
            StepOutcome::effect(Effect::ShowVanTracking)
        }
        Some(MenuIntent::Bundles) => {
            session.state = ConversationState::BundleRecommendations;
            StepOutcome::effect(Effect::ShowBundles)
        }
        Some(MenuIntent::Referrals) => {
            session.state = ConversationState::ReferralSystem;
            StepOutcome::effect(Effect::ShowReferral)
        }
        _ => free_text_fallback(input),
    }
}

/// Unmatched input outside strict menus: long free text goes to the
/// advisory gateway, anything else re-prompts. State is unchanged either way.
fn free_text_fallback(input: &str) -> StepOutcome {
    if menu::looks_like_question(input) {
        StepOutcome::effect(Effect::AskAdvisory {
            text: input.trim().to_string(),
        })
    } else {
        StepOutcome::reply(prompts::invalid_menu_choice())
    }
}

fn step_location_capture(session: &mut Session, input: &str) -> StepOutcome {
    let location = input.trim();
    if location.is_empty() {
        return StepOutcome::reply(prompts::request_location());
    }
    session.draft.location = Some(location.to_string());
    session.state = ConversationState::ServiceSelection;
    StepOutcome::effect(Effect::ResolveLogistics {
        location: location.to_string(),
    })
}

fn step_service_selection(session: &mut Session, input: &str) -> StepOutcome {
    let key = input.trim();
    match service_by_key(key) {
        Some(service) => {
            session.draft.service_key = Some(key.to_string());
            session.state = ConversationState::TimeSelection;
            StepOutcome::reply(prompts::time_menu(service))
        }
        None => StepOutcome::reply(prompts::invalid_service()),
    }
}

fn step_time_selection(session: &mut Session, input: &str) -> StepOutcome {
    let key = input.trim();
    match slot_by_key(key) {
        Some(_) => {
            session.draft.slot_key = Some(key.to_string());
            session.state = ConversationState::PaymentMethod;
            StepOutcome::reply(prompts::payment_menu())
        }
        None => StepOutcome::reply(prompts::invalid_time_slot()),
    }
}

fn step_payment_method(session: &mut Session, input: &str) -> StepOutcome {
    match PaymentMethod::by_key(input.trim()) {
        Some(method) => {
            session.draft.payment_method = Some(method);
            session.state = ConversationState::PaymentConfirmation;
            StepOutcome::effect(Effect::InitiatePayment { method })
        }
        None => StepOutcome::reply(prompts::invalid_payment_method()),
    }
}

fn step_payment_confirmation(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::PAYMENT_CONFIRMATION_MENU, input) {
        Some(MenuIntent::PaymentDone) => {
            session.state = ConversationState::Prediagnosis;
            StepOutcome::reply(prompts::prediagnosis_prompt())
        }
        Some(MenuIntent::CancelVisit) => {
            session.reset_draft();
            session.state = ConversationState::MainMenu;
            StepOutcome::reply(prompts::main_menu())
        }
        _ => StepOutcome::reply(prompts::payment_pending()),
    }
}

fn step_prediagnosis(session: &mut Session, input: &str) -> StepOutcome {
    let trimmed = input.trim();
    if !trimmed.eq_ignore_ascii_case("skip") && !trimmed.is_empty() {
        session.draft.prediagnosis = Some(trimmed.to_string());
    }
    // Any text, however unparseable, proceeds to completion.
    StepOutcome::effect(Effect::CompleteBooking)
}

fn step_view_bookings(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::VIEW_BOOKINGS_MENU, input) {
        Some(MenuIntent::StartBooking) => {
            session.state = ConversationState::LocationCapture;
            StepOutcome::reply(prompts::request_location())
        }
        _ => {
            session.state = ConversationState::MainMenu;
            StepOutcome::reply(prompts::main_menu())
        }
    }
}

fn step_reschedule_cancel(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::RESCHEDULE_CANCEL_MENU, input) {
        Some(MenuIntent::CancelVisit) => {
            session.state = ConversationState::MainMenu;
            StepOutcome::effect(Effect::CancelActiveBooking)
        }
        Some(MenuIntent::RescheduleVisit) => {
            session.state = ConversationState::RescheduleTimeSelection;
            StepOutcome::reply(prompts::reschedule_time_menu())
        }
        Some(MenuIntent::BackToMenu) => {
            session.state = ConversationState::MainMenu;
            StepOutcome::reply(prompts::main_menu())
        }
        _ => StepOutcome::reply(prompts::reschedule_cancel_menu()),
    }
}

fn step_reschedule_time(session: &mut Session, input: &str) -> StepOutcome {
    let key = input.trim();
    match slot_by_key(key) {
        Some(_) => {
            session.state = ConversationState::MainMenu;
            StepOutcome::effect(Effect::RescheduleActiveBooking {
                slot_key: key.to_string(),
            })
        }
        None => StepOutcome::reply(prompts::reschedule_time_menu()),
    }
}

fn step_notifications(session: &mut Session, input: &str) -> StepOutcome {
    let pref = match match_menu(menu::NOTIFICATIONS_MENU, input) {
        Some(MenuIntent::ToggleMedication) => Some(NotificationPref::Medication),
        Some(MenuIntent::ToggleFollowUp) => Some(NotificationPref::FollowUp),
        Some(MenuIntent::ToggleHealthTips) => Some(NotificationPref::HealthTips),
        Some(MenuIntent::ToggleLoyaltyUpdates) => Some(NotificationPref::Loyalty),
        Some(MenuIntent::BackToMenu) => {
            session.state = ConversationState::MainMenu;
            return StepOutcome::reply(prompts::main_menu());
        }
        _ => None,
    };

    match pref {
        Some(pref) => StepOutcome::effect(Effect::ToggleNotificationPref { pref }),
        None => StepOutcome::effect(Effect::ShowNotificationPrefs),
    }
}

fn step_loyalty(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::LOYALTY_MENU, input) {
        Some(MenuIntent::LoyaltyHistory) => StepOutcome::effect(Effect::ShowLoyaltyHistory),
        Some(MenuIntent::GenerateReferral) => StepOutcome::effect(Effect::GenerateReferral),
        Some(MenuIntent::BackToMenu) => {
            session.state = ConversationState::MainMenu;
            StepOutcome::reply(prompts::main_menu())
        }
        _ => StepOutcome::effect(Effect::ShowLoyalty),
    }
}

fn step_van_tracking(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::VAN_TRACKING_MENU, input) {
        Some(MenuIntent::RefreshTracking) => StepOutcome::effect(Effect::ShowVanTracking),
        Some(MenuIntent::BackToMenu) => {
            session.state = ConversationState::MainMenu;
            StepOutcome::reply(prompts::main_menu())
        }
        _ => StepOutcome::effect(Effect::ShowVanTracking),
    }
}

fn step_bundles(session: &mut Session, input: &str) -> StepOutcome {
    match match_menu(menu::BUNDLES_MENU, input) {
        Some(MenuIntent::StartBooking) => {
            session.state = ConversationState::LocationCapture;
            StepOutcome::reply(prompts::request_location())
        }
        Some(MenuIntent::BackToMenu) => {
            session.state = ConversationState::MainMenu;
            StepOutcome::reply(prompts::main_menu())
        }
        _ => StepOutcome::effect(Effect::ShowBundles),
    }
}

fn step_referral(session: &mut Session, input: &str) -> StepOutcome {
    // "redeem CODE" attempts redemption before menu matching.
    let trimmed = input.trim();
    if let Some(code) = trimmed
        .to_lowercase()
        .strip_prefix("redeem ")
        .map(|c| c.trim().to_uppercase())
        && !code.is_empty()
    {
        return StepOutcome::effect(Effect::RedeemReferral { code });
    }

    match match_menu(menu::REFERRAL_MENU, input) {
        Some(MenuIntent::GenerateReferral) => StepOutcome::effect(Effect::GenerateReferral),
        Some(MenuIntent::BackToMenu) => {
            session.state = ConversationState::MainMenu;
            StepOutcome::reply(prompts::main_menu())
        }
        _ => StepOutcome::effect(Effect::ShowReferral),
    }
}

fn step_support(session: &mut Session, _input: &str) -> StepOutcome {
    session.state = ConversationState::MainMenu;
    StepOutcome::reply(prompts::main_menu())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::state::ALL_STATES;
    use std::time::Duration;

    fn session_in(state: ConversationState) -> Session {
        let mut s = Session::new("+254700000001", Duration::from_secs(3600));
        s.state = state;
        s
    }

    #[test]
    fn welcome_book_goes_to_location_capture() {
        let mut s = session_in(ConversationState::Welcome);
        let out = step(&mut s, "1");
        assert_eq!(s.state, ConversationState::LocationCapture);
        assert!(out.reply.unwrap().contains("location"));
    }

    #[test]
    fn welcome_keyword_book_also_works() {
        let mut s = session_in(ConversationState::Welcome);
        step(&mut s, "I want to book a visit");
        assert_eq!(s.state, ConversationState::LocationCapture);
    }

    #[test]
    fn welcome_anything_else_greets_and_moves_to_menu() {
        let mut s = session_in(ConversationState::Welcome);
        let out = step(&mut s, "hello");
        assert_eq!(s.state, ConversationState::MainMenu);
        assert_eq!(out.effect, Some(Effect::ShowWelcome));
    }

    #[test]
    fn location_capture_emits_resolve_effect() {
        let mut s = session_in(ConversationState::LocationCapture);
        let out = step(&mut s, "Westlands");
        assert_eq!(s.state, ConversationState::ServiceSelection);
        assert_eq!(s.draft.location.as_deref(), Some("Westlands"));
        assert_eq!(
            out.effect,
            Some(Effect::ResolveLogistics {
                location: "Westlands".into()
            })
        );
    }

    #[test]
    fn valid_service_advances_to_time_selection() {
        let mut s = session_in(ConversationState::ServiceSelection);
        let out = step(&mut s, "5");
        assert_eq!(s.state, ConversationState::TimeSelection);
        assert_eq!(s.draft.service_key.as_deref(), Some("5"));
        assert!(out.reply.unwrap().contains("time slot"));
    }

    #[test]
    fn invalid_service_key_reprompts_unchanged() {
        let mut s = session_in(ConversationState::ServiceSelection);
        let before = s.clone();
        let out = step(&mut s, "9");
        assert_eq!(s, before, "invalid input must not mutate the session");
        assert_eq!(out.reply, Some(prompts::invalid_service()));
        assert!(out.effect.is_none());
    }

    #[test]
    fn invalid_input_reprompt_is_idempotent() {
        let mut s = session_in(ConversationState::ServiceSelection);
        let first = step(&mut s, "9");
        let second = step(&mut s, "9");
        assert_eq!(first, second);
    }

    #[test]
    fn strict_menu_does_not_route_to_advisory() {
        let mut s = session_in(ConversationState::ServiceSelection);
        let out = step(&mut s, "I have a headache and fever, what should I do?");
        assert!(out.effect.is_none(), "strict menus never call advisory");
        assert_eq!(s.state, ConversationState::ServiceSelection);
    }

    #[test]
    fn time_then_payment_then_confirmation() {
        let mut s = session_in(ConversationState::TimeSelection);
        step(&mut s, "2");
        assert_eq!(s.state, ConversationState::PaymentMethod);
        assert_eq!(s.draft.slot_key.as_deref(), Some("2"));

        let out = step(&mut s, "1");
        assert_eq!(s.state, ConversationState::PaymentConfirmation);
        assert_eq!(
            out.effect,
            Some(Effect::InitiatePayment {
                method: PaymentMethod::MobileMoney
            })
        );
    }

    #[test]
    fn paid_moves_to_prediagnosis() {
        let mut s = session_in(ConversationState::PaymentConfirmation);
        let out = step(&mut s, "PAID");
        assert_eq!(s.state, ConversationState::Prediagnosis);
        assert!(out.reply.unwrap().contains("SKIP"));
    }

    #[test]
    fn cancel_during_payment_resets_draft() {
        let mut s = session_in(ConversationState::PaymentConfirmation);
        s.draft.service_key = Some("5".into());
        step(&mut s, "cancel");
        assert_eq!(s.state, ConversationState::MainMenu);
        assert!(s.draft.service_key.is_none());
    }

    #[test]
    fn prediagnosis_skip_completes_without_text() {
        let mut s = session_in(ConversationState::Prediagnosis);
        let out = step(&mut s, "SKIP");
        assert_eq!(out.effect, Some(Effect::CompleteBooking));
        assert!(s.draft.prediagnosis.is_none());
    }

    #[test]
    fn prediagnosis_text_is_kept_and_completes() {
        let mut s = session_in(ConversationState::Prediagnosis);
        let out = step(&mut s, "My name is Alice, I have diabetes");
        assert_eq!(out.effect, Some(Effect::CompleteBooking));
        assert!(s.draft.prediagnosis.is_some());
    }

    #[test]
    fn main_menu_question_goes_to_advisory() {
        let mut s = session_in(ConversationState::MainMenu);
        let out = step(&mut s, "What should I do about persistent headaches?");
        assert!(matches!(out.effect, Some(Effect::AskAdvisory { .. })));
        assert_eq!(s.state, ConversationState::MainMenu);
    }

    #[test]
    fn main_menu_garbage_reprompts() {
        let mut s = session_in(ConversationState::MainMenu);
        let out = step(&mut s, "0");
        assert!(out.reply.unwrap().contains("valid option"));
        assert_eq!(s.state, ConversationState::MainMenu);
    }

    #[test]
    fn referral_redeem_parses_code() {
        let mut s = session_in(ConversationState::ReferralSystem);
        let out = step(&mut s, "redeem CARE0001ABCD");
        assert_eq!(
            out.effect,
            Some(Effect::RedeemReferral {
                code: "CARE0001ABCD".into()
            })
        );
    }

    #[test]
    fn every_state_handles_arbitrary_input() {
        // Totality: no (state, input) pair panics or leaves both reply and
        // effect empty.
        let inputs = [
            "", "0", "1", "9", "book", "SKIP", "PAID", "redeem X",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa?", "🚐", "\n\t",
        ];
        for state in ALL_STATES {
            for input in inputs {
                let mut s = session_in(state);
                let out = step(&mut s, input);
                assert!(
                    out.reply.is_some() || out.effect.is_some(),
                    "state {state} input {input:?} produced nothing"
                );
            }
        }
    }

    #[test]
    fn transitions_respect_the_state_graph() {
        let inputs = ["", "0", "1", "2", "3", "5", "book", "SKIP", "PAID", "cancel"];
        for state in ALL_STATES {
            for input in inputs {
                let mut s = session_in(state);
                step(&mut s, input);
                assert!(
                    state.can_transition_to(s.state),
                    "illegal transition {state} -> {} on input {input:?}",
                    s.state
                );
            }
        }
    }
}
