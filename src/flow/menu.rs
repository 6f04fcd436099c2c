//! Declarative menu matching.
//!
//! Each state's menu is a table of `{intent, exact tokens, keyword
//! substrings}`, evaluated in fixed priority order: exact token match over
//! the whole table first, then keyword substring match. The keyword fallback
//! ("book" satisfies the start-booking option) is a deliberate UX property.

/// What a matched menu input means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuIntent {
    StartBooking,
    ViewBookings,
    RescheduleCancel,
    Support,
    Notifications,
    Loyalty,
    VanTracking,
    Bundles,
    Referrals,
    BackToMenu,
    CancelVisit,
    RescheduleVisit,
    PaymentDone,
    ToggleMedication,
    ToggleFollowUp,
    ToggleHealthTips,
    ToggleLoyaltyUpdates,
    LoyaltyHistory,
    GenerateReferral,
    RefreshTracking,
}

/// One menu option: matched by exact token first, keywords second.
pub struct MenuOption {
    pub intent: MenuIntent,
    pub exact: &'static [&'static str],
    pub keywords: &'static [&'static str],
}

/// The welcome screen.
pub static WELCOME_MENU: &[MenuOption] = &[MenuOption {
    intent: MenuIntent::StartBooking,
    exact: &["1"],
    keywords: &["book", "visit"],
}];

/// The main menu (options 1-9).
pub static MAIN_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::StartBooking,
        exact: &["1"],
        keywords: &["book", "visit"],
    },
    MenuOption {
        intent: MenuIntent::ViewBookings,
        exact: &["2"],
        keywords: &["my bookings", "view booking"],
    },
    MenuOption {
        intent: MenuIntent::RescheduleCancel,
        exact: &["3"],
        keywords: &["reschedule", "cancel"],
    },
    MenuOption {
        intent: MenuIntent::Support,
        exact: &["4"],
        keywords: &["help", "support", "call"],
    },
    MenuOption {
        intent: MenuIntent::Notifications,
        exact: &["5"],
        keywords: &["notification", "reminder"],
    },
    MenuOption {
        intent: MenuIntent::Loyalty,
        exact: &["6"],
        keywords: &["loyalty", "points"],
    },
    MenuOption {
        intent: MenuIntent::VanTracking,
        exact: &["7"],
        keywords: &["van", "track"],
    },
    MenuOption {
        intent: MenuIntent::Bundles,
        exact: &["8"],
        keywords: &["bundle", "package"],
    },
    MenuOption {
        intent: MenuIntent::Referrals,
        exact: &["9"],
        keywords: &["refer", "friend"],
    },
];

pub static VIEW_BOOKINGS_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::StartBooking,
        exact: &["1"],
        keywords: &["book"],
    },
    MenuOption {
        intent: MenuIntent::BackToMenu,
        exact: &["2"],
        keywords: &["menu", "back"],
    },
];

pub static RESCHEDULE_CANCEL_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::CancelVisit,
        exact: &["1"],
        keywords: &["cancel"],
    },
    MenuOption {
        intent: MenuIntent::RescheduleVisit,
        exact: &["2"],
        keywords: &["reschedule"],
    },
    MenuOption {
        intent: MenuIntent::BackToMenu,
        exact: &["3"],
        keywords: &["menu", "back"],
    },
];

pub static PAYMENT_CONFIRMATION_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::PaymentDone,
        exact: &["1", "paid"],
        keywords: &["paid", "complete"],
    },
    MenuOption {
        intent: MenuIntent::CancelVisit,
        exact: &["2", "cancel"],
        keywords: &["cancel"],
    },
];

pub static NOTIFICATIONS_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::ToggleMedication,
        exact: &["1"],
        keywords: &["medication"],
    },
    MenuOption {
        intent: MenuIntent::ToggleFollowUp,
        exact: &["2"],
        keywords: &["follow"],
    },
    MenuOption {
        intent: MenuIntent::ToggleHealthTips,
        exact: &["3"],
        keywords: &["tips"],
    },
    MenuOption {
        intent: MenuIntent::ToggleLoyaltyUpdates,
        exact: &["4"],
        keywords: &["loyalty"],
    },
    MenuOption {
        intent: MenuIntent::BackToMenu,
        exact: &["5"],
        keywords: &["menu", "back"],
    },
];

pub static LOYALTY_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::LoyaltyHistory,
        exact: &["1"],
        keywords: &["history"],
    },
    MenuOption {
        intent: MenuIntent::GenerateReferral,
        exact: &["2"],
        keywords: &["referral", "code"],
    },
    MenuOption {
        intent: MenuIntent::BackToMenu,
        exact: &["3"],
        keywords: &["menu", "back"],
    },
];

pub static VAN_TRACKING_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::RefreshTracking,
        exact: &["1"],
        keywords: &["refresh"],
    },
    MenuOption {
        intent: MenuIntent::BackToMenu,
        exact: &["2"],
        keywords: &["menu", "back"],
    },
];

pub static BUNDLES_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::StartBooking,
        exact: &["1", "2", "3"],
        keywords: &["book"],
    },
    MenuOption {
        intent: MenuIntent::BackToMenu,
        exact: &["4"],
        keywords: &["menu", "back"],
    },
];

pub static REFERRAL_MENU: &[MenuOption] = &[
    MenuOption {
        intent: MenuIntent::GenerateReferral,
        exact: &["1"],
        keywords: &["new code", "generate"],
    },
    MenuOption {
        intent: MenuIntent::BackToMenu,
        exact: &["2"],
        keywords: &["menu", "back"],
    },
];

/// Match input against a menu table: exact tokens first, then keywords.
pub fn match_menu(table: &[MenuOption], input: &str) -> Option<MenuIntent> {
    let cleaned = input.trim().to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    for option in table {
        if option.exact.iter().any(|t| *t == cleaned) {
            return Some(option.intent);
        }
    }
    for option in table {
        if option.keywords.iter().any(|k| cleaned.contains(k)) {
            return Some(option.intent);
        }
    }
    None
}

/// Heuristic for free text that should go to the advisory gateway rather
/// than be treated as a failed menu choice.
pub fn looks_like_question(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.len() > 20 && !trimmed.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_token_wins() {
        assert_eq!(match_menu(MAIN_MENU, "1"), Some(MenuIntent::StartBooking));
        assert_eq!(match_menu(MAIN_MENU, " 9 "), Some(MenuIntent::Referrals));
    }

    #[test]
    fn keyword_fallback_matches() {
        assert_eq!(
            match_menu(MAIN_MENU, "I want to book"),
            Some(MenuIntent::StartBooking)
        );
        assert_eq!(
            match_menu(MAIN_MENU, "cancel my visit"),
            Some(MenuIntent::RescheduleCancel)
        );
    }

    #[test]
    fn exact_has_priority_over_keywords() {
        // "1" is also a substring of nothing here, but a bare "1" must hit
        // the exact pass even though later options carry overlapping keywords.
        assert_eq!(
            match_menu(RESCHEDULE_CANCEL_MENU, "1"),
            Some(MenuIntent::CancelVisit)
        );
    }

    #[test]
    fn unmatched_input_is_none() {
        assert_eq!(match_menu(MAIN_MENU, "0"), None);
        assert_eq!(match_menu(MAIN_MENU, "xyz"), None);
        assert_eq!(match_menu(MAIN_MENU, ""), None);
    }

    #[test]
    fn question_heuristic() {
        assert!(looks_like_question(
            "I have a headache and fever, what should I do?"
        ));
        assert!(!looks_like_question("1"));
        assert!(!looks_like_question("short text"));
        assert!(!looks_like_question("123456789012345678901234567890"));
    }

    #[test]
    fn paid_token_matches_payment_confirmation() {
        assert_eq!(
            match_menu(PAYMENT_CONFIRMATION_MENU, "PAID"),
            Some(MenuIntent::PaymentDone)
        );
        assert_eq!(
            match_menu(PAYMENT_CONFIRMATION_MENU, "1"),
            Some(MenuIntent::PaymentDone)
        );
    }
}
