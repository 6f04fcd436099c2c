//! Reply text builders, one function per message.
//!
//! Everything user-visible lives here so the engine and dispatcher stay
//! free of copy. Formatting is plain text suitable for any chat transport.

use rust_decimal::Decimal;

use crate::booking::Booking;
use crate::catalog::{BundleDef, PaymentMethod, SERVICES, ServiceDef, TIME_SLOTS, TimeSlotDef};
use crate::logistics::LogisticsQuote;
use crate::loyalty::{LoyaltyBalance, LoyaltyTransaction};
use crate::profile::{HealthProfile, NotificationPrefs};

/// The quick-action list appended to menus and advisory replies.
pub fn quick_actions() -> String {
    "What would you like to do?\n\
     1. Book a Health Visit\n\
     2. View My Bookings\n\
     3. Reschedule or Cancel Visit\n\
     4. Call for Help\n\
     5. Smart Notifications\n\
     6. Loyalty Program\n\
     7. Van Tracking\n\
     8. Service Bundles\n\
     9. Refer Friends\n\n\
     Reply with a number (1-9)."
        .to_string()
}

pub fn welcome(recommendations: &[String]) -> String {
    let mut msg = String::from(
        "Hi there! I'm your health assistant from CarePod.\n\
         I can book a home health visit for you in a few quick steps.\n\n",
    );
    if !recommendations.is_empty() {
        msg.push_str("Personalized for you:\n");
        for rec in recommendations {
            msg.push_str("- ");
            msg.push_str(rec);
            msg.push('\n');
        }
        msg.push('\n');
    }
    msg.push_str(&quick_actions());
    msg
}

pub fn main_menu() -> String {
    quick_actions()
}

pub fn invalid_menu_choice() -> String {
    format!(
        "Please select a valid option (1-9) or ask a health question.\n\n{}",
        quick_actions()
    )
}

pub fn request_location() -> String {
    "Step 1: Share your location.\n\n\
     You can type the name of your estate/area or your nearest landmark.\n\
     Example: \"Kilimani, Nairobi\" or \"Westlands, ABC Street\"\n\n\
     This helps us calculate the logistics fee and ETA."
        .to_string()
}

pub fn service_menu() -> String {
    let mut msg = String::from("Step 2: Choose a service.\n\n");
    for svc in SERVICES {
        msg.push_str(&format!(
            "{}. {} — KES {} ({} min)\n",
            svc.key, svc.name, svc.price, svc.duration_minutes
        ));
    }
    msg.push_str("\nReply with the number (1-6) of your preferred service.");
    msg
}

pub fn location_confirmed(quote: &LogisticsQuote) -> String {
    format!(
        "Location confirmed!\n\n\
         Location: {}\n\
         Zone: {}\n\
         Logistics Fee: KES {}\n\
         ETA: {}\n\n{}",
        quote.location,
        quote.zone,
        quote.total_fee,
        quote.eta,
        service_menu()
    )
}

pub fn time_menu(service: &ServiceDef) -> String {
    let mut msg = format!(
        "Service selected: {} (KES {}, {} min).\n\n\
         Step 3: Pick a time slot.\n\n",
        service.name, service.price, service.duration_minutes
    );
    for slot in TIME_SLOTS {
        msg.push_str(&format!("{}. {}\n", slot.key, slot.label));
    }
    msg.push_str("\nReply with the number (1-3) of your preferred time slot.");
    msg
}

pub fn invalid_service() -> String {
    "Please select a valid service (1-6).".to_string()
}

pub fn invalid_time_slot() -> String {
    let mut msg = String::from("Please select a valid time slot.\n\n");
    for slot in TIME_SLOTS {
        msg.push_str(&format!("{}. {}\n", slot.key, slot.label));
    }
    msg
}

pub fn payment_menu() -> String {
    "Step 4: Choose a payment method.\n\n\
     1. M-PESA (STK push to your phone)\n\
     2. NHIF (insurance card number)\n\
     3. Wallet (your phone number is your wallet ID)\n\n\
     Reply with your preferred payment method (1-3)."
        .to_string()
}

pub fn invalid_payment_method() -> String {
    "Please select a valid payment method (1-3).".to_string()
}

pub fn payment_initiated(method: PaymentMethod, amount: Decimal, reference: &str) -> String {
    let lead = match method {
        PaymentMethod::MobileMoney => format!(
            "M-PESA prompt sent. Amount: KES {amount}. Reference: {reference}.\n\
             Please check your phone and enter your PIN."
        ),
        PaymentMethod::Insurance => format!(
            "NHIF claim opened. Amount: KES {amount}. Reference: {reference}.\n\
             We'll verify your coverage shortly."
        ),
        PaymentMethod::Wallet => {
            format!("Wallet charge queued. Amount: KES {amount}. Reference: {reference}.")
        }
    };
    format!("{lead}\n\nReply PAID once you've completed the payment, or CANCEL to abort.")
}

pub fn payment_pending() -> String {
    "Your payment is still pending. Reply PAID once complete, or CANCEL to abort.".to_string()
}

pub fn prediagnosis_prompt() -> String {
    "Payment confirmed!\n\n\
     Want to share a few symptoms so our team comes prepared?\n\
     You can include your full name, main symptoms, how long they've lasted,\n\
     and any current medications.\n\n\
     Reply SKIP to skip this step."
        .to_string()
}

pub fn booking_failed_retry() -> String {
    "Something went wrong while confirming your booking. Please try again.".to_string()
}

pub fn booking_complete(booking: &Booking, points_earned: i64, balance: i64) -> String {
    format!(
        "Booking complete! Thank you for choosing CarePod.\n\n\
         Booking Summary:\n\
         ID: {}\n\
         Service: {}\n\
         Time: {}\n\
         Location: {}\n\
         Logistics: KES {}\n\
         Service fee: KES {} (payable on arrival)\n\
         Total: KES {}\n\
         Payment: {}\n\n\
         Loyalty: +{} points (total {}).\n\n\
         The medical team will arrive at {}. You'll get a reminder before arrival.\n\n{}",
        booking.display_code,
        booking.service_name,
        booking.slot_label,
        booking.location,
        booking.logistics_fee,
        booking.service_fee,
        booking.total_fee,
        booking.payment_method.label(),
        points_earned,
        balance,
        booking.slot_start,
        quick_actions()
    )
}

pub fn bookings_list(bookings: &[Booking]) -> String {
    if bookings.is_empty() {
        return "Your Recent Bookings\n\nNo bookings found.\n\n\
                1. Book a new visit\n2. Back to main menu"
            .to_string();
    }
    let mut msg = String::from("Your Recent Bookings\n\n");
    for b in bookings {
        msg.push_str(&format!(
            "- {} | {} | {} | {} | KES {}\n",
            b.display_code, b.service_name, b.slot_label, b.status, b.total_fee
        ));
    }
    msg.push_str("\n1. Book a new visit\n2. Back to main menu");
    msg
}

pub fn reschedule_cancel_menu() -> String {
    "Cancellation & Rescheduling\n\n\
     1. Cancel Visit\n\
     2. Reschedule Visit\n\
     3. Back to Main Menu\n\n\
     What would you like to do?"
        .to_string()
}

pub fn no_active_booking() -> String {
    format!(
        "No active booking found.\n\n{}",
        quick_actions()
    )
}

pub fn booking_cancelled(code: &str) -> String {
    format!(
        "Booking {code} has been cancelled. We hope to see you again soon.\n\n{}",
        quick_actions()
    )
}

pub fn reschedule_time_menu() -> String {
    let mut msg = String::from("Pick a new time slot:\n\n");
    for slot in TIME_SLOTS {
        msg.push_str(&format!("{}. {}\n", slot.key, slot.label));
    }
    msg
}

pub fn booking_rescheduled(code: &str, slot: &TimeSlotDef) -> String {
    format!(
        "Booking {code} moved to {}.\n\n{}",
        slot.label,
        quick_actions()
    )
}

pub fn notification_settings(prefs: &NotificationPrefs) -> String {
    let onoff = |b: bool| if b { "ON" } else { "OFF" };
    format!(
        "Smart Notifications & Reminders\n\n\
         Medication Reminders: {}\n\
         Follow-up Reminders: {}\n\
         Health Tips: {}\n\
         Loyalty Updates: {}\n\n\
         1. Toggle Medication Reminders\n\
         2. Toggle Follow-up Reminders\n\
         3. Toggle Health Tips\n\
         4. Toggle Loyalty Updates\n\
         5. Back to Main Menu",
        onoff(prefs.medication),
        onoff(prefs.follow_up),
        onoff(prefs.health_tips),
        onoff(prefs.loyalty),
    )
}

pub fn loyalty_overview(profile: &HealthProfile, balance: &LoyaltyBalance) -> String {
    format!(
        "Loyalty Program\n\n\
         Name: {}\n\
         Points: {}\n\
         Visits: {}\n\
         Tier: {}\n\n\
         Rewards:\n\
         - 100 points = free logistics fee\n\
         - 200 points = 10% service discount\n\
         - 500 points = free consultation\n\n\
         Earn: 50 points per visit, 500 per referral.\n\n\
         1. View History\n\
         2. Generate Referral Code\n\
         3. Back to Main Menu",
        profile.display_name.as_deref().unwrap_or("User"),
        balance.points,
        profile.visit_count,
        balance.tier,
    )
}

pub fn loyalty_history(transactions: &[LoyaltyTransaction]) -> String {
    if transactions.is_empty() {
        return "No loyalty activity yet. Complete a booking to start earning points."
            .to_string();
    }
    let mut msg = String::from("Recent Loyalty Activity\n\n");
    for tx in transactions {
        msg.push_str(&format!(
            "- {:+} points — {} ({})\n",
            tx.points,
            tx.reason,
            tx.created_at.format("%Y-%m-%d")
        ));
    }
    msg
}

pub fn van_tracking_none() -> String {
    "Van Tracking\n\n\
     No active bookings found. Book an appointment first and tracking\n\
     becomes available automatically.\n\n\
     1. Refresh\n2. Back to Main Menu"
        .to_string()
}

pub fn van_tracking_pending(code: &str, slot_label: &str) -> String {
    format!(
        "Van Tracking\n\n\
         Booking: {code}\n\
         Status: preparing van\n\
         ETA window: {slot_label}\n\n\
         Tracking updates will appear here once the van is dispatched.\n\n\
         1. Refresh\n2. Back to Main Menu"
    )
}

pub fn van_tracking_live(code: &str, location: &str, eta: &str, updated: &str) -> String {
    format!(
        "Live Van Tracking\n\n\
         Booking: {code}\n\
         Current location: {location}\n\
         ETA: {eta}\n\
         Last update: {updated}\n\n\
         1. Refresh\n2. Back to Main Menu"
    )
}

pub fn bundles_menu(bundles: &[&BundleDef]) -> String {
    let mut msg = String::from("Recommended Service Bundles\n\n");
    for (i, bundle) in bundles.iter().enumerate() {
        msg.push_str(&format!(
            "{}. {} — {}% off\n   {}\n   Includes: {}\n",
            i + 1,
            bundle.name,
            bundle.discount_percent,
            bundle.description,
            bundle.services.join(", ")
        ));
    }
    msg.push_str("\nReply with a bundle number to book it, or 4 for the main menu.");
    msg
}

pub fn referral_overview(code: &str, uses: u32, award: i64) -> String {
    format!(
        "Refer Friends & Earn Rewards\n\n\
         Your referral code: {code}\n\n\
         Share it with friends — when they book with your code you both\n\
         earn {award} loyalty points.\n\n\
         Successful referrals so far: {uses}\n\n\
         1. Generate New Code\n\
         2. Back to Main Menu"
    )
}

pub fn referral_redeemed(award: i64) -> String {
    format!("Referral code accepted — {award} points credited to you and your friend.")
}

pub fn referral_invalid() -> String {
    "That referral code is not valid or has reached its redemption limit.".to_string()
}

pub fn support() -> String {
    format!(
        "Need Help?\n\n\
         Call us: +254 700 000 000\n\
         Email: support@carepod.health\n\n\
         If you need immediate medical attention, please call emergency services.\n\n{}",
        quick_actions()
    )
}

/// Fallback when the advisory gateway is unavailable.
pub fn advisory_unavailable() -> String {
    format!(
        "I couldn't process that right now. Here's what I can help with:\n\n{}",
        quick_actions()
    )
}

/// An advisory answer with the quick actions appended.
pub fn advisory_reply(advice: &str) -> String {
    format!("{advice}\n\n{}", quick_actions())
}
