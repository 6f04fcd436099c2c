//! End-to-end conversation tests: webhook text in, committed booking out.
//!
//! Uses the in-memory session store, an in-memory libSQL database, and
//! simulated collaborators throughout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal_macros::dec;

use carepod::advisory::NoopAdvisory;
use carepod::booking::{BookingOrchestrator, BookingStatus};
use carepod::bot::{Bot, BotDeps};
use carepod::catalog::PaymentMethod;
use carepod::channels::{InboundMessage, SimulatedMessenger};
use carepod::config::{BotConfig, LoyaltyConfig, SurchargeConfig};
use carepod::flow::ConversationState;
use carepod::logistics::{LogisticsResolver, NoopGeocoder};
use carepod::loyalty::{LoyaltyLedger, ReferralEngine};
use carepod::payment::SimulatedGateway;
use carepod::session::{MemorySessionStore, Session, SessionStore};
use carepod::store::{Database, LibSqlBackend};

const USER: &str = "+254700000001";

struct Fixture {
    bot: Bot,
    store: Arc<dyn Database>,
    sessions: Arc<MemorySessionStore>,
    messenger: Arc<SimulatedMessenger>,
}

async fn fixture() -> Fixture {
    let config = BotConfig::default();
    let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
    let messenger = Arc::new(SimulatedMessenger::new());

    let bot = Bot::new(
        config.clone(),
        BotDeps {
            sessions: Arc::clone(&sessions) as Arc<dyn SessionStore>,
            store: Arc::clone(&store),
            logistics: LogisticsResolver::new(
                Arc::new(NoopGeocoder),
                SurchargeConfig::default(),
                config.utc_offset_hours,
                Duration::from_millis(100),
            ),
            advisory: Arc::new(NoopAdvisory),
            payments: Arc::new(SimulatedGateway),
            messenger: Arc::clone(&messenger) as _,
        },
    );

    Fixture {
        bot,
        store,
        sessions,
        messenger,
    }
}

async fn say(fixture: &Fixture, text: &str) -> String {
    fixture
        .bot
        .handle_inbound(&InboundMessage {
            sender: USER.to_string(),
            text: text.to_string(),
            attachment_url: None,
        })
        .await
        .unwrap()
}

/// Walk the happy path up to (and including) the prediagnosis prompt.
async fn walk_to_prediagnosis(fixture: &Fixture) {
    say(fixture, "hi").await; // Welcome -> MainMenu
    say(fixture, "1").await; // -> LocationCapture
    say(fixture, "Westlands").await; // -> ServiceSelection
    say(fixture, "5").await; // -> TimeSelection
    say(fixture, "2").await; // -> PaymentMethod
    say(fixture, "1").await; // -> PaymentConfirmation
    say(fixture, "PAID").await; // -> Prediagnosis
}

#[tokio::test]
async fn full_booking_flow_commits_one_confirmed_booking() {
    let fixture = fixture().await;

    let reply = say(&fixture, "hi").await;
    assert!(reply.contains("1. Book a Health Visit"));

    let reply = say(&fixture, "1").await;
    assert!(reply.contains("location"));

    let reply = say(&fixture, "Westlands").await;
    assert!(reply.contains("Zone: A"));
    assert!(reply.contains("15-30 mins"));

    let reply = say(&fixture, "5").await;
    assert!(reply.contains("General Consultation"));

    let reply = say(&fixture, "2").await;
    assert!(reply.contains("payment method"));

    let reply = say(&fixture, "1").await;
    assert!(reply.contains("Reference: SIM-"));

    let reply = say(&fixture, "PAID").await;
    assert!(reply.contains("SKIP"));

    let reply = say(&fixture, "SKIP").await;
    assert!(reply.contains("Booking complete"));
    assert!(reply.contains("+50 points"));

    // Exactly one booking, confirmed, with the selected service and slot.
    let bookings = fixture.store.list_bookings_for(USER, 10).await.unwrap();
    assert_eq!(bookings.len(), 1);
    let booking = &bookings[0];
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.service_name, "General Consultation");
    assert_eq!(booking.service_fee, dec!(400));
    assert!(booking.slot_label.contains("Midday"));
    assert_eq!(booking.payment_method, PaymentMethod::MobileMoney);
    assert_eq!(
        booking.total_fee,
        booking.service_fee + booking.logistics_fee
    );

    // +50 loyalty points credited exactly once.
    assert_eq!(fixture.store.loyalty_balance(USER).await.unwrap(), 50);

    // Session is back at the main menu with an empty draft.
    let session = fixture.sessions.get(USER).await.unwrap().unwrap();
    assert_eq!(session.state, ConversationState::MainMenu);
    assert!(session.draft.service_key.is_none());

    // Two deferred notifications were scheduled for the visit.
    let due = fixture
        .store
        .list_due_notifications(Utc::now() + chrono::Duration::days(3))
        .await
        .unwrap();
    let for_booking: Vec<_> = due
        .iter()
        .filter(|n| n.booking_id == Some(booking.id))
        .collect();
    assert_eq!(for_booking.len(), 2);

    // Every reply also went out through the messenger.
    assert_eq!(fixture.messenger.sent().await.len(), 8);
}

#[tokio::test]
async fn invalid_service_key_leaves_state_unchanged_and_no_booking() {
    let fixture = fixture().await;
    say(&fixture, "hi").await;
    say(&fixture, "1").await;
    say(&fixture, "Westlands").await;

    let reply = say(&fixture, "9").await;
    assert!(reply.contains("valid service"));

    let session = fixture.sessions.get(USER).await.unwrap().unwrap();
    assert_eq!(session.state, ConversationState::ServiceSelection);
    assert!(fixture.store.list_bookings_for(USER, 10).await.unwrap().is_empty());

    // Redelivery of the same invalid input is idempotent.
    let again = say(&fixture, "9").await;
    assert_eq!(reply, again);
}

#[tokio::test]
async fn prediagnosis_text_feeds_the_health_profile() {
    let fixture = fixture().await;
    walk_to_prediagnosis(&fixture).await;
    say(&fixture, "My name is Alice, I think I have diabetes").await;

    let profile = fixture.store.get_profile(USER).await.unwrap().unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Alice"));
    assert!(profile.conditions.iter().any(|c| c == "diabetes"));
    assert_eq!(profile.visit_count, 1);
    assert!(profile.last_visit.is_some());
}

#[tokio::test]
async fn duplicate_completion_returns_existing_booking() {
    let fixture = fixture().await;
    walk_to_prediagnosis(&fixture).await;

    // Capture the session as it stood before completion — a webhook
    // redelivery after a crash replays exactly this state.
    let snapshot = fixture.sessions.get(USER).await.unwrap().unwrap();

    say(&fixture, "SKIP").await;
    assert_eq!(fixture.store.list_bookings_for(USER, 10).await.unwrap().len(), 1);

    // Replay completion from the stale session.
    let ledger = Arc::new(LoyaltyLedger::new(
        Arc::clone(&fixture.store),
        LoyaltyConfig::default(),
    ));
    let orchestrator = BookingOrchestrator::new(
        Arc::clone(&fixture.store),
        ledger,
        BotConfig::default(),
    );
    let mut stale = snapshot.clone();
    let receipt = orchestrator
        .complete_booking(&mut stale, Utc::now())
        .await
        .unwrap();

    assert!(receipt.retried);
    assert_eq!(receipt.points_earned, 0, "retry must not double-credit");
    assert_eq!(fixture.store.list_bookings_for(USER, 10).await.unwrap().len(), 1);
    assert_eq!(fixture.store.loyalty_balance(USER).await.unwrap(), 50);
}

#[tokio::test]
async fn incomplete_draft_is_rejected_and_returns_to_missing_step() {
    let fixture = fixture().await;
    let ledger = Arc::new(LoyaltyLedger::new(
        Arc::clone(&fixture.store),
        LoyaltyConfig::default(),
    ));
    let orchestrator = BookingOrchestrator::new(
        Arc::clone(&fixture.store),
        ledger,
        BotConfig::default(),
    );

    let mut session = Session::new(USER, Duration::from_secs(3600));
    let err = orchestrator
        .complete_booking(&mut session, Utc::now())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("location"));
    assert!(fixture.store.list_bookings_for(USER, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn loyalty_balance_always_equals_transaction_sum() {
    let fixture = fixture().await;
    let ledger = LoyaltyLedger::new(Arc::clone(&fixture.store), LoyaltyConfig::default());

    ledger.credit(USER, 50, "booking completed", None).await.unwrap();
    ledger.credit(USER, 500, "referral", None).await.unwrap();
    ledger.credit(USER, -100, "redemption", None).await.unwrap();

    let balance = ledger.balance(USER).await.unwrap();
    let transactions = ledger.history(USER, 100).await.unwrap();
    let sum: i64 = transactions.iter().map(|tx| tx.points).sum();
    assert_eq!(balance.points, sum);
    assert_eq!(balance.points, 450);
}

#[tokio::test]
async fn referral_exhaustion_fails_and_points_add_up() {
    let fixture = fixture().await;
    let config = LoyaltyConfig {
        referral_max_uses: 2,
        ..Default::default()
    };
    let ledger = Arc::new(LoyaltyLedger::new(
        Arc::clone(&fixture.store),
        config.clone(),
    ));
    let engine = ReferralEngine::new(Arc::clone(&fixture.store), Arc::clone(&ledger), config);

    let code = engine.generate(USER).await.unwrap();
    assert!(engine.redeem(&code.code, "+254700000002", None).await.unwrap());
    assert!(engine.redeem(&code.code, "+254700000003", None).await.unwrap());

    // Third redemption exceeds max_uses.
    let err = engine
        .redeem(&code.code, "+254700000004", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid referral code"));

    // Unknown codes fail too, never a silent no-op.
    assert!(engine.redeem("CARE0000XXXX", "+254700000005", None).await.is_err());

    // Awarded points across referrer + referred == max_uses * award * 2.
    let owner = fixture.store.loyalty_balance(USER).await.unwrap();
    let a = fixture.store.loyalty_balance("+254700000002").await.unwrap();
    let b = fixture.store.loyalty_balance("+254700000003").await.unwrap();
    let c = fixture.store.loyalty_balance("+254700000004").await.unwrap();
    assert_eq!(owner, 1000);
    assert_eq!(a, 500);
    assert_eq!(b, 500);
    assert_eq!(c, 0);
    assert_eq!(owner + a + b + c, 2 * 500 * 2);
}

#[tokio::test]
async fn same_identity_messages_are_serialized() {
    let fixture = Arc::new(fixture().await);

    // Two near-simultaneous first messages. Serialized processing means
    // exactly one of them observes the fresh Welcome state and the other
    // sees the main menu the first one wrote.
    let a = {
        let f = Arc::clone(&fixture);
        tokio::spawn(async move { say(&f, "hello").await })
    };
    let b = {
        let f = Arc::clone(&fixture);
        tokio::spawn(async move { say(&f, "hello").await })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let welcomes = [&a, &b]
        .iter()
        .filter(|r| r.contains("Hi there"))
        .count();
    let reprompts = [&a, &b]
        .iter()
        .filter(|r| r.contains("valid option"))
        .count();
    assert_eq!(welcomes, 1, "exactly one message saw the Welcome state");
    assert_eq!(reprompts, 1, "the other saw the menu written by the first");
}

#[tokio::test]
async fn reschedule_and_cancel_round_trip() {
    let fixture = fixture().await;
    walk_to_prediagnosis(&fixture).await;
    say(&fixture, "SKIP").await;

    // Reschedule to the afternoon slot.
    say(&fixture, "3").await; // MainMenu -> RescheduleCancel
    say(&fixture, "2").await; // -> RescheduleTimeSelection
    let reply = say(&fixture, "3").await; // pick Afternoon
    assert!(reply.contains("Afternoon"));

    let bookings = fixture.store.list_bookings_for(USER, 10).await.unwrap();
    let booking = &bookings[0];
    assert_eq!(booking.status, BookingStatus::Rescheduled);
    assert_eq!(booking.slot_key, "3");

    // Now cancel it.
    say(&fixture, "3").await; // -> RescheduleCancel
    let reply = say(&fixture, "1").await; // cancel
    assert!(reply.contains("cancelled"));

    let bookings = fixture.store.list_bookings_for(USER, 10).await.unwrap();
    let booking = &bookings[0];
    assert_eq!(booking.status, BookingStatus::Cancelled);

    // Its pending notifications were cancelled best-effort.
    let due = fixture
        .store
        .list_due_notifications(Utc::now() + chrono::Duration::days(3))
        .await
        .unwrap();
    assert!(due.iter().all(|n| n.booking_id != Some(booking.id)));
}

#[tokio::test]
async fn payment_callback_updates_booking_and_redelivery_is_noop() {
    let fixture = fixture().await;
    walk_to_prediagnosis(&fixture).await;
    say(&fixture, "SKIP").await;

    let booking = fixture.store.list_bookings_for(USER, 10).await.unwrap()[0].clone();
    let reference = booking.payment_reference.clone().unwrap();

    let callback = carepod::payment::PaymentCallback {
        reference: reference.clone(),
        result_code: 0,
    };
    fixture.bot.handle_payment_callback(&callback).await.unwrap();

    let updated = fixture.store.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(updated.payment_status, carepod::booking::PaymentStatus::Paid);

    // Redelivery of the same callback changes nothing.
    fixture.bot.handle_payment_callback(&callback).await.unwrap();
    let again = fixture.store.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(again.updated_at, updated.updated_at);

    // Unknown references are rejected loudly.
    let unknown = carepod::payment::PaymentCallback {
        reference: "nope".into(),
        result_code: 0,
    };
    assert!(fixture.bot.handle_payment_callback(&unknown).await.is_err());
}

#[tokio::test]
async fn advisory_fallback_keeps_the_session_usable() {
    let fixture = fixture().await;
    say(&fixture, "hi").await;

    // NoopAdvisory is "unavailable": long questions get the menu fallback.
    let reply = say(&fixture, "What should I do about my persistent headaches?").await;
    assert!(reply.contains("1. Book a Health Visit"));

    let session = fixture.sessions.get(USER).await.unwrap().unwrap();
    assert_eq!(session.state, ConversationState::MainMenu);

    // The flow still works afterwards.
    let reply = say(&fixture, "1").await;
    assert!(reply.contains("location"));
}

#[tokio::test]
async fn expired_session_restarts_at_welcome() {
    let fixture = fixture().await;
    say(&fixture, "hi").await;
    say(&fixture, "1").await;

    fixture.sessions.delete(USER).await.unwrap();

    // No session -> treated as a fresh Welcome, not an error.
    let reply = say(&fixture, "anything at all").await;
    assert!(reply.contains("Hi there"));
}

#[tokio::test]
async fn van_tracking_shows_live_position_when_fed() {
    let fixture = fixture().await;
    walk_to_prediagnosis(&fixture).await;
    say(&fixture, "SKIP").await;

    let booking = fixture.store.list_bookings_for(USER, 10).await.unwrap()[0].clone();

    // Before any feed: preparing message.
    let reply = say(&fixture, "7").await;
    assert!(reply.contains("preparing van"));

    fixture
        .bot
        .update_van_location(&booking.display_code, "Waiyaki Way", "12 mins")
        .await;
    let reply = say(&fixture, "1").await; // refresh
    assert!(reply.contains("Waiyaki Way"));
    assert!(reply.contains("12 mins"));
}
