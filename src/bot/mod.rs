//! The bot dispatcher.
//!
//! One inbound message is one asynchronous task: load the session, run the
//! pure transition, execute at most one side-effect intent, persist, reply.
//! Messages from the same identity are serialized through a per-identity
//! mutex; different identities run in parallel without limit.

pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use crate::advisory::AdvisoryGateway;
use crate::booking::{BookingOrchestrator, PaymentStatus};
use crate::catalog::slot_by_key;
use crate::channels::{InboundMessage, Messenger, OutboundMessage};
use crate::config::BotConfig;
use crate::error::{BookingError, Error, PaymentError, Result};
use crate::flow::{self, ConversationState, Effect, prompts};
use crate::logistics::LogisticsResolver;
use crate::loyalty::{LoyaltyLedger, ReferralEngine};
use crate::notify::model::{Notification, NotificationKind};
use crate::payment::{PaymentCallback, PaymentGateway};
use crate::profile::{self, HealthProfile, NotificationPref};
use crate::session::{Session, SessionStore};
use crate::store::Database;

/// Live van position for an active booking, keyed by display code.
#[derive(Debug, Clone)]
pub struct VanStatus {
    pub location: String,
    pub eta: String,
    pub last_update: DateTime<Utc>,
}

/// Everything the dispatcher needs, injected at construction.
pub struct BotDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub store: Arc<dyn Database>,
    pub logistics: LogisticsResolver,
    pub advisory: Arc<dyn AdvisoryGateway>,
    pub payments: Arc<dyn PaymentGateway>,
    pub messenger: Arc<dyn Messenger>,
}

/// The conversational booking bot.
pub struct Bot {
    config: BotConfig,
    sessions: Arc<dyn SessionStore>,
    store: Arc<dyn Database>,
    logistics: LogisticsResolver,
    advisory: Arc<dyn AdvisoryGateway>,
    payments: Arc<dyn PaymentGateway>,
    messenger: Arc<dyn Messenger>,
    ledger: Arc<LoyaltyLedger>,
    referrals: ReferralEngine,
    orchestrator: BookingOrchestrator,
    /// In-process van tracking, keyed by booking display code.
    van_tracking: RwLock<HashMap<String, VanStatus>>,
    /// Per-identity processing locks (arrival-order serialization).
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Bot {
    pub fn new(config: BotConfig, deps: BotDeps) -> Self {
        let ledger = Arc::new(LoyaltyLedger::new(
            Arc::clone(&deps.store),
            config.loyalty.clone(),
        ));
        let referrals = ReferralEngine::new(
            Arc::clone(&deps.store),
            Arc::clone(&ledger),
            config.loyalty.clone(),
        );
        let orchestrator = BookingOrchestrator::new(
            Arc::clone(&deps.store),
            Arc::clone(&ledger),
            config.clone(),
        );

        Self {
            config,
            sessions: deps.sessions,
            store: deps.store,
            logistics: deps.logistics,
            advisory: deps.advisory,
            payments: deps.payments,
            messenger: deps.messenger,
            ledger,
            referrals,
            orchestrator,
            van_tracking: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one inbound message and return the reply text.
    ///
    /// The reply is also pushed through the outbound messenger; send
    /// failures are logged, never surfaced to the user path.
    pub async fn handle_inbound(&self, message: &InboundMessage) -> Result<String> {
        let identity = message.sender.clone();
        let lock = self.identity_lock(&identity).await;
        let _guard = lock.lock().await;

        // Absent (or expired) session means a fresh Welcome — not an error.
        let mut session = match self.sessions.get(&identity).await? {
            Some(session) => session,
            None => Session::new(&identity, self.config.session_ttl),
        };

        let outcome = flow::step(&mut session, &message.text);
        let reply = match outcome.effect {
            Some(effect) => self.execute_effect(&mut session, effect).await,
            None => outcome.reply.unwrap_or_else(prompts::main_menu),
        };

        self.sessions
            .put(&identity, &session, self.config.session_ttl)
            .await?;

        let outbound = OutboundMessage {
            to: identity.clone(),
            body: reply.clone(),
            media_url: None,
        };
        if let Err(e) = self.messenger.send(&outbound).await {
            tracing::warn!(to = %identity, "Outbound send failed: {e}");
        }

        Ok(reply)
    }

    async fn identity_lock(&self, identity: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Execute one side-effect intent and compose the reply for it.
    ///
    /// Collaborator failures degrade to fallback replies here — nothing in
    /// this method is allowed to take the session down with it.
    async fn execute_effect(&self, session: &mut Session, effect: Effect) -> String {
        match effect {
            Effect::ShowWelcome => self.show_welcome(session).await,
            Effect::ResolveLogistics { location } => {
                let quote = self.logistics.resolve(&location, Utc::now()).await;
                session.draft.logistics = Some(quote.clone());
                prompts::location_confirmed(&quote)
            }
            Effect::AskAdvisory { text } => self.ask_advisory(session, &text).await,
            Effect::InitiatePayment { method } => self.initiate_payment(session, method).await,
            Effect::CompleteBooking => self.complete_booking(session).await,
            Effect::ShowBookings => self.show_bookings(session).await,
            Effect::ShowLoyalty => self.show_loyalty(session).await,
            Effect::ShowLoyaltyHistory => self.show_loyalty_history(session).await,
            Effect::ShowReferral => self.show_referral(session, false).await,
            Effect::GenerateReferral => self.show_referral(session, true).await,
            Effect::RedeemReferral { code } => self.redeem_referral(session, &code).await,
            Effect::ToggleNotificationPref { pref } => self.toggle_pref(session, pref).await,
            Effect::ShowNotificationPrefs => {
                let profile = self.profile_or_default(&session.identity).await;
                prompts::notification_settings(&profile.prefs)
            }
            Effect::ShowVanTracking => self.show_van_tracking(session).await,
            Effect::ShowBundles => {
                let profile = self.profile_or_default(&session.identity).await;
                prompts::bundles_menu(&profile::recommended_bundles(&profile))
            }
            Effect::CancelActiveBooking => self.cancel_active_booking(session).await,
            Effect::RescheduleActiveBooking { slot_key } => {
                self.reschedule_active_booking(session, &slot_key).await
            }
        }
    }

    async fn profile_or_default(&self, identity: &str) -> HealthProfile {
        match self.store.get_profile(identity).await {
            Ok(Some(profile)) => profile,
            Ok(None) => HealthProfile::new(identity),
            Err(e) => {
                tracing::warn!(identity, "Profile load failed: {e}");
                HealthProfile::new(identity)
            }
        }
    }

    async fn show_welcome(&self, session: &Session) -> String {
        let profile = self.profile_or_default(&session.identity).await;
        let balance = self
            .ledger
            .balance(&session.identity)
            .await
            .map(|b| b.points)
            .unwrap_or(0);
        prompts::welcome(&profile::recommendations(&profile, balance))
    }

    async fn ask_advisory(&self, session: &Session, text: &str) -> String {
        let profile = self.profile_or_default(&session.identity).await;
        let summary = profile.summary();
        let call = self.advisory.advise(text, &summary);

        match tokio::time::timeout(self.config.advisory_timeout, call).await {
            Ok(Ok(Some(advice))) => prompts::advisory_reply(&advice),
            Ok(Ok(None)) => prompts::advisory_unavailable(),
            Ok(Err(e)) => {
                tracing::warn!("Advisory call failed: {e}");
                prompts::advisory_unavailable()
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.config.advisory_timeout, "Advisory call timed out");
                prompts::advisory_unavailable()
            }
        }
    }

    async fn initiate_payment(
        &self,
        session: &mut Session,
        method: crate::catalog::PaymentMethod,
    ) -> String {
        let amount = session
            .draft
            .logistics
            .as_ref()
            .map(|q| q.total_fee)
            .unwrap_or(Decimal::ZERO);

        match self
            .payments
            .initiate(method, amount, &session.identity)
            .await
        {
            Ok(intent) => {
                session.draft.payment_reference = Some(intent.reference.clone());
                prompts::payment_initiated(method, amount, &intent.reference)
            }
            Err(e) => {
                tracing::warn!(identity = %session.identity, "Payment initiation failed: {e}");
                // Step back so the user can pick a method again.
                session.draft.payment_method = None;
                session.state = ConversationState::PaymentMethod;
                format!(
                    "Payment initiation failed. Please try again or choose another method.\n\n{}",
                    prompts::payment_menu()
                )
            }
        }
    }

    async fn complete_booking(&self, session: &mut Session) -> String {
        match self
            .orchestrator
            .complete_booking(session, Utc::now())
            .await
        {
            Ok(receipt) => {
                prompts::booking_complete(&receipt.booking, receipt.points_earned, receipt.balance)
            }
            Err(Error::Booking(BookingError::Incomplete { missing })) => {
                self.return_to_missing_step(session, missing)
            }
            Err(e) => {
                tracing::error!(identity = %session.identity, "Booking commit failed: {e}");
                prompts::booking_failed_retry()
            }
        }
    }

    /// `IncompleteBookingState` recovery: put the user back at the earliest
    /// missing step.
    fn return_to_missing_step(&self, session: &mut Session, missing: &'static str) -> String {
        let (state, reply) = match missing {
            "location" => (ConversationState::LocationCapture, prompts::request_location()),
            "service" => (ConversationState::ServiceSelection, prompts::service_menu()),
            "time slot" => (ConversationState::TimeSelection, prompts::invalid_time_slot()),
            _ => (ConversationState::PaymentMethod, prompts::payment_menu()),
        };
        session.state = state;
        format!("We're missing your {missing} before we can confirm.\n\n{reply}")
    }

    async fn show_bookings(&self, session: &Session) -> String {
        match self.store.list_bookings_for(&session.identity, 5).await {
            Ok(bookings) => prompts::bookings_list(&bookings),
            Err(e) => {
                tracing::warn!("Booking list failed: {e}");
                prompts::bookings_list(&[])
            }
        }
    }

    async fn show_loyalty(&self, session: &Session) -> String {
        let profile = self.profile_or_default(&session.identity).await;
        match self.ledger.balance(&session.identity).await {
            Ok(balance) => prompts::loyalty_overview(&profile, &balance),
            Err(e) => {
                tracing::warn!("Loyalty balance failed: {e}");
                prompts::booking_failed_retry()
            }
        }
    }

    async fn show_loyalty_history(&self, session: &Session) -> String {
        match self.ledger.history(&session.identity, 10).await {
            Ok(transactions) => prompts::loyalty_history(&transactions),
            Err(e) => {
                tracing::warn!("Loyalty history failed: {e}");
                prompts::booking_failed_retry()
            }
        }
    }

    async fn show_referral(&self, session: &Session, force_new: bool) -> String {
        let result = if force_new {
            self.referrals.generate(&session.identity).await
        } else {
            self.referrals.current_or_generate(&session.identity).await
        };
        match result {
            Ok(code) => prompts::referral_overview(
                &code.code,
                code.uses,
                self.config.loyalty.referral_points,
            ),
            Err(e) => {
                tracing::warn!("Referral code failed: {e}");
                prompts::booking_failed_retry()
            }
        }
    }

    async fn redeem_referral(&self, session: &Session, code: &str) -> String {
        match self.referrals.redeem(code, &session.identity, None).await {
            Ok(_) => prompts::referral_redeemed(self.config.loyalty.referral_points),
            Err(Error::Loyalty(_)) => prompts::referral_invalid(),
            Err(e) => {
                tracing::warn!("Referral redemption failed: {e}");
                prompts::referral_invalid()
            }
        }
    }

    async fn toggle_pref(&self, session: &Session, pref: NotificationPref) -> String {
        let mut profile = self.profile_or_default(&session.identity).await;
        profile.prefs.toggle(pref);
        if let Err(e) = self.store.upsert_profile(&profile).await {
            tracing::warn!("Preference save failed: {e}");
        }
        prompts::notification_settings(&profile.prefs)
    }

    async fn show_van_tracking(&self, session: &Session) -> String {
        let booking = match self.store.latest_active_booking(&session.identity).await {
            Ok(Some(booking)) => booking,
            Ok(None) => return prompts::van_tracking_none(),
            Err(e) => {
                tracing::warn!("Active booking lookup failed: {e}");
                return prompts::van_tracking_none();
            }
        };

        let tracking = self.van_tracking.read().await;
        match tracking.get(&booking.display_code) {
            Some(van) => prompts::van_tracking_live(
                &booking.display_code,
                &van.location,
                &van.eta,
                &van.last_update.format("%H:%M:%S").to_string(),
            ),
            None => prompts::van_tracking_pending(&booking.display_code, &booking.slot_label),
        }
    }

    async fn cancel_active_booking(&self, session: &Session) -> String {
        let booking = match self.store.latest_active_booking(&session.identity).await {
            Ok(Some(booking)) => booking,
            Ok(None) => return prompts::no_active_booking(),
            Err(e) => {
                tracing::warn!("Active booking lookup failed: {e}");
                return prompts::booking_failed_retry();
            }
        };

        match self.orchestrator.cancel_booking(&booking).await {
            Ok(()) => prompts::booking_cancelled(&booking.display_code),
            Err(Error::Booking(_)) => prompts::no_active_booking(),
            Err(e) => {
                tracing::error!("Cancellation failed: {e}");
                prompts::booking_failed_retry()
            }
        }
    }

    async fn reschedule_active_booking(&self, session: &Session, slot_key: &str) -> String {
        let Some(slot) = slot_by_key(slot_key) else {
            return prompts::reschedule_time_menu();
        };
        let booking = match self.store.latest_active_booking(&session.identity).await {
            Ok(Some(booking)) => booking,
            Ok(None) => return prompts::no_active_booking(),
            Err(e) => {
                tracing::warn!("Active booking lookup failed: {e}");
                return prompts::booking_failed_retry();
            }
        };

        match self
            .orchestrator
            .reschedule_booking(&booking, slot, Utc::now())
            .await
        {
            Ok(_) => prompts::booking_rescheduled(&booking.display_code, slot),
            Err(Error::Booking(_)) => prompts::no_active_booking(),
            Err(e) => {
                tracing::error!("Reschedule failed: {e}");
                prompts::booking_failed_retry()
            }
        }
    }

    // ── Payment callbacks ───────────────────────────────────────────

    /// Map an asynchronous gateway callback onto the booking's payment
    /// status. Redelivery of the same callback is a no-op.
    pub async fn handle_payment_callback(&self, callback: &PaymentCallback) -> Result<()> {
        let booking = self
            .store
            .get_booking_by_payment_reference(&callback.reference)
            .await?
            .ok_or_else(|| {
                Error::Payment(PaymentError::UnknownReference(callback.reference.clone()))
            })?;

        let status = callback.status();
        if booking.payment_status == status {
            tracing::debug!(reference = %callback.reference, "Duplicate payment callback ignored");
            return Ok(());
        }

        self.store.update_payment_status(booking.id, status).await?;
        tracing::info!(
            booking = %booking.display_code,
            %status,
            "Payment status updated from callback"
        );

        // Fire-and-forget user notice.
        let body = match status {
            PaymentStatus::Paid => format!(
                "Payment received for booking {}. See you soon!",
                booking.display_code
            ),
            _ => format!(
                "Payment for booking {} did not go through. Reply 1 to retry from the menu.",
                booking.display_code
            ),
        };
        let notification = Notification::new(
            &booking.identity,
            NotificationKind::Payment,
            body,
            Utc::now(),
            Some(booking.id),
        );
        if let Err(e) = self.store.schedule_notification(&notification).await {
            tracing::warn!("Payment notice scheduling failed: {e}");
        }

        Ok(())
    }

    // ── Van tracking feed ───────────────────────────────────────────

    /// Update the live position for a booking (called by the ops feed).
    pub async fn update_van_location(&self, booking_code: &str, location: &str, eta: &str) {
        self.van_tracking.write().await.insert(
            booking_code.to_string(),
            VanStatus {
                location: location.to_string(),
                eta: eta.to_string(),
                last_update: Utc::now(),
            },
        );
    }

    /// Purge expired sessions once; the interval loop lives in `main`.
    pub async fn purge_sessions(&self) -> usize {
        match self.sessions.purge_expired().await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(count, "Purged expired sessions");
                }
                count
            }
            Err(e) => {
                tracing::warn!("Session purge failed: {e}");
                0
            }
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }
}
