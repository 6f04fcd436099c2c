//! Booking orchestration — turns a completed draft into a committed booking.
//!
//! The commit sequence is fixed (validate, id, two-phase persist, loyalty,
//! profile, notifications, reset) and each step's failure must not corrupt
//! earlier completed steps. Steps after the persist are at-least-attempt:
//! their failures are logged and swallowed, never rolled back into the
//! user's flow.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::booking::model::{Booking, BookingStatus, scheduled_time_for};
use crate::config::BotConfig;
use crate::error::{BookingError, DatabaseError, Error, Result};
use crate::flow::ConversationState;
use crate::loyalty::LoyaltyLedger;
use crate::notify::model::{Notification, NotificationKind};
use crate::profile::HealthProfile;
use crate::session::Session;
use crate::store::Database;

/// The result of a successful (or idempotently retried) completion.
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub booking: Booking,
    /// Points credited by this call; zero on an idempotent retry.
    pub points_earned: i64,
    /// Balance after crediting (best effort; zero if the ledger was down).
    pub balance: i64,
    /// True when an existing booking was returned instead of a new one.
    pub retried: bool,
}

/// Sequences the booking commit and its side effects.
pub struct BookingOrchestrator {
    store: Arc<dyn Database>,
    ledger: Arc<LoyaltyLedger>,
    config: BotConfig,
}

impl BookingOrchestrator {
    pub fn new(store: Arc<dyn Database>, ledger: Arc<LoyaltyLedger>, config: BotConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Commit the session's draft booking.
    ///
    /// On success the session's draft is reset and its state returned to
    /// `MainMenu`. Errors from the persist phase are retryable: the session
    /// is left untouched so the user can try again.
    pub async fn complete_booking(
        &self,
        session: &mut Session,
        now: DateTime<Utc>,
    ) -> Result<BookingReceipt> {
        // 1. Re-validate the draft.
        if let Some(missing) = session.draft.missing_step() {
            return Err(Error::Booking(BookingError::Incomplete { missing }));
        }
        let service = session.draft.service().expect("validated above");
        let slot = session.draft.slot().expect("validated above");
        let quote = session.draft.logistics.clone().expect("validated above");
        let method = session.draft.payment_method.expect("validated above");

        // 2. Build the record (unique id + display code).
        let scheduled = scheduled_time_for(slot, now, self.config.utc_offset_hours);
        let mut booking =
            Booking::from_draft(session, service, slot, &quote, method, scheduled, now);

        // 3. Two-phase persist: pending, then confirmed. A UNIQUE violation
        //    on the idempotency key means a retry — return the existing row.
        match self.store.insert_booking(&booking).await {
            Ok(()) => {}
            Err(DatabaseError::Constraint(_)) => {
                return self.resolve_retry(session, &booking.idempotency_key).await;
            }
            Err(e) => return Err(e.into()),
        }
        self.store
            .update_booking_status(booking.id, BookingStatus::Confirmed)
            .await?;
        booking.status = BookingStatus::Confirmed;

        // 4-6. At-least-attempt side effects.
        let (points_earned, balance) = self.credit_loyalty(&booking).await;
        self.bump_profile(session, &booking).await;
        self.schedule_notifications(&booking).await;

        // 7. Reset the draft and return to the menu.
        session.reset_draft();
        session.state = ConversationState::MainMenu;

        tracing::info!(
            identity = %booking.identity,
            booking = %booking.display_code,
            total = %booking.total_fee,
            "Booking confirmed"
        );

        Ok(BookingReceipt {
            booking,
            points_earned,
            balance,
            retried: false,
        })
    }

    /// Idempotency-key collision: treat as success-on-retry and hand back
    /// the existing booking without re-running side effects.
    async fn resolve_retry(&self, session: &mut Session, key: &str) -> Result<BookingReceipt> {
        let existing = self
            .store
            .get_booking_by_idempotency_key(key)
            .await?
            .ok_or_else(|| {
                // Constraint fired but the row is gone: genuinely conflicted.
                Error::Database(DatabaseError::Constraint(format!(
                    "idempotency key {key} conflicted but no row found"
                )))
            })?;

        let mut existing = existing;
        if existing.status == BookingStatus::Pending {
            // A crash between the two phases left it pending; finish the flip.
            self.store
                .update_booking_status(existing.id, BookingStatus::Confirmed)
                .await?;
            existing.status = BookingStatus::Confirmed;
        }

        let balance = self
            .ledger
            .balance(&existing.identity)
            .await
            .map(|b| b.points)
            .unwrap_or(0);

        session.reset_draft();
        session.state = ConversationState::MainMenu;

        tracing::info!(
            booking = %existing.display_code,
            "Duplicate completion resolved to existing booking"
        );

        Ok(BookingReceipt {
            booking: existing,
            points_earned: 0,
            balance,
            retried: true,
        })
    }

    async fn credit_loyalty(&self, booking: &Booking) -> (i64, i64) {
        let points = self.config.loyalty.booking_points;
        match self
            .ledger
            .credit(&booking.identity, points, "booking completed", Some(booking.id))
            .await
        {
            Ok(balance) => (points, balance),
            Err(e) => {
                tracing::warn!(booking = %booking.display_code, "Loyalty credit failed: {e}");
                (0, 0)
            }
        }
    }

    async fn bump_profile(&self, session: &Session, booking: &Booking) {
        let result = async {
            let mut profile = self
                .store
                .get_profile(&booking.identity)
                .await?
                .unwrap_or_else(|| HealthProfile::new(&booking.identity));

            profile.visit_count += 1;
            profile.last_visit = Some(booking.created_at);
            profile.add_preferred_category(&booking.service_category);
            profile.add_payment_method(&booking.payment_method.to_string());
            if let Some(text) = &session.draft.prediagnosis {
                profile.apply_intake(text);
            }

            self.store.upsert_profile(&profile).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(booking = %booking.display_code, "Profile update failed: {e}");
        }
    }

    async fn schedule_notifications(&self, booking: &Booking) {
        let cfg = &self.config.notifications;
        let reminder = Notification::new(
            &booking.identity,
            NotificationKind::Reminder,
            format!(
                "Reminder: your CarePod visit ({}) starts at {}. The team is on its way soon.",
                booking.display_code, booking.slot_start
            ),
            booking.scheduled_time - cfg.reminder_offset,
            Some(booking.id),
        );
        let arrival = Notification::new(
            &booking.identity,
            NotificationKind::Arrival,
            format!(
                "Your CarePod team for booking {} is arriving now. Please meet them at {}.",
                booking.display_code, booking.location
            ),
            booking.scheduled_time + cfg.arrival_offset,
            Some(booking.id),
        );

        for notification in [reminder, arrival] {
            if let Err(e) = self.store.schedule_notification(&notification).await {
                tracing::warn!(
                    booking = %booking.display_code,
                    kind = %notification.kind,
                    "Failed to schedule notification: {e}"
                );
            }
        }
    }

    /// Cancel a booking and best-effort cancel its pending notifications.
    pub async fn cancel_booking(&self, booking: &Booking) -> Result<()> {
        if !booking.status.is_active() {
            return Err(Error::Booking(BookingError::InvalidStatus {
                id: booking.display_code.clone(),
                status: booking.status.to_string(),
                action: "cancel",
            }));
        }
        self.store
            .update_booking_status(booking.id, BookingStatus::Cancelled)
            .await?;

        match self.store.cancel_notifications_for_booking(booking.id).await {
            Ok(count) => {
                tracing::info!(booking = %booking.display_code, count, "Cancelled notifications")
            }
            Err(e) => {
                tracing::warn!(
                    booking = %booking.display_code,
                    "Notification cancellation missed: {e}"
                );
            }
        }
        Ok(())
    }

    /// Re-anchor a booking's scheduled time onto a new slot.
    pub async fn reschedule_booking(
        &self,
        booking: &Booking,
        slot: &'static crate::catalog::TimeSlotDef,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        if !booking.status.is_active() {
            return Err(Error::Booking(BookingError::InvalidStatus {
                id: booking.display_code.clone(),
                status: booking.status.to_string(),
                action: "reschedule",
            }));
        }
        let scheduled = scheduled_time_for(slot, now, self.config.utc_offset_hours);
        self.store
            .reschedule_booking(booking.id, slot, scheduled)
            .await?;

        // Old reminders point at the old time; drop them and re-arm.
        if let Err(e) = self.store.cancel_notifications_for_booking(booking.id).await {
            tracing::warn!(booking = %booking.display_code, "Notification re-arm missed: {e}");
        }
        let mut moved = booking.clone();
        moved.scheduled_time = scheduled;
        moved.slot_start = slot.start.to_string();
        self.schedule_notifications(&moved).await;

        Ok(scheduled)
    }
}
