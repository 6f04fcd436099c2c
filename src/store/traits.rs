//! Unified `Database` trait — single async interface for relational
//! persistence (bookings, profiles, loyalty, referrals, notifications).
//!
//! Sessions live in their own TTL key-value store (`session::SessionStore`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus, PaymentStatus};
use crate::catalog::TimeSlotDef;
use crate::error::DatabaseError;
use crate::loyalty::{LoyaltyTransaction, ReferralCode};
use crate::notify::model::Notification;
use crate::profile::HealthProfile;

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Bookings ────────────────────────────────────────────────────

    /// Insert a new booking. The idempotency key is UNIQUE at the schema
    /// level; a duplicate insert fails with `DatabaseError::Constraint`.
    async fn insert_booking(&self, booking: &Booking) -> Result<(), DatabaseError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError>;

    async fn get_booking_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Booking>, DatabaseError>;

    async fn get_booking_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, DatabaseError>;

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), DatabaseError>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), DatabaseError>;

    /// Re-anchor a booking onto a new slot; sets status to `rescheduled`.
    async fn reschedule_booking(
        &self,
        id: Uuid,
        slot: &TimeSlotDef,
        scheduled_time: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Recent bookings for an identity, newest first.
    async fn list_bookings_for(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<Booking>, DatabaseError>;

    /// The identity's most recent still-active booking, if any.
    async fn latest_active_booking(
        &self,
        identity: &str,
    ) -> Result<Option<Booking>, DatabaseError>;

    // ── Health profiles ─────────────────────────────────────────────

    async fn get_profile(&self, identity: &str) -> Result<Option<HealthProfile>, DatabaseError>;

    async fn upsert_profile(&self, profile: &HealthProfile) -> Result<(), DatabaseError>;

    /// Profiles that have opted in to health-tip notifications.
    async fn list_health_tip_recipients(&self) -> Result<Vec<HealthProfile>, DatabaseError>;

    // ── Loyalty ─────────────────────────────────────────────────────

    async fn insert_loyalty_transaction(
        &self,
        tx: &LoyaltyTransaction,
    ) -> Result<(), DatabaseError>;

    /// Balance = SUM of all transaction points for the identity.
    async fn loyalty_balance(&self, identity: &str) -> Result<i64, DatabaseError>;

    /// Recent transactions, newest first.
    async fn list_loyalty_transactions(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<LoyaltyTransaction>, DatabaseError>;

    // ── Referral codes ──────────────────────────────────────────────

    async fn insert_referral_code(&self, code: &ReferralCode) -> Result<(), DatabaseError>;

    async fn get_referral_code(&self, code: &str) -> Result<Option<ReferralCode>, DatabaseError>;

    async fn latest_referral_code_for(
        &self,
        identity: &str,
    ) -> Result<Option<ReferralCode>, DatabaseError>;

    async fn increment_referral_use(&self, code: &str) -> Result<(), DatabaseError>;

    // ── Notifications ───────────────────────────────────────────────

    async fn schedule_notification(&self, notification: &Notification)
    -> Result<(), DatabaseError>;

    /// Pending notifications whose scheduled time has passed.
    async fn list_due_notifications(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, DatabaseError>;

    async fn mark_notification_sent(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Best-effort cancellation of pending notifications for a booking.
    /// Returns how many were cancelled.
    async fn cancel_notifications_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<usize, DatabaseError>;
}
