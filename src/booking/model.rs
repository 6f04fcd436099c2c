//! Booking model and status machines.

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{PaymentMethod, ServiceDef, TimeSlotDef};
use crate::logistics::{LogisticsQuote, Zone};
use crate::session::Session;

/// Booking lifecycle status.
///
/// One-directional except rescheduling, which re-anchors the scheduled
/// time without changing the booking's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

impl BookingStatus {
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Cancelled)
                | (Confirmed, Rescheduled)
                | (Rescheduled, InProgress)
                | (Rescheduled, Cancelled)
                | (Rescheduled, Rescheduled)
                | (InProgress, Completed)
        )
    }

    /// Whether the visit is still ahead (cancellable/reschedulable).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Rescheduled)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rescheduled => "rescheduled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "rescheduled" => Ok(Self::Rescheduled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// Payment settlement status, resolved asynchronously via gateway callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// A committed (or committing) booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Short human-facing code quoted in messages.
    pub display_code: String,
    pub identity: String,
    pub service_key: String,
    pub service_name: String,
    pub service_category: String,
    pub service_fee: Decimal,
    pub duration_minutes: u32,
    pub slot_key: String,
    pub slot_label: String,
    /// Local "HH:MM" bounds of the slot.
    pub slot_start: String,
    pub slot_end: String,
    pub location: String,
    pub zone: Zone,
    pub logistics_fee: Decimal,
    /// `service_fee + logistics_fee`.
    pub total_fee: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub payment_status: PaymentStatus,
    pub prediagnosis: Option<String>,
    pub status: BookingStatus,
    pub scheduled_time: DateTime<Utc>,
    /// Derived from the session + draft fingerprint; UNIQUE in storage.
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Build a pending booking from a complete draft.
    ///
    /// Callers must have validated the draft (`DraftBooking::missing_step()
    /// == None`); the accessors here would panic otherwise, so the
    /// orchestrator checks first.
    pub fn from_draft(
        session: &Session,
        service: &ServiceDef,
        slot: &TimeSlotDef,
        quote: &LogisticsQuote,
        payment_method: PaymentMethod,
        scheduled_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_code: generate_display_code(),
            identity: session.identity.clone(),
            service_key: service.key.to_string(),
            service_name: service.name.to_string(),
            service_category: service.category.to_string(),
            service_fee: service.price,
            duration_minutes: service.duration_minutes,
            slot_key: slot.key.to_string(),
            slot_label: slot.label.to_string(),
            slot_start: slot.start.to_string(),
            slot_end: slot.end.to_string(),
            location: quote.location.clone(),
            zone: quote.zone,
            logistics_fee: quote.total_fee,
            total_fee: service.price + quote.total_fee,
            payment_method,
            payment_reference: session.draft.payment_reference.clone(),
            payment_status: PaymentStatus::Pending,
            prediagnosis: session.draft.prediagnosis.clone(),
            status: BookingStatus::Pending,
            scheduled_time,
            idempotency_key: idempotency_key(session),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Derive the idempotency key from the session and draft fingerprint.
///
/// The key is a plain normalized string rather than a hash so collisions
/// are inspectable in the database. A retry within the same session with
/// the same draft maps to the same key; a new session (new epoch) starts a
/// fresh booking.
pub fn idempotency_key(session: &Session) -> String {
    let draft = &session.draft;
    format!(
        "{}:{}:{}:{}:{}:{}",
        session.identity,
        draft.service_key.as_deref().unwrap_or("-"),
        draft.slot_key.as_deref().unwrap_or("-"),
        draft
            .location
            .as_deref()
            .unwrap_or("-")
            .trim()
            .to_lowercase(),
        draft
            .payment_method
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string()),
        session.epoch(),
    )
}

/// Short display code: "BK-" plus six random uppercase alphanumerics.
/// Not guessable from the identity alone.
pub fn generate_display_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("BK-{suffix}")
}

/// Scheduled time for a slot: today at the slot's local start, or tomorrow
/// if that has already passed.
pub fn scheduled_time_for(
    slot: &TimeSlotDef,
    now: DateTime<Utc>,
    utc_offset_hours: i32,
) -> DateTime<Utc> {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    let local_now = now.with_timezone(&offset);
    let start = slot.start_time();

    let mut candidate = offset
        .with_ymd_and_hms(
            local_now.year(),
            local_now.month(),
            local_now.day(),
            chrono::Timelike::hour(&start),
            chrono::Timelike::minute(&start),
            0,
        )
        .single()
        .unwrap_or(local_now);

    if candidate <= local_now {
        candidate += chrono::Duration::days(1);
    }
    candidate.with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::slot_by_key;
    use chrono::Timelike;

    #[test]
    fn status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Rescheduled));
        assert!(Rescheduled.can_transition_to(Rescheduled));
        assert!(InProgress.can_transition_to(Completed));

        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn status_display_roundtrip() {
        use BookingStatus::*;
        for status in [Pending, Confirmed, InProgress, Completed, Cancelled, Rescheduled] {
            let parsed: BookingStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn display_codes_are_unique_enough() {
        let a = generate_display_code();
        let b = generate_display_code();
        assert!(a.starts_with("BK-"));
        assert_eq!(a.len(), 9);
        assert_ne!(a, b);
    }

    #[test]
    fn scheduled_time_rolls_to_tomorrow_when_past() {
        let slot = slot_by_key("1").unwrap(); // 09:00 local

        // 12:00 local (09:00 UTC at +3): morning slot already passed.
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 6, 11, 9, 0, 0).unwrap();
        let scheduled = scheduled_time_for(slot, now, 3);
        assert!(scheduled > now);
        assert_eq!(scheduled.date_naive(), now.date_naive() + chrono::Days::new(1));

        // 06:00 local: morning slot still ahead today.
        let early = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 6, 11, 3, 0, 0).unwrap();
        let scheduled = scheduled_time_for(slot, early, 3);
        assert_eq!(scheduled.date_naive(), early.date_naive());
        // 09:00 local = 06:00 UTC.
        assert_eq!(scheduled.hour(), 6);
    }

    #[test]
    fn idempotency_key_is_stable_for_same_draft() {
        let mut session = Session::new("+254700000001", std::time::Duration::from_secs(3600));
        session.draft.service_key = Some("5".into());
        session.draft.slot_key = Some("2".into());
        session.draft.location = Some("  Westlands ".into());
        session.draft.payment_method = Some(PaymentMethod::MobileMoney);

        let a = idempotency_key(&session);
        let b = idempotency_key(&session);
        assert_eq!(a, b);
        assert!(a.contains("westlands"), "location is normalized");
        assert!(a.contains("mobile_money"));
    }
}
