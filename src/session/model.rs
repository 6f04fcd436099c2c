//! Session and draft-booking models.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{PaymentMethod, ServiceDef, TimeSlotDef, service_by_key, slot_by_key};
use crate::flow::ConversationState;
use crate::logistics::LogisticsQuote;

/// The partially-filled booking fields accumulated across session states.
///
/// Fields are populated monotonically as the user progresses and cleared
/// only on completion or explicit cancellation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftBooking {
    pub location: Option<String>,
    pub logistics: Option<LogisticsQuote>,
    pub service_key: Option<String>,
    pub slot_key: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub prediagnosis: Option<String>,
}

impl DraftBooking {
    /// The selected service, if the key is set and valid.
    pub fn service(&self) -> Option<&'static ServiceDef> {
        self.service_key.as_deref().and_then(service_by_key)
    }

    /// The selected time slot, if the key is set and valid.
    pub fn slot(&self) -> Option<&'static TimeSlotDef> {
        self.slot_key.as_deref().and_then(slot_by_key)
    }

    /// The earliest missing required field, or `None` when the draft is
    /// complete enough to commit.
    pub fn missing_step(&self) -> Option<&'static str> {
        if self.location.is_none() || self.logistics.is_none() {
            return Some("location");
        }
        if self.service().is_none() {
            return Some("service");
        }
        if self.slot().is_none() {
            return Some("time slot");
        }
        if self.payment_method.is_none() {
            return Some("payment method");
        }
        None
    }
}

/// Mutable, TTL-bounded conversation state for one user identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Phone-number identity.
    pub identity: String,
    pub state: ConversationState,
    pub draft: DraftBooking,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session in the `Welcome` state.
    pub fn new(identity: &str, ttl: std::time::Duration) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.to_string(),
            state: ConversationState::Welcome,
            draft: DraftBooking::default(),
            created_at: now,
            updated_at: now,
            expires_at: now + chrono_ttl(ttl),
        }
    }

    /// Mark the session as touched now and extend its expiry.
    pub fn touch(&mut self, ttl: std::time::Duration) {
        let now = Utc::now();
        self.updated_at = now;
        self.expires_at = now + chrono_ttl(ttl);
    }

    /// Clear all draft fields (on completion or cancellation).
    pub fn reset_draft(&mut self) {
        self.draft = DraftBooking::default();
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Session epoch used in the booking idempotency key: one epoch per
    /// session lifetime, so a retry within the same conversation maps to
    /// the same booking.
    pub fn epoch(&self) -> i64 {
        self.created_at.timestamp()
    }
}

fn chrono_ttl(ttl: std::time::Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_session_starts_at_welcome() {
        let s = Session::new("+254700000001", Duration::from_secs(60));
        assert_eq!(s.state, ConversationState::Welcome);
        assert_eq!(s.draft, DraftBooking::default());
        assert!(!s.is_expired(Utc::now()));
    }

    #[test]
    fn touch_extends_expiry() {
        let mut s = Session::new("+254700000001", Duration::from_secs(1));
        let before = s.expires_at;
        s.touch(Duration::from_secs(3600));
        assert!(s.expires_at > before);
    }

    #[test]
    fn missing_step_reports_earliest_first() {
        let mut draft = DraftBooking::default();
        assert_eq!(draft.missing_step(), Some("location"));

        draft.location = Some("Westlands".into());
        // Location without a quote is still incomplete.
        assert_eq!(draft.missing_step(), Some("location"));
    }

    #[test]
    fn invalid_service_key_counts_as_missing() {
        let draft = DraftBooking {
            service_key: Some("9".into()),
            ..Default::default()
        };
        assert!(draft.service().is_none());
    }

    #[test]
    fn session_serde_roundtrip() {
        let mut s = Session::new("+254700000001", Duration::from_secs(60));
        s.draft.service_key = Some("5".into());
        s.state = ConversationState::TimeSelection;

        let json = serde_json::to_string(&s).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, s);
        assert_eq!(parsed.draft.service().unwrap().name, "General Consultation");
    }
}
