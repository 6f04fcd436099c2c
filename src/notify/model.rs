//! Notification queue records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of message a queued notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Pre-arrival reminder, fixed offset before the slot start.
    Reminder,
    /// Arrival notice at the slot start.
    Arrival,
    /// Recurring health-tip digest.
    HealthTip,
    /// Payment status update.
    Payment,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Reminder => "reminder",
            Self::Arrival => "arrival",
            Self::HealthTip => "health_tip",
            Self::Payment => "payment",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reminder" => Ok(Self::Reminder),
            "arrival" => Ok(Self::Arrival),
            "health_tip" => Ok(Self::HealthTip),
            "payment" => Ok(Self::Payment),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Cancelled,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

/// A deferred outbound message, delivered by the ticker when due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub identity: String,
    pub kind: NotificationKind,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: NotificationStatus,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        identity: &str,
        kind: NotificationKind,
        body: String,
        scheduled_for: DateTime<Utc>,
        booking_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            kind,
            body,
            scheduled_for,
            status: NotificationStatus::Pending,
            booking_id,
            created_at: Utc::now(),
        }
    }
}
