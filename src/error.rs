//! Error types for CarePod.

use std::time::Duration;

/// Top-level error type for the booking engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Logistics error: {0}")]
    Logistics(#[from] LogisticsError),

    #[error("Advisory error: {0}")]
    Advisory(#[from] AdvisoryError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),

    #[error("Loyalty error: {0}")]
    Loyalty(#[from] LoyaltyError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Session store errors.
///
/// Absence of a session is NOT an error — `SessionStore::get` returns
/// `Option`. These cover backend failures only.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session backend unavailable: {0}")]
    Backend(String),

    #[error("Failed to serialize session for {identity}: {reason}")]
    Serialization { identity: String, reason: String },
}

/// Geo/pricing resolution errors.
///
/// These surface only from the geocoder seam; the resolver converts them
/// into the fallback zone rather than failing the flow.
#[derive(Debug, thiserror::Error)]
pub enum LogisticsError {
    #[error("Geocoding failed: {0}")]
    Geocode(String),

    #[error("Geocoder timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Advisory gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("Advisory backend {backend} request failed: {reason}")]
    RequestFailed { backend: String, reason: String },

    #[error("Advisory call timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Payment gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment initiation failed for {method}: {reason}")]
    InitiationFailed { method: String, reason: String },

    #[error("Unknown payment reference: {0}")]
    UnknownReference(String),

    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(String),
}

/// Booking orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// The orchestrator was invoked before all required draft fields were
    /// set. `missing` names the earliest missing step.
    #[error("Booking draft incomplete: missing {missing}")]
    Incomplete { missing: &'static str },

    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Booking {id} already in status {status}, cannot {action}")]
    InvalidStatus {
        id: String,
        status: String,
        action: &'static str,
    },
}

/// Loyalty ledger and referral errors.
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyError {
    #[error("Invalid referral code: {code}")]
    InvalidReferralCode { code: String },
}

/// Messaging transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message to {to}: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Invalid inbound message: {0}")]
    InvalidMessage(String),
}

/// Result type alias for the booking engine.
pub type Result<T> = std::result::Result<T, Error>;
