//! Configuration types.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Top-level bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot name for identification.
    pub name: String,
    /// Session inactivity TTL (sessions are purged after this duration).
    pub session_ttl: Duration,
    /// How often the session purge ticker runs.
    pub session_purge_interval: Duration,
    /// Timeout for advisory gateway calls.
    pub advisory_timeout: Duration,
    /// Timeout for external geocoding calls.
    pub geocode_timeout: Duration,
    /// UTC offset (hours) of the service area, for time-of-day surcharges.
    pub utc_offset_hours: i32,
    pub loyalty: LoyaltyConfig,
    pub notifications: NotifyConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "carepod".to_string(),
            session_ttl: Duration::from_secs(3600), // 1 hour
            session_purge_interval: Duration::from_secs(300),
            advisory_timeout: Duration::from_secs(15),
            geocode_timeout: Duration::from_secs(5),
            utc_offset_hours: 3, // Nairobi
            loyalty: LoyaltyConfig::default(),
            notifications: NotifyConfig::default(),
        }
    }
}

/// Loyalty program configuration.
///
/// Tier derivation: Bronze below `silver_threshold`, Silver from there up to
/// `gold_threshold`, Gold above.
#[derive(Debug, Clone)]
pub struct LoyaltyConfig {
    /// Points credited per completed booking.
    pub booking_points: i64,
    /// Points credited to each party on referral redemption.
    pub referral_points: i64,
    /// Minimum balance for Silver tier.
    pub silver_threshold: i64,
    /// Minimum balance for Gold tier.
    pub gold_threshold: i64,
    /// Maximum redemptions per referral code.
    pub referral_max_uses: u32,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            booking_points: 50,
            referral_points: 500,
            silver_threshold: 200,
            gold_threshold: 500,
            referral_max_uses: 5,
        }
    }
}

/// Notification scheduling configuration.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// How far before the slot start the pre-arrival reminder fires.
    pub reminder_offset: chrono::Duration,
    /// Offset of the arrival notice relative to the slot start
    /// (zero = at the start).
    pub arrival_offset: chrono::Duration,
    /// How often the due-notification ticker runs.
    pub tick_interval: Duration,
    /// Cron schedule for the health-tip digest (6-field, seconds first).
    pub health_tip_schedule: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            reminder_offset: chrono::Duration::minutes(60),
            arrival_offset: chrono::Duration::minutes(0),
            tick_interval: Duration::from_secs(30),
            health_tip_schedule: "0 0 9 * * *".to_string(), // daily 09:00
        }
    }
}

/// Zone pricing surcharge configuration.
#[derive(Debug, Clone)]
pub struct SurchargeConfig {
    /// Flat surcharge during weekday rush hours.
    pub rush_hour: Decimal,
    /// Flat weekend surcharge.
    pub weekend: Decimal,
}

impl Default for SurchargeConfig {
    fn default() -> Self {
        Self {
            rush_hour: dec!(50),
            weekend: dec!(100),
        }
    }
}
