//! Append-only loyalty ledger.
//!
//! The balance is always a fold over the transaction log for an identity —
//! it is never stored as an independently mutable field. Appends are safe
//! under concurrency without locking for the same reason.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LoyaltyConfig;
use crate::error::Result;
use crate::store::Database;

/// One append-only point movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub id: Uuid,
    pub identity: String,
    /// Points delta; negative for redemptions.
    pub points: i64,
    pub reason: String,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl LoyaltyTransaction {
    pub fn new(identity: &str, points: i64, reason: &str, booking_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            points,
            reason: reason.to_string(),
            booking_id,
            created_at: Utc::now(),
        }
    }
}

/// Loyalty tier, derived purely from the balance against fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn for_points(points: i64, config: &LoyaltyConfig) -> Self {
        if points >= config.gold_threshold {
            Self::Gold
        } else if points >= config.silver_threshold {
            Self::Silver
        } else {
            Self::Bronze
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
        };
        write!(f, "{s}")
    }
}

/// A derived balance snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyBalance {
    pub points: i64,
    pub tier: Tier,
}

/// The ledger API over the persistence layer.
pub struct LoyaltyLedger {
    store: Arc<dyn Database>,
    config: LoyaltyConfig,
}

impl LoyaltyLedger {
    pub fn new(store: Arc<dyn Database>, config: LoyaltyConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    /// Append a transaction and return the new balance.
    pub async fn credit(
        &self,
        identity: &str,
        points: i64,
        reason: &str,
        booking_id: Option<Uuid>,
    ) -> Result<i64> {
        let tx = LoyaltyTransaction::new(identity, points, reason, booking_id);
        self.store.insert_loyalty_transaction(&tx).await?;
        let balance = self.store.loyalty_balance(identity).await?;
        tracing::info!(identity, points, reason, balance, "Loyalty credited");
        Ok(balance)
    }

    /// Current balance and derived tier.
    pub async fn balance(&self, identity: &str) -> Result<LoyaltyBalance> {
        let points = self.store.loyalty_balance(identity).await?;
        Ok(LoyaltyBalance {
            points,
            tier: Tier::for_points(points, &self.config),
        })
    }

    /// Most recent transactions, newest first.
    pub async fn history(&self, identity: &str, limit: usize) -> Result<Vec<LoyaltyTransaction>> {
        Ok(self.store.list_loyalty_transactions(identity, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        let config = LoyaltyConfig::default();
        assert_eq!(Tier::for_points(0, &config), Tier::Bronze);
        assert_eq!(Tier::for_points(199, &config), Tier::Bronze);
        assert_eq!(Tier::for_points(200, &config), Tier::Silver);
        assert_eq!(Tier::for_points(499, &config), Tier::Silver);
        assert_eq!(Tier::for_points(500, &config), Tier::Gold);
        assert_eq!(Tier::for_points(10_000, &config), Tier::Gold);
    }

    #[test]
    fn negative_balance_is_bronze() {
        let config = LoyaltyConfig::default();
        assert_eq!(Tier::for_points(-50, &config), Tier::Bronze);
    }
}
