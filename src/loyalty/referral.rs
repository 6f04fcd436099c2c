//! Referral codes: generation and redemption.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LoyaltyConfig;
use crate::error::{Error, LoyaltyError, Result};
use crate::loyalty::ledger::LoyaltyLedger;
use crate::store::Database;

/// A referral code. Immutable once created except for the use counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralCode {
    pub code: String,
    pub owner: String,
    pub uses: u32,
    pub max_uses: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ReferralCode {
    pub fn is_redeemable(&self) -> bool {
        self.active && self.uses < self.max_uses
    }
}

/// Generates and redeems referral codes, crediting both parties through
/// the loyalty ledger.
pub struct ReferralEngine {
    store: Arc<dyn Database>,
    ledger: Arc<LoyaltyLedger>,
    config: LoyaltyConfig,
}

impl ReferralEngine {
    pub fn new(store: Arc<dyn Database>, ledger: Arc<LoyaltyLedger>, config: LoyaltyConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Create a fresh code for an identity. Codes look deterministic (they
    /// embed the identity tail) but carry a random suffix, so every call
    /// yields a distinct code.
    pub async fn generate(&self, identity: &str) -> Result<ReferralCode> {
        let tail: String = identity
            .chars()
            .rev()
            .take(4)
            .filter(|c| c.is_ascii_digit())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(4)
            .map(|b| (b as char).to_ascii_uppercase())
            .collect();

        let code = ReferralCode {
            code: format!("CARE{tail}{suffix}"),
            owner: identity.to_string(),
            uses: 0,
            max_uses: self.config.referral_max_uses,
            active: true,
            created_at: Utc::now(),
        };
        self.store.insert_referral_code(&code).await?;
        tracing::info!(identity, code = %code.code, "Referral code generated");
        Ok(code)
    }

    /// The identity's most recent code, creating one if none exists.
    pub async fn current_or_generate(&self, identity: &str) -> Result<ReferralCode> {
        match self.store.latest_referral_code_for(identity).await? {
            Some(code) if code.is_redeemable() => Ok(code),
            _ => self.generate(identity).await,
        }
    }

    /// Redeem a code for a newly-referred identity.
    ///
    /// Credits both the referrer and the referred identity and increments
    /// the use counter. Unknown, inactive, exhausted, and self-referring
    /// codes all fail with `InvalidReferralCode` — never a silent no-op.
    pub async fn redeem(
        &self,
        code: &str,
        new_identity: &str,
        booking_id: Option<Uuid>,
    ) -> Result<bool> {
        let invalid = || {
            Error::Loyalty(LoyaltyError::InvalidReferralCode {
                code: code.to_string(),
            })
        };

        let record = self.store.get_referral_code(code).await?.ok_or_else(invalid)?;
        if !record.is_redeemable() || record.owner == new_identity {
            return Err(invalid());
        }

        self.store.increment_referral_use(code).await?;

        let award = self.config.referral_points;
        self.ledger
            .credit(&record.owner, award, "referral", booking_id)
            .await?;
        self.ledger
            .credit(new_identity, award, "referred", booking_id)
            .await?;

        tracing::info!(code, referrer = %record.owner, referred = new_identity, "Referral redeemed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_redeemable_until_max_uses() {
        let mut code = ReferralCode {
            code: "CARE0001ABCD".into(),
            owner: "+254700000001".into(),
            uses: 0,
            max_uses: 2,
            active: true,
            created_at: Utc::now(),
        };
        assert!(code.is_redeemable());
        code.uses = 1;
        assert!(code.is_redeemable());
        code.uses = 2;
        assert!(!code.is_redeemable());
    }

    #[test]
    fn inactive_code_is_not_redeemable() {
        let code = ReferralCode {
            code: "CARE0001ABCD".into(),
            owner: "+254700000001".into(),
            uses: 0,
            max_uses: 5,
            active: false,
            created_at: Utc::now(),
        };
        assert!(!code.is_redeemable());
    }
}
