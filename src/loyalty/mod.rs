//! Loyalty program: append-only ledger, tiers, and referrals.

pub mod ledger;
pub mod referral;

pub use ledger::{LoyaltyBalance, LoyaltyLedger, LoyaltyTransaction, Tier};
pub use referral::{ReferralCode, ReferralEngine};
