//! Policy configuration with configurable thresholds
//!
//! Lockout, transaction-limit and risk thresholds are data, not constants.
//! Every field has a serde default so partial JSON files are accepted.

use crate::error::{CoreError, CoreResult};
use crate::wallet::LimitKind;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Login lockout policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Consecutive failed logins that trigger a lock
    #[serde(default = "default_max_failed_logins")]
    pub max_failed_logins: u32,

    /// Lock duration once the threshold is reached
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
}

fn default_max_failed_logins() -> u32 {
    5
}

fn default_lockout_minutes() -> i64 {
    30
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_failed_logins: default_max_failed_logins(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

impl SecurityPolicy {
    pub fn lockout_duration(&self) -> Duration {
        Duration::minutes(self.lockout_minutes)
    }
}

/// Limits for one KYC tier, in major units of the wallet currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitTier {
    pub kyc_level: u8,
    pub single: Decimal,
    pub daily: Decimal,
    pub monthly: Decimal,
}

impl LimitTier {
    pub fn limit(&self, kind: LimitKind) -> Decimal {
        match kind {
            LimitKind::SingleTransaction => self.single,
            LimitKind::Daily => self.daily,
            LimitKind::Monthly => self.monthly,
        }
    }
}

/// Transaction limits per KYC level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSchedule {
    #[serde(default = "default_tiers")]
    pub tiers: Vec<LimitTier>,

    /// Level assigned at registration and kept after a KYC rejection
    #[serde(default = "default_base_kyc_level")]
    pub base_kyc_level: u8,

    /// Level granted once KYC is approved
    #[serde(default = "default_approved_kyc_level")]
    pub approved_kyc_level: u8,
}

fn default_tiers() -> Vec<LimitTier> {
    vec![
        LimitTier {
            kyc_level: 1,
            single: Decimal::new(1_000_000, 0),
            daily: Decimal::new(2_000_000, 0),
            monthly: Decimal::new(10_000_000, 0),
        },
        LimitTier {
            kyc_level: 2,
            single: Decimal::new(5_000_000, 0),
            daily: Decimal::new(10_000_000, 0),
            monthly: Decimal::new(50_000_000, 0),
        },
    ]
}

fn default_base_kyc_level() -> u8 {
    1
}

fn default_approved_kyc_level() -> u8 {
    2
}

impl Default for LimitSchedule {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            base_kyc_level: default_base_kyc_level(),
            approved_kyc_level: default_approved_kyc_level(),
        }
    }
}

impl LimitSchedule {
    /// Tier for a KYC level
    pub fn tier(&self, kyc_level: u8) -> CoreResult<&LimitTier> {
        self.tiers
            .iter()
            .find(|t| t.kyc_level == kyc_level)
            .ok_or(CoreError::UnknownKycLevel(kyc_level))
    }

    pub fn single_transaction_limit(&self, kyc_level: u8) -> CoreResult<Decimal> {
        Ok(self.tier(kyc_level)?.single)
    }
}

/// Inputs to the advisory risk score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Customers younger than this score a point
    #[serde(default = "default_minimum_age")]
    pub minimum_age: u32,

    /// Customers at or above this age score a point
    #[serde(default = "default_senior_age")]
    pub senior_age: u32,

    /// Accounts younger than this many days score a point
    #[serde(default = "default_new_account_days")]
    pub new_account_days: i64,
}

fn default_minimum_age() -> u32 {
    21
}

fn default_senior_age() -> u32 {
    70
}

fn default_new_account_days() -> i64 {
    30
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            minimum_age: default_minimum_age(),
            senior_age: default_senior_age(),
            new_account_days: default_new_account_days(),
        }
    }
}
