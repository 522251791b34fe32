//! Application configuration
//!
//! One JSON document configures storage and every policy threshold.
//! Missing fields fall back to defaults, so `{}` is a valid config.

use anyhow::{ensure, Context};
use mobiwallet_core::{Currency, CoreResult, LimitSchedule, RiskPolicy, SecurityPolicy};
use mobiwallet_persistence::StorageConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub security: SecurityPolicy,

    #[serde(default)]
    pub limits: LimitSchedule,

    #[serde(default)]
    pub risk: RiskPolicy,

    /// Currency of newly registered wallets
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Credited to every new wallet at registration; 0 disables it
    #[serde(default)]
    pub opening_balance: Decimal,

    /// Consecutive storage failures before the ledger reports degraded
    #[serde(default = "default_degraded_after_failures")]
    pub degraded_after_failures: u32,
}

fn default_currency() -> String {
    "RWF".to_string()
}

fn default_degraded_after_failures() -> u32 {
    3
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            security: SecurityPolicy::default(),
            limits: LimitSchedule::default(),
            risk: RiskPolicy::default(),
            default_currency: default_currency(),
            opening_balance: Decimal::ZERO,
            degraded_after_failures: default_degraded_after_failures(),
        }
    }
}

impl WalletConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> anyhow::Result<()> {
        let currency = self.currency()?;
        ensure!(
            !self.opening_balance.is_sign_negative(),
            "opening_balance must not be negative"
        );
        ensure!(
            self.opening_balance.normalize().scale() <= u32::from(currency.decimals),
            "opening_balance has more decimals than {} allows",
            currency.code
        );
        ensure!(
            self.security.max_failed_logins > 0,
            "max_failed_logins must be at least 1"
        );
        ensure!(self.degraded_after_failures > 0, "degraded_after_failures must be at least 1");
        self.limits.tier(self.limits.base_kyc_level)?;
        self.limits.tier(self.limits.approved_kyc_level)?;
        Ok(())
    }

    pub fn currency(&self) -> CoreResult<Currency> {
        Currency::from_code(&self.default_currency)
    }
}
