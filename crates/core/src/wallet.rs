//! # Wallet Module
//!
//! A Wallet holds the balance of exactly one account in one fixed currency.
//! It carries limit *policy* (its KYC level); the facts needed to evaluate
//! cumulative limits live in the ledger.

use crate::error::{CoreError, CoreResult};
use crate::money::{Currency, Money};
use crate::policy::LimitSchedule;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which transaction limit was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    SingleTransaction,
    Daily,
    Monthly,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::SingleTransaction => "single_transaction",
            LimitKind::Daily => "daily",
            LimitKind::Monthly => "monthly",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Balance holder bound 1:1 to an account.
///
/// `balance` is a projection maintained by the ledger; nothing outside the
/// ledger store writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub owner_account_id: String,
    pub balance: Money,
    pub is_active: bool,
    /// Caps transaction limits through the limit schedule
    pub kyc_level: u8,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// New empty wallet
    pub fn new(id: &str, owner_account_id: &str, currency: Currency, kyc_level: u8, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            owner_account_id: owner_account_id.to_string(),
            balance: Money::zero(currency),
            is_active: true,
            kyc_level,
            created_at: now,
        }
    }

    pub fn currency(&self) -> &Currency {
        &self.balance.currency
    }

    /// Boolean form of [`Wallet::check_debit`]
    pub fn can_debit(&self, amount: &Money, limits: &LimitSchedule) -> bool {
        self.check_debit(amount, limits).is_ok()
    }

    /// `is_active ∧ balance ≥ amount ∧ amount ≤ single-transaction limit`
    pub fn check_debit(&self, amount: &Money, limits: &LimitSchedule) -> CoreResult<()> {
        if !self.is_active {
            return Err(CoreError::WalletInactive(self.id.clone()));
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount(format!(
                "amount must be positive: {}",
                amount.amount
            )));
        }
        self.balance.checked_sub(amount)?;

        let single = limits.single_transaction_limit(self.kyc_level)?;
        if amount.amount > single {
            return Err(CoreError::LimitExceeded {
                limit: LimitKind::SingleTransaction,
                limit_amount: single,
                attempted: amount.amount,
            });
        }
        Ok(())
    }

    /// Check cumulative limits given what was already spent in the
    /// current UTC day and month.
    pub fn check_cumulative(
        &self,
        amount: &Money,
        spent_today: &Money,
        spent_this_month: &Money,
        limits: &LimitSchedule,
    ) -> CoreResult<()> {
        let tier = limits.tier(self.kyc_level)?;
        for (kind, spent) in [
            (LimitKind::Daily, spent_today),
            (LimitKind::Monthly, spent_this_month),
        ] {
            let attempted = spent.checked_add(amount)?.amount;
            let limit_amount = tier.limit(kind);
            if attempted > limit_amount {
                return Err(CoreError::LimitExceeded {
                    limit: kind,
                    limit_amount,
                    attempted,
                });
            }
        }
        Ok(())
    }

    /// Remaining headroom for a limit, never negative
    pub fn remaining(&self, kind: LimitKind, spent: Decimal, limits: &LimitSchedule) -> CoreResult<Decimal> {
        let limit = limits.tier(self.kyc_level)?.limit(kind);
        Ok((limit - spent).max(Decimal::ZERO))
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.balance)?;
        if !self.is_active {
            write!(f, " inactive")?;
        }
        Ok(())
    }
}
