//! # Error Module
//!
//! Domain errors for Mobiwallet, built with thiserror.

use crate::account::{AccountStatus, KycStatus};
use crate::wallet::LimitKind;
use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
///
/// Pure business-rule failures, independent of storage.
#[derive(Debug, Error)]
pub enum CoreError {
    // === Money errors ===
    #[error("Insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    // === Account errors ===
    #[error("Account is closed: {0}")]
    AccountClosed(String),

    #[error("Invalid account transition: {action} not allowed while {status}")]
    InvalidTransition {
        action: &'static str,
        status: AccountStatus,
    },

    #[error("Invalid KYC transition: {from} -> {to}")]
    InvalidKycTransition { from: KycStatus, to: KycStatus },

    #[error("A reason is required to {0}")]
    ReasonRequired(&'static str),

    // === Wallet errors ===
    #[error("Wallet is inactive: {0}")]
    WalletInactive(String),

    #[error("{limit} limit exceeded: limit {limit_amount}, attempted {attempted}")]
    LimitExceeded {
        limit: LimitKind,
        limit_amount: Decimal,
        attempted: Decimal,
    },

    #[error("No limit tier configured for KYC level {0}")]
    UnknownKycLevel(u8),

    // === Validation errors ===
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, CoreError::InsufficientFunds { .. })
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, CoreError::LimitExceeded { .. })
    }

    /// Errors raised because the account refuses further changes
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            CoreError::AccountClosed(_)
                | CoreError::InvalidTransition { .. }
                | CoreError::InvalidKycTransition { .. }
        )
    }
}
