//! Business layer errors
//!
//! `TransferError` is what callers of the transfer engine see;
//! `SecurityError` covers the account security service.

use chrono::{DateTime, Utc};
use mobiwallet_core::{CoreError, LimitKind, Money};
use mobiwallet_persistence::PersistenceError;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Why an account may not originate a transfer right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotOperableReason {
    Closed,
    Suspended,
    Locked { until: DateTime<Utc> },
    WalletInactive,
}

impl fmt::Display for NotOperableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotOperableReason::Closed => write!(f, "account is closed"),
            NotOperableReason::Suspended => write!(f, "account is suspended"),
            NotOperableReason::Locked { until } => {
                write!(f, "account is locked until {}", until.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            NotOperableReason::WalletInactive => write!(f, "wallet is inactive"),
        }
    }
}

/// Transfer engine errors
#[derive(Debug, Error)]
pub enum TransferError {
    // === Validation errors (nothing written) ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Cannot transfer to the sender's own wallet")]
    SelfTransferNotAllowed,

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Account {account_id} cannot transact: {reason}")]
    AccountNotOperable {
        account_id: String,
        reason: NotOperableReason,
    },

    #[error("Insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: Money, available: Money },

    #[error("{limit} limit exceeded: limit {limit_amount}, attempted {attempted}")]
    LimitExceeded {
        limit: LimitKind,
        limit_amount: Decimal,
        attempted: Decimal,
    },

    #[error("Transfer rejected: {0}")]
    Rejected(#[from] CoreError),

    // === Storage failures ===
    #[error("Transfer {reference} failed: {cause}")]
    TransferFailed {
        reference: String,
        #[source]
        cause: PersistenceError,
    },
}

/// Result type alias for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

impl TransferError {
    pub fn not_operable(account_id: &str, reason: NotOperableReason) -> Self {
        Self::AccountNotOperable {
            account_id: account_id.to_string(),
            reason,
        }
    }

    pub fn failed(reference: &str, cause: PersistenceError) -> Self {
        Self::TransferFailed {
            reference: reference.to_string(),
            cause,
        }
    }

    /// Rejected before any mutation
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::TransferFailed { .. })
    }

    /// Worth retrying unchanged. Storage failures must be retried with the
    /// same reference.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransferFailed { .. }
                | Self::InsufficientFunds { .. }
                | Self::LimitExceeded { .. }
                | Self::AccountNotOperable {
                    reason: NotOperableReason::Locked { .. },
                    ..
                }
        )
    }

    /// Stable machine-readable kind, for transport adapters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::RecipientNotFound(_) => "recipient_not_found",
            Self::SelfTransferNotAllowed => "self_transfer_not_allowed",
            Self::WalletNotFound(_) => "wallet_not_found",
            Self::AccountNotOperable { .. } => "account_not_operable",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::Rejected(_) => "rejected",
            Self::TransferFailed { .. } => "transfer_failed",
        }
    }
}

/// Account security service errors
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Phone number already registered: {0}")]
    PhoneAlreadyRegistered(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type alias for security operations
pub type SecurityResult<T> = Result<T, SecurityError>;

impl SecurityError {
    /// Map a storage `NotFound` for the account onto `AccountNotFound`
    pub(crate) fn from_lookup(account_id: &str, err: PersistenceError) -> Self {
        if err.is_not_found() {
            Self::AccountNotFound(account_id.to_string())
        } else {
            Self::Persistence(err)
        }
    }

    /// Illegal transition or account already closed
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_state_error())
    }
}

impl From<sqlx::Error> for SecurityError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mobiwallet_core::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_message() {
        let err = TransferError::InsufficientFunds {
            needed: Money::new(dec!(600), Currency::rwf()),
            available: Money::new(dec!(500), Currency::rwf()),
        };
        assert_eq!(err.to_string(), "Insufficient funds: need 600 RWF, available 500 RWF");
        assert!(err.is_validation());
        assert_eq!(err.kind(), "insufficient_funds");
    }

    #[test]
    fn test_classification() {
        let failed = TransferError::failed("TRF1", PersistenceError::Database(sqlx::Error::PoolTimedOut));
        assert!(!failed.is_validation());
        assert!(failed.is_retryable());

        assert!(!TransferError::SelfTransferNotAllowed.is_retryable());

        let until = Utc.with_ymd_and_hms(2026, 10, 19, 12, 30, 0).unwrap();
        let locked = TransferError::not_operable("acc-1", NotOperableReason::Locked { until });
        assert!(locked.is_retryable());
        assert!(locked.to_string().contains("locked until 2026-10-19 12:30:00 UTC"));

        let closed = TransferError::not_operable("acc-1", NotOperableReason::Closed);
        assert!(!closed.is_retryable());
    }

    #[test]
    fn test_security_lookup_mapping() {
        let err = SecurityError::from_lookup("acc-9", PersistenceError::not_found("Account", "acc-9"));
        assert!(matches!(err, SecurityError::AccountNotFound(ref id) if id == "acc-9"));

        let err = SecurityError::from(CoreError::AccountClosed("acc-9".to_string()));
        assert!(err.is_state_error());
    }
}
