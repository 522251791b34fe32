//! # Persistence Errors
//!
//! Error types for the storage layer, wrapping sqlx errors and the ledger's
//! commit-time rejections.

use chrono::{DateTime, Utc};
use mobiwallet_core::{AccountStatus, CoreError, LimitKind};
use rust_decimal::Decimal;
use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    // === Ledger commit rejections ===
    #[error("Reference {reference} already recorded for wallet {wallet_id}")]
    DuplicateReference { wallet_id: String, reference: String },

    #[error("Insufficient funds in wallet {wallet_id}: need {needed}, available {available}")]
    InsufficientFunds {
        wallet_id: String,
        needed: Decimal,
        available: Decimal,
    },

    #[error("Wallet is inactive: {0}")]
    WalletInactive(String),

    #[error("Account {account_id} cannot transact while {status}")]
    AccountNotOperable {
        account_id: String,
        status: AccountStatus,
        locked_until: Option<DateTime<Utc>>,
    },

    #[error("{limit} limit exceeded for wallet {wallet_id}: limit {limit_amount}, attempted {attempted}")]
    LimitExceeded {
        wallet_id: String,
        limit: LimitKind,
        limit_amount: Decimal,
        attempted: Decimal,
    },

    #[error("Invalid transaction pair: {0}")]
    InvalidPair(String),

    // === Conversion errors ===
    #[error("Invalid enum value: {field} = {value}")]
    InvalidEnumValue { field: String, value: String },

    #[error("Domain error: {0}")]
    Core(#[from] CoreError),

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &str, id: &str) -> Self {
        Self::AlreadyExists {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_enum(field: &str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Migration(_))
    }

    /// Rejections decided by ledger rules rather than storage faults.
    /// Nothing was written when one of these is returned.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::DuplicateReference { .. }
                | Self::InsufficientFunds { .. }
                | Self::WalletInactive(_)
                | Self::AccountNotOperable { .. }
                | Self::LimitExceeded { .. }
                | Self::InvalidPair(_)
                | Self::NotFound { .. }
        )
    }
}

/// True when a sqlx error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_classification() {
        let err = PersistenceError::not_found("Wallet", "wal-9");
        assert!(err.is_not_found());
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "Record not found: Wallet with id wal-9");

        let err = PersistenceError::InsufficientFunds {
            wallet_id: "wal-1".to_string(),
            needed: dec!(60),
            available: dec!(40),
        };
        assert!(err.is_rejection());
        assert!(!err.is_database_error());

        let err = PersistenceError::AccountNotOperable {
            account_id: "acc-1".to_string(),
            status: AccountStatus::Suspended,
            locked_until: None,
        };
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "Account acc-1 cannot transact while suspended");

        let err = PersistenceError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_database_error());
        assert!(!err.is_rejection());
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
