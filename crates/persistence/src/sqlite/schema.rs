//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables.
//! Schema is defined in migrations/20261019000000_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, NaiveDate, Utc};
use mobiwallet_core::{
    Account, AccountStatus, ComplianceAction, ComplianceEntry, Currency, KycStatus, Money,
    Reference, RiskLevel, Transaction, TransactionStatus, TransactionType, Wallet,
};
use serde::{Deserialize, Serialize};

/// Row type for table `accounts`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: String,
    pub phone_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
    pub is_pep: bool,
    pub source_of_funds: Option<String>,
    pub kyc_status: String,
    pub identity_verified: bool,
    pub risk_level: String,
    pub status: String,
    pub failed_login_attempts: i64,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_device: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for table `compliance_history`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ComplianceRow {
    pub seq: i64,
    pub account_id: String,
    pub action: String,
    pub actor: String,
    pub reason: Option<String>,
    pub evidence: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Row type for table `wallets`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletRow {
    pub id: String,
    pub owner_account_id: String,
    pub currency: String,
    /// Balance in integer minor units
    pub balance_minor: i64,
    pub is_active: bool,
    pub kyc_level: i64,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `transactions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: String,
    pub wallet_id: String,
    pub tx_type: String,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub status: String,
    pub reference: String,
    pub counterparty_wallet_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// === Conversion implementations ===

impl AccountRow {
    /// Rebuild the domain account with its full compliance history
    pub fn into_account(self, history: Vec<ComplianceEntry>) -> PersistenceResult<Account> {
        let kyc_status = KycStatus::from_str(&self.kyc_status)
            .ok_or_else(|| PersistenceError::invalid_enum("kyc_status", &self.kyc_status))?;
        let risk_level = RiskLevel::from_str(&self.risk_level)
            .ok_or_else(|| PersistenceError::invalid_enum("risk_level", &self.risk_level))?;
        let status = AccountStatus::from_str(&self.status)
            .ok_or_else(|| PersistenceError::invalid_enum("status", &self.status))?;

        Ok(Account {
            id: self.id,
            phone_number: self.phone_number,
            full_name: self.full_name,
            email: self.email,
            date_of_birth: self.date_of_birth,
            is_pep: self.is_pep,
            source_of_funds: self.source_of_funds,
            kyc_status,
            identity_verified: self.identity_verified,
            risk_level,
            status,
            failed_login_attempts: u32::try_from(self.failed_login_attempts).unwrap_or(0),
            locked_until: self.locked_until,
            last_login_at: self.last_login_at,
            last_login_device: self.last_login_device,
            compliance_history: history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<ComplianceRow> for ComplianceEntry {
    type Error = PersistenceError;

    fn try_from(row: ComplianceRow) -> PersistenceResult<Self> {
        let action = ComplianceAction::from_str(&row.action)
            .ok_or_else(|| PersistenceError::invalid_enum("action", &row.action))?;
        Ok(ComplianceEntry {
            action,
            timestamp: row.recorded_at,
            actor: row.actor,
            reason: row.reason,
            evidence: row.evidence,
        })
    }
}

impl TryFrom<WalletRow> for Wallet {
    type Error = PersistenceError;

    fn try_from(row: WalletRow) -> PersistenceResult<Self> {
        let currency = Currency::from_code(&row.currency)?;
        let kyc_level = u8::try_from(row.kyc_level)
            .map_err(|_| PersistenceError::invalid_enum("kyc_level", &row.kyc_level.to_string()))?;
        Ok(Wallet {
            id: row.id,
            owner_account_id: row.owner_account_id,
            balance: Money::from_minor_units(row.balance_minor, currency),
            is_active: row.is_active,
            kyc_level,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> PersistenceResult<Self> {
        let tx_type = TransactionType::from_str(&row.tx_type)
            .ok_or_else(|| PersistenceError::invalid_enum("tx_type", &row.tx_type))?;
        let status = TransactionStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_enum("status", &row.status))?;
        let currency = Currency::from_code(&row.currency)?;
        Ok(Transaction {
            id: row.id,
            wallet_id: row.wallet_id,
            tx_type,
            amount: Money::from_minor_units(row.amount_minor, currency),
            description: row.description,
            status,
            reference: Reference::parse(&row.reference)?,
            counterparty_wallet_id: row.counterparty_wallet_id,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_wallet_row_conversion() {
        let row = WalletRow {
            id: "wal-1".to_string(),
            owner_account_id: "acc-1".to_string(),
            currency: "USD".to_string(),
            balance_minor: 1250,
            is_active: true,
            kyc_level: 2,
            created_at: ts(),
        };
        let wallet = Wallet::try_from(row).unwrap();
        assert_eq!(wallet.balance.amount, dec!(12.50));
        assert_eq!(wallet.kyc_level, 2);
    }

    #[test]
    fn test_transaction_row_rejects_unknown_status() {
        let row = TransactionRow {
            id: "tx-1".to_string(),
            wallet_id: "wal-1".to_string(),
            tx_type: "debit".to_string(),
            amount_minor: 500,
            currency: "RWF".to_string(),
            description: "rent".to_string(),
            status: "reversed".to_string(),
            reference: "ref-1".to_string(),
            counterparty_wallet_id: Some("wal-2".to_string()),
            created_at: ts(),
        };
        let err = Transaction::try_from(row).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidEnumValue { .. }));
    }

    #[test]
    fn test_compliance_row_conversion() {
        let row = ComplianceRow {
            seq: 1,
            account_id: "acc-1".to_string(),
            action: "kyc_rejected".to_string(),
            actor: "officer-7".to_string(),
            reason: Some("blurred document".to_string()),
            evidence: None,
            recorded_at: ts(),
        };
        let entry = ComplianceEntry::try_from(row).unwrap();
        assert_eq!(entry.action, ComplianceAction::KycRejected);
        assert_eq!(entry.reason.as_deref(), Some("blurred document"));
    }
}
