//! # Transaction Module
//!
//! Ledger rows, drafts, transfer references and receipts.
//!
//! A transfer always materializes as exactly two rows sharing one
//! reference: a `debit` on the sender wallet and a `credit` on the
//! recipient wallet.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Direction of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(TransactionType::Debit),
            "credit" => Some(TransactionType::Credit),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `pending -> completed | failed`; both outcomes are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared id of the debit/credit pair; doubles as the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// `TRF` + UTC milliseconds + 8 hex chars of randomness
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("TRF{}{}", now.timestamp_millis(), &suffix[..8]))
    }

    /// Accept a caller-supplied idempotency key
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > 64 {
            return Err(CoreError::ValidationError(
                "reference must be 1-64 characters".to_string(),
            ));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::ValidationError(format!(
                "reference contains invalid characters: {}",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row waiting to be appended by the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub id: String,
    pub wallet_id: String,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub description: String,
    pub reference: Reference,
    /// Wallet on the other side of the transfer; `None` for opening credits
    pub counterparty_wallet_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionDraft {
    pub fn new(
        wallet_id: &str,
        tx_type: TransactionType,
        amount: Money,
        description: &str,
        reference: &Reference,
        counterparty_wallet_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount(format!(
                "transaction amount must be positive: {}",
                amount.amount
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            wallet_id: wallet_id.to_string(),
            tx_type,
            amount,
            description: description.to_string(),
            reference: reference.clone(),
            counterparty_wallet_id: counterparty_wallet_id.map(|w| w.to_string()),
            created_at: now,
        })
    }

    /// The debit and credit rows of one transfer
    pub fn transfer_pair(
        sender_wallet_id: &str,
        recipient_wallet_id: &str,
        amount: Money,
        description: &str,
        reference: &Reference,
        now: DateTime<Utc>,
    ) -> CoreResult<(Self, Self)> {
        if sender_wallet_id == recipient_wallet_id {
            return Err(CoreError::ValidationError(
                "sender and recipient wallet are the same".to_string(),
            ));
        }
        let debit = Self::new(
            sender_wallet_id,
            TransactionType::Debit,
            amount.clone(),
            description,
            reference,
            Some(recipient_wallet_id),
            now,
        )?;
        let credit = Self::new(
            recipient_wallet_id,
            TransactionType::Credit,
            amount,
            description,
            reference,
            Some(sender_wallet_id),
            now,
        )?;
        Ok((debit, credit))
    }

    /// Single credit funding a freshly registered wallet
    pub fn opening_credit(wallet_id: &str, amount: Money, reference: &Reference, now: DateTime<Utc>) -> CoreResult<Self> {
        Self::new(
            wallet_id,
            TransactionType::Credit,
            amount,
            "opening balance",
            reference,
            None,
            now,
        )
    }
}

/// One immutable ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub wallet_id: String,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub description: String,
    pub status: TransactionStatus,
    pub reference: Reference,
    pub counterparty_wallet_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<6} {:>16} {:<9} {} {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.tx_type,
            self.amount.to_string(),
            self.status,
            self.reference,
            self.description
        )
    }
}

/// How the sender addresses the recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Recipient {
    Phone(String),
    WalletId(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Phone(phone) => write!(f, "phone {}", phone),
            Recipient::WalletId(id) => write!(f, "wallet {}", id),
        }
    }
}

/// Outcome of a committed transfer, rebuilt from its ledger rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub reference: Reference,
    pub status: TransactionStatus,
    pub debit_transaction_id: String,
    pub credit_transaction_id: String,
    pub sender_wallet_id: String,
    pub recipient_wallet_id: String,
    pub amount: Money,
    pub description: String,
    pub committed_at: DateTime<Utc>,
}

impl TransferReceipt {
    /// Pair a debit and credit row into a receipt.
    pub fn from_pair(debit: &Transaction, credit: &Transaction) -> CoreResult<Self> {
        if debit.tx_type != TransactionType::Debit
            || credit.tx_type != TransactionType::Credit
            || debit.reference != credit.reference
            || debit.counterparty_wallet_id.as_deref() != Some(credit.wallet_id.as_str())
            || credit.counterparty_wallet_id.as_deref() != Some(debit.wallet_id.as_str())
        {
            return Err(CoreError::ValidationError(format!(
                "rows {} and {} are not one transfer",
                debit.id, credit.id
            )));
        }
        Ok(Self {
            reference: debit.reference.clone(),
            status: debit.status,
            debit_transaction_id: debit.id.clone(),
            credit_transaction_id: credit.id.clone(),
            sender_wallet_id: debit.wallet_id.clone(),
            recipient_wallet_id: credit.wallet_id.clone(),
            amount: debit.amount.clone(),
            description: debit.description.clone(),
            committed_at: debit.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn row(tx_type: TransactionType, wallet: &str, other: &str, reference: &Reference) -> Transaction {
        Transaction {
            id: format!("{}-{}", tx_type, wallet),
            wallet_id: wallet.to_string(),
            tx_type,
            amount: Money::new(dec!(500), Currency::rwf()),
            description: "rent".to_string(),
            status: TransactionStatus::Completed,
            reference: reference.clone(),
            counterparty_wallet_id: Some(other.to_string()),
            created_at: now(),
        }
    }

    #[test]
    fn test_generated_references_are_unique() {
        let a = Reference::generate(now());
        let b = Reference::generate(now());
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&format!("TRF{}", now().timestamp_millis())));
        assert_eq!(a.as_str().len(), 3 + 13 + 8);
    }

    #[test]
    fn test_reference_parse() {
        assert_eq!(Reference::parse(" pay-42_a ").unwrap().as_str(), "pay-42_a");
        assert!(Reference::parse("").is_err());
        assert!(Reference::parse("has space").is_err());
        assert!(Reference::parse(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_draft_requires_positive_amount() {
        let reference = Reference::generate(now());
        let zero = Money::zero(Currency::rwf());
        assert!(TransactionDraft::opening_credit("w", zero, &reference, now()).is_err());

        let draft = TransactionDraft::opening_credit(
            "w",
            Money::new(dec!(1), Currency::rwf()),
            &reference,
            now(),
        )
        .unwrap();
        assert_eq!(draft.tx_type, TransactionType::Credit);
        assert_eq!(draft.reference, reference);
        assert_eq!(draft.counterparty_wallet_id, None);
    }

    #[test]
    fn test_transfer_pair() {
        let reference = Reference::parse("ref-7").unwrap();
        let amount = Money::new(dec!(500), Currency::rwf());
        let (debit, credit) =
            TransactionDraft::transfer_pair("wal-a", "wal-b", amount.clone(), "rent", &reference, now())
                .unwrap();

        assert_eq!(debit.tx_type, TransactionType::Debit);
        assert_eq!(debit.wallet_id, "wal-a");
        assert_eq!(debit.counterparty_wallet_id.as_deref(), Some("wal-b"));
        assert_eq!(credit.tx_type, TransactionType::Credit);
        assert_eq!(credit.wallet_id, "wal-b");
        assert_eq!(credit.counterparty_wallet_id.as_deref(), Some("wal-a"));
        assert_eq!(debit.reference, credit.reference);
        assert_ne!(debit.id, credit.id);

        assert!(TransactionDraft::transfer_pair("wal-a", "wal-a", amount, "x", &reference, now()).is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_receipt_from_pair() {
        let reference = Reference::parse("ref-1").unwrap();
        let debit = row(TransactionType::Debit, "wal-a", "wal-b", &reference);
        let credit = row(TransactionType::Credit, "wal-b", "wal-a", &reference);

        let receipt = TransferReceipt::from_pair(&debit, &credit).unwrap();
        assert_eq!(receipt.sender_wallet_id, "wal-a");
        assert_eq!(receipt.recipient_wallet_id, "wal-b");
        assert_eq!(receipt.status, TransactionStatus::Completed);

        // Swapped rows are not a transfer
        assert!(TransferReceipt::from_pair(&credit, &debit).is_err());

        let other = row(TransactionType::Credit, "wal-b", "wal-a", &Reference::parse("ref-2").unwrap());
        assert!(TransferReceipt::from_pair(&debit, &other).is_err());

        // Credit that belongs to another sender's transfer
        let foreign = row(TransactionType::Credit, "wal-b", "wal-c", &reference);
        assert!(TransferReceipt::from_pair(&debit, &foreign).is_err());
    }
}
