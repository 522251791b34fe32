//! Mobiwallet Core - Domain types
//!
//! Pure domain model of the custodial wallet ledger, free of I/O:
//! - `Money` / `Currency`: fixed-point amounts, checked arithmetic
//! - `Account`: security and compliance state machine (lockout, KYC, status)
//! - `assess_risk`: advisory risk scoring
//! - `Wallet`: balance holder and limit checks
//! - `Transaction`, `TransactionDraft`, `Reference`, `TransferReceipt`: ledger rows

pub mod account;
pub mod compliance;
pub mod error;
pub mod money;
pub mod policy;
pub mod risk;
pub mod transaction;
pub mod wallet;

pub use account::{
    normalize_phone, Account, AccountChange, AccountStatus, KycEvidence, KycStatus, NewAccount,
    RiskLevel,
};
pub use compliance::{ComplianceAction, ComplianceEntry, SYSTEM_ACTOR};
pub use error::{CoreError, CoreResult};
pub use money::{Currency, Money};
pub use policy::{LimitSchedule, LimitTier, RiskPolicy, SecurityPolicy};
pub use risk::{assess_risk, RiskAssessment, RiskFactor};
pub use transaction::{
    Recipient, Reference, Transaction, TransactionDraft, TransactionStatus, TransactionType,
    TransferReceipt,
};
pub use wallet::{LimitKind, Wallet};
