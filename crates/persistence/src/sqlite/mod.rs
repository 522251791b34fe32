//! SQLite persistence module
//!
//! Repository pattern for SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    run_migrations, AccountRepo, ComplianceRepo, TransactionRepo, WalletRepo,
};
pub use schema::{AccountRow, ComplianceRow, TransactionRow, WalletRow};
