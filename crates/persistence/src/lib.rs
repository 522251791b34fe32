//! # Mobiwallet Persistence
//!
//! SQLite storage for the wallet ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Database                             │
//! │  ┌──────────────┐   ┌────────────────┐   ┌────────────────┐  │
//! │  │   Primary    │   │  LedgerStore   │   │     Repos      │  │
//! │  │  (writes +   │◀──│ (sole writer   │   │ (accounts,     │  │
//! │  │   transfers) │   │  of balances)  │   │  compliance)   │  │
//! │  └──────────────┘   └────────────────┘   └────────────────┘  │
//! │  ┌──────────────┐                                            │
//! │  │ Read replica │  history reads only, optional              │
//! │  └──────────────┘                                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mobiwallet_persistence::{Database, StorageConfig, WalletRepo};
//!
//! let db = Database::open(&StorageConfig::default()).await?;
//! let wallet = WalletRepo::get_by_id(db.pool(), "wal-1").await?;
//! let balance = db.ledger().current_balance(&wallet.id).await?;
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod sqlite;

pub use config::StorageConfig;
pub use error::{PersistenceError, PersistenceResult};
pub use ledger::{
    day_start, month_start, BalanceMismatch, CommittedPair, DebitGuard, LedgerStore,
    ReconcileReport,
};
pub use sqlite::schema::{AccountRow, ComplianceRow, TransactionRow, WalletRow};
pub use sqlite::{run_migrations, AccountRepo, ComplianceRepo, TransactionRepo, WalletRepo};

use sqlx::SqlitePool;

/// Database facade - primary pool, optional replica and the ledger store
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    ledger: LedgerStore,
}

impl Database {
    /// Connect and bring the schema up to date
    pub async fn open(config: &StorageConfig) -> PersistenceResult<Self> {
        let pool = config.connect_primary().await?;
        run_migrations(&pool).await?;
        let replica = config.connect_replica().await?;

        tracing::debug!(
            database_url = %config.database_url,
            replica = config.replica_url.is_some(),
            "Database opened"
        );

        Ok(Self {
            ledger: LedgerStore::new(pool.clone(), replica),
            pool,
        })
    }

    /// Primary SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub async fn close(&self) {
        self.pool.close().await;
        self.ledger.read_pool().close().await;
    }
}
