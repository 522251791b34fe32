//! Service context
//!
//! Shared state every service borrows: database, configuration, clock and
//! the storage health monitor.

use crate::clock::{Clock, SystemClock};
use crate::config::WalletConfig;
use crate::health::HealthMonitor;
use chrono::{DateTime, Utc};
use mobiwallet_persistence::{Database, LedgerStore, PersistenceResult};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Context for business operations
#[derive(Debug)]
pub struct ServiceContext {
    db: Database,
    config: WalletConfig,
    clock: Arc<dyn Clock>,
    health: HealthMonitor,
}

impl ServiceContext {
    /// Create new service context from database
    pub fn new(db: Database, config: WalletConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, config: WalletConfig, clock: Arc<dyn Clock>) -> Self {
        let health = HealthMonitor::new(config.degraded_after_failures);
        Self {
            db,
            config,
            clock,
            health,
        }
    }

    /// Open the configured database and build a context over it
    pub async fn open(config: WalletConfig) -> PersistenceResult<Self> {
        let db = Database::open(&config.storage).await?;
        Ok(Self::new(db, config))
    }

    /// Get database pool
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn ledger(&self) -> &LedgerStore {
        self.db.ledger()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
