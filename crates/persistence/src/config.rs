//! Storage configuration
//!
//! Connection settings for the primary database and an optional read replica.

use crate::error::{PersistenceError, PersistenceResult};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Where and how the ledger is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Primary database URL (e.g. "sqlite:mobiwallet.db")
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Read replica for balance/history reads. Staleness is whatever the
    /// replication lag is; transfers never read from it.
    #[serde(default)]
    pub replica_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for SQLite's write lock before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_url() -> String {
    "sqlite:mobiwallet.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            replica_url: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StorageConfig {
    /// Config for a database file on disk
    pub fn for_path(path: &std::path::Path) -> Self {
        Self {
            database_url: format!("sqlite:{}", path.display()),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    fn connect_options(&self, url: &str) -> PersistenceResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(url).map_err(|e| {
            PersistenceError::Configuration(format!("invalid database url {}: {}", url, e))
        })?;
        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(self.busy_timeout())
            .foreign_keys(true))
    }

    /// Open the primary pool, creating the file if missing
    pub async fn connect_primary(&self) -> PersistenceResult<SqlitePool> {
        let options = self
            .connect_options(&self.database_url)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    /// Open the read replica, if one is configured
    pub async fn connect_replica(&self) -> PersistenceResult<Option<SqlitePool>> {
        let Some(url) = &self.replica_url else {
            return Ok(None);
        };
        let options = self.connect_options(url)?.read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?;
        Ok(Some(pool))
    }
}
