//! Configuration loading, database initialization and status

use anyhow::{Context, Result};
use mobiwallet_business::{ServiceContext, WalletConfig};
use mobiwallet_core::TransactionStatus;
use mobiwallet_persistence::{AccountRepo, StorageConfig, TransactionRepo, WalletRepo};
use std::path::Path;

/// Config file (or defaults) with an optional database path override
pub fn load_config(config_path: Option<&Path>, db_path: Option<&Path>) -> Result<WalletConfig> {
    let mut config = match config_path {
        Some(path) => WalletConfig::from_file(path)?,
        None => WalletConfig::default(),
    };

    if let Some(db_path) = db_path {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        config.storage.database_url = StorageConfig::for_path(db_path).database_url;
    }
    Ok(config)
}

/// Open the configured database
pub async fn connect(config: WalletConfig) -> Result<ServiceContext> {
    let url = config.storage.database_url.clone();
    ServiceContext::open(config)
        .await
        .with_context(|| format!("Failed to open database {}", url))
}

/// Create the database and bring the schema up to date
pub async fn init_database(config: WalletConfig, force: bool) -> Result<()> {
    let url = config.storage.database_url.clone();
    if force {
        if let Some(path) = url.strip_prefix("sqlite:").map(|p| p.split('?').next().unwrap_or(p)) {
            let path = Path::new(path);
            if path.exists() {
                std::fs::remove_file(path).context("Failed to remove existing database")?;
                println!("🗑️  Removed existing database");
            }
        }
    }

    let ctx = connect(config).await?;
    ctx.database().close().await;
    println!("✅ Database initialized at {}", url);
    Ok(())
}

/// Row counts plus a balance reconciliation
pub async fn show_status(ctx: &ServiceContext) -> Result<()> {
    let pool = ctx.pool();
    let accounts = AccountRepo::count(pool).await?;
    let wallets = WalletRepo::list_all(pool).await?.len();

    println!("📊 Database Status");
    println!("   Database:     {}", ctx.config().storage.database_url);
    println!("   Currency:     {}", ctx.config().default_currency);
    println!();
    println!("   Accounts:     {}", accounts);
    println!("   Wallets:      {}", wallets);
    for status in [
        TransactionStatus::Completed,
        TransactionStatus::Pending,
        TransactionStatus::Failed,
    ] {
        let count = TransactionRepo::count_by_status(pool, status).await?;
        println!("   Tx {:<10} {}", format!("{}:", status), count);
    }

    let health = ctx.health().status();
    println!(
        "   Storage:      {} ({} consecutive failures)",
        if health.degraded { "degraded" } else { "healthy" },
        health.consecutive_failures
    );

    let report = ctx
        .ledger()
        .reconcile()
        .await
        .context("Failed to reconcile balances")?;
    println!();
    if report.is_consistent() {
        println!("✅ {} wallet balances match the ledger", report.wallets_checked);
    } else {
        println!("❌ {} wallet balances disagree with the ledger", report.mismatches.len());
        for mismatch in &report.mismatches {
            println!(
                "   {}: stored {}, ledger {}",
                mismatch.wallet_id, mismatch.stored, mismatch.derived
            );
        }
    }
    Ok(())
}
