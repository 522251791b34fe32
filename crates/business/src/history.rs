//! Read-only history feed
//!
//! Completed transaction history for the analytics collaborator. Reads go to
//! the replica when one is configured and never write.

use crate::services::ServiceContext;
use chrono::{DateTime, Utc};
use mobiwallet_core::{Money, Transaction, TransactionType};
use mobiwallet_persistence::{PersistenceResult, TransactionRepo, WalletRepo};
use serde::Serialize;

/// Completed activity of one wallet since a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub wallet_id: String,
    pub since: DateTime<Utc>,
    pub debits: Money,
    pub credits: Money,
    /// Completed rows in the window, both directions
    pub count: i64,
}

impl ActivitySummary {
    /// Credits minus debits; negative when the wallet spent more than it received
    pub fn net(&self) -> Money {
        Money::new(self.credits.amount - self.debits.amount, self.credits.currency.clone())
    }
}

pub struct HistoryFeed<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> HistoryFeed<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Completed rows, newest first
    pub async fn recent(&self, wallet_id: &str, limit: i64) -> PersistenceResult<Vec<Transaction>> {
        TransactionRepo::list_by_wallet(self.ctx.ledger().read_pool(), wallet_id, limit.max(0), true)
            .await
    }

    pub async fn summary(&self, wallet_id: &str, since: DateTime<Utc>) -> PersistenceResult<ActivitySummary> {
        let pool = self.ctx.ledger().read_pool();
        let currency = WalletRepo::get_by_id(pool, wallet_id).await?.currency().clone();

        let debits = TransactionRepo::sum_completed(pool, wallet_id, TransactionType::Debit, since).await?;
        let credits = TransactionRepo::sum_completed(pool, wallet_id, TransactionType::Credit, since).await?;
        let count = TransactionRepo::count_completed(pool, wallet_id, since).await?;

        tracing::debug!(wallet_id = %wallet_id, since = %since, count, "Activity summary");

        Ok(ActivitySummary {
            wallet_id: wallet_id.to_string(),
            since,
            debits: Money::from_minor_units(debits, currency.clone()),
            credits: Money::from_minor_units(credits, currency),
            count,
        })
    }
}
