//! Repository implementations for SQLite
//!
//! Queries take any sqlx executor so the same call works against the pool
//! or inside an open storage transaction.

use crate::error::{is_unique_violation, PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use mobiwallet_core::{
    Account, ComplianceEntry, Transaction, TransactionDraft, TransactionStatus, TransactionType,
    Wallet,
};
use sqlx::{Acquire, Sqlite, SqliteExecutor, SqlitePool};

// ============================================================================
// Account Repository
// ============================================================================

/// Repository for table `accounts`
pub struct AccountRepo;

impl AccountRepo {
    /// Insert a freshly opened account (history goes through [`ComplianceRepo`])
    pub async fn insert<'e, E>(executor: E, account: &Account) -> PersistenceResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                id, phone_number, full_name, email, date_of_birth, is_pep, source_of_funds,
                kyc_status, identity_verified, risk_level, status, failed_login_attempts,
                locked_until, last_login_at, last_login_device, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.phone_number)
        .bind(&account.full_name)
        .bind(&account.email)
        .bind(account.date_of_birth)
        .bind(account.is_pep)
        .bind(&account.source_of_funds)
        .bind(account.kyc_status.as_str())
        .bind(account.identity_verified)
        .bind(account.risk_level.as_str())
        .bind(account.status.as_str())
        .bind(i64::from(account.failed_login_attempts))
        .bind(account.locked_until)
        .bind(account.last_login_at)
        .bind(&account.last_login_device)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(executor)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(PersistenceError::already_exists("Account", &account.phone_number))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the mutable state of an account
    pub async fn update<'e, E>(executor: E, account: &Account) -> PersistenceResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                kyc_status = ?, identity_verified = ?, risk_level = ?, status = ?,
                failed_login_attempts = ?, locked_until = ?, last_login_at = ?,
                last_login_device = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(account.kyc_status.as_str())
        .bind(account.identity_verified)
        .bind(account.risk_level.as_str())
        .bind(account.status.as_str())
        .bind(i64::from(account.failed_login_attempts))
        .bind(account.locked_until)
        .bind(account.last_login_at)
        .bind(&account.last_login_device)
        .bind(account.updated_at)
        .bind(&account.id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Account", &account.id));
        }
        Ok(())
    }

    /// Take the write lock on the account row before reading it.
    ///
    /// Issued as the first statement of a storage transaction so the
    /// read-modify-write that follows cannot interleave with another writer.
    pub async fn lock_for_update<'e, E>(executor: E, id: &str) -> PersistenceResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE accounts SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Account", id));
        }
        Ok(())
    }

    pub async fn get_row<'e, E>(executor: E, id: &str) -> PersistenceResult<AccountRow>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Account", id))
    }

    /// Account id owning a normalized phone number
    pub async fn find_id_by_phone<'e, E>(executor: E, phone: &str) -> PersistenceResult<Option<String>>
    where
        E: SqliteExecutor<'e>,
    {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM accounts WHERE phone_number = ?")
            .bind(phone)
            .fetch_optional(executor)
            .await?;
        Ok(id)
    }

    /// Load an account together with its compliance history
    pub async fn load<'a, A>(conn: A, id: &str) -> PersistenceResult<Account>
    where
        A: Acquire<'a, Database = Sqlite>,
    {
        let mut conn = conn.acquire().await?;
        let row = Self::get_row(&mut *conn, id).await?;
        let history = ComplianceRepo::list(&mut *conn, id).await?;
        row.into_account(history)
    }

    pub async fn count(pool: &SqlitePool) -> PersistenceResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

// ============================================================================
// Compliance History Repository
// ============================================================================

/// Repository for table `compliance_history` (append-only)
pub struct ComplianceRepo;

impl ComplianceRepo {
    pub async fn append<'e, E>(executor: E, account_id: &str, entry: &ComplianceEntry) -> PersistenceResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO compliance_history (account_id, action, actor, reason, evidence, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(entry.action.as_str())
        .bind(&entry.actor)
        .bind(&entry.reason)
        .bind(&entry.evidence)
        .bind(entry.timestamp)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Append a transition's delta in order
    pub async fn append_all<'a, A>(conn: A, account_id: &str, entries: &[ComplianceEntry]) -> PersistenceResult<()>
    where
        A: Acquire<'a, Database = Sqlite>,
    {
        let mut conn = conn.acquire().await?;
        for entry in entries {
            Self::append(&mut *conn, account_id, entry).await?;
        }
        Ok(())
    }

    /// Full history, oldest first
    pub async fn list<'e, E>(executor: E, account_id: &str) -> PersistenceResult<Vec<ComplianceEntry>>
    where
        E: SqliteExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, ComplianceRow>(
            "SELECT * FROM compliance_history WHERE account_id = ? ORDER BY seq ASC",
        )
        .bind(account_id)
        .fetch_all(executor)
        .await?;
        rows.into_iter().map(ComplianceEntry::try_from).collect()
    }
}

// ============================================================================
// Wallet Repository
// ============================================================================

/// Repository for table `wallets`.
///
/// Balance columns are written only by the ledger store.
pub struct WalletRepo;

impl WalletRepo {
    /// Insert a new wallet with a zero balance
    pub async fn insert<'e, E>(executor: E, wallet: &Wallet) -> PersistenceResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO wallets (id, owner_account_id, currency, balance_minor, is_active, kyc_level, created_at)
            VALUES (?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&wallet.id)
        .bind(&wallet.owner_account_id)
        .bind(&wallet.currency().code)
        .bind(wallet.is_active)
        .bind(i64::from(wallet.kyc_level))
        .bind(wallet.created_at)
        .execute(executor)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(PersistenceError::already_exists("Wallet", &wallet.owner_account_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<Option<Wallet>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        row.map(Wallet::try_from).transpose()
    }

    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<Wallet>
    where
        E: SqliteExecutor<'e>,
    {
        Self::find_by_id(executor, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Wallet", id))
    }

    pub async fn get_by_owner<'e, E>(executor: E, account_id: &str) -> PersistenceResult<Wallet>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE owner_account_id = ?")
            .bind(account_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Wallet for account", account_id))?;
        Wallet::try_from(row)
    }

    /// Wallet of the account registered under a normalized phone number
    pub async fn find_by_phone<'e, E>(executor: E, phone: &str) -> PersistenceResult<Option<Wallet>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, WalletRow>(
            r#"
            SELECT w.* FROM wallets w
            JOIN accounts a ON a.id = w.owner_account_id
            WHERE a.phone_number = ?
            "#,
        )
        .bind(phone)
        .fetch_optional(executor)
        .await?;
        row.map(Wallet::try_from).transpose()
    }

    pub async fn set_kyc_level<'e, E>(executor: E, id: &str, kyc_level: u8) -> PersistenceResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE wallets SET kyc_level = ? WHERE id = ?")
            .bind(i64::from(kyc_level))
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Wallet", id));
        }
        Ok(())
    }

    pub async fn deactivate<'e, E>(executor: E, id: &str) -> PersistenceResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE wallets SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Wallet", id));
        }
        Ok(())
    }

    pub async fn list_all(pool: &SqlitePool) -> PersistenceResult<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets ORDER BY created_at")
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(Wallet::try_from).collect()
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Repository for table `transactions`.
///
/// Rows are inserted and moved out of `pending` only by the ledger store.
pub struct TransactionRepo;

impl TransactionRepo {
    /// Insert a draft with the given status. Unique violations surface as
    /// `sqlx::Error` so the ledger can map them to a duplicate reference.
    pub(crate) async fn insert<'e, E>(
        executor: E,
        draft: &TransactionDraft,
        amount_minor: i64,
        status: TransactionStatus,
    ) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, wallet_id, tx_type, amount_minor, currency, description,
                status, reference, counterparty_wallet_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.id)
        .bind(&draft.wallet_id)
        .bind(draft.tx_type.as_str())
        .bind(amount_minor)
        .bind(&draft.amount.currency.code)
        .bind(&draft.description)
        .bind(status.as_str())
        .bind(draft.reference.as_str())
        .bind(&draft.counterparty_wallet_id)
        .bind(draft.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// `pending -> completed`; returns how many rows moved
    pub(crate) async fn mark_completed<'e, E>(executor: E, id: &str) -> PersistenceResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE transactions SET status = 'completed' WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<Transaction>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Transaction", id))?;
        Transaction::try_from(row)
    }

    /// The live (non-failed) row for a wallet, reference and direction
    pub async fn find_live<'e, E>(
        executor: E,
        wallet_id: &str,
        reference: &str,
        tx_type: TransactionType,
    ) -> PersistenceResult<Option<Transaction>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE wallet_id = ? AND reference = ? AND tx_type = ? AND status <> 'failed'
            "#,
        )
        .bind(wallet_id)
        .bind(reference)
        .bind(tx_type.as_str())
        .fetch_optional(executor)
        .await?;
        row.map(Transaction::try_from).transpose()
    }

    /// Rows of a wallet, newest first
    pub async fn list_by_wallet<'e, E>(
        executor: E,
        wallet_id: &str,
        limit: i64,
        completed_only: bool,
    ) -> PersistenceResult<Vec<Transaction>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = if completed_only {
            r#"
            SELECT * FROM transactions
            WHERE wallet_id = ? AND status = 'completed'
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#
        } else {
            r#"
            SELECT * FROM transactions
            WHERE wallet_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#
        };
        let rows = sqlx::query_as::<_, TransactionRow>(sql)
            .bind(wallet_id)
            .bind(limit)
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// Sum of completed rows of one direction since `since`, in minor units
    pub async fn sum_completed<'e, E>(
        executor: E,
        wallet_id: &str,
        tx_type: TransactionType,
        since: DateTime<Utc>,
    ) -> PersistenceResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let sum = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount_minor), 0) FROM transactions
            WHERE wallet_id = ? AND tx_type = ? AND status = 'completed' AND created_at >= ?
            "#,
        )
        .bind(wallet_id)
        .bind(tx_type.as_str())
        .bind(since)
        .fetch_one(executor)
        .await?;
        Ok(sum)
    }

    /// Number of completed rows since `since`
    pub async fn count_completed<'e, E>(executor: E, wallet_id: &str, since: DateTime<Utc>) -> PersistenceResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE wallet_id = ? AND status = 'completed' AND created_at >= ?
            "#,
        )
        .bind(wallet_id)
        .bind(since)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Net completed movement of a wallet over its whole life, in minor units
    pub async fn net_completed<'e, E>(executor: E, wallet_id: &str) -> PersistenceResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let net = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(CASE tx_type WHEN 'credit' THEN amount_minor ELSE -amount_minor END), 0)
            FROM transactions
            WHERE wallet_id = ? AND status = 'completed'
            "#,
        )
        .bind(wallet_id)
        .fetch_one(executor)
        .await?;
        Ok(net)
    }

    pub async fn count_by_status(pool: &SqlitePool, status: TransactionStatus) -> PersistenceResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Run migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
