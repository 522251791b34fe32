//! # Ledger Store
//!
//! The only writer of wallet balances and transaction rows.
//!
//! ## Atomic pair commit
//!
//! ```text
//! BEGIN
//!   [live debit with this reference? -> DuplicateReference]
//!   UPDATE wallets SET balance -= amount WHERE id = sender AND balance >= amount   (takes write lock)
//!   [re-check sender account status and lock]
//!   [re-check cumulative limits against completed debits]
//!   UPDATE wallets SET balance += amount WHERE id = recipient
//!   INSERT debit  (pending)
//!   INSERT credit (pending)
//!   UPDATE both -> completed
//! COMMIT
//! ```
//!
//! Any error drops the storage transaction, which rolls back every step.

use crate::error::{is_unique_violation, PersistenceError, PersistenceResult};
use crate::sqlite::{AccountRepo, TransactionRepo, WalletRepo};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use mobiwallet_core::{
    CoreError, LimitKind, LimitSchedule, Money, Reference, Transaction, TransactionDraft,
    TransactionStatus, TransactionType, TransferReceipt, Wallet,
};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Limit enforcement applied to the debit side inside the atomic unit
#[derive(Debug, Clone, Copy)]
pub enum DebitGuard<'a> {
    /// Balance check only
    Unchecked,
    /// Balance check plus single, daily and monthly limits for the
    /// sender wallet's current KYC level
    Limits(&'a LimitSchedule),
}

/// Both rows of a committed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedPair {
    pub debit: Transaction,
    pub credit: Transaction,
}

impl CommittedPair {
    pub fn receipt(&self) -> PersistenceResult<TransferReceipt> {
        Ok(TransferReceipt::from_pair(&self.debit, &self.credit)?)
    }
}

/// Stored balance that disagrees with the completed rows
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceMismatch {
    pub wallet_id: String,
    pub stored: Money,
    pub derived: Money,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub wallets_checked: usize,
    pub mismatches: Vec<BalanceMismatch>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Start of the UTC day containing `at`
pub fn day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Start of the UTC month containing `at`
pub fn month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let first = at.date_naive() - Duration::days(i64::from(at.day0()));
    first.and_time(NaiveTime::MIN).and_utc()
}

/// Durable store of transaction rows and the balances they produce
#[derive(Debug, Clone)]
pub struct LedgerStore {
    primary: SqlitePool,
    replica: Option<SqlitePool>,
    /// Queues in-process writers ahead of SQLite's own write lock
    write_gate: Arc<Mutex<()>>,
}

impl LedgerStore {
    pub fn new(primary: SqlitePool, replica: Option<SqlitePool>) -> Self {
        Self {
            primary,
            replica,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Authoritative pool
    pub fn pool(&self) -> &SqlitePool {
        &self.primary
    }

    /// Pool for history reads; the replica when one is configured
    pub fn read_pool(&self) -> &SqlitePool {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    // === Writes ===

    /// Atomically persist a debit/credit pair and apply both balance deltas.
    ///
    /// Rejections (`InsufficientFunds`, `WalletInactive`, `AccountNotOperable`,
    /// `LimitExceeded`, `DuplicateReference`, `NotFound`) leave no trace. Any
    /// other error means the storage transaction was rolled back.
    ///
    /// A sender reference that already committed is reported as
    /// `DuplicateReference` before funds or limits are looked at.
    pub async fn append_pair(
        &self,
        debit: &TransactionDraft,
        credit: &TransactionDraft,
        guard: DebitGuard<'_>,
    ) -> PersistenceResult<CommittedPair> {
        validate_pair(debit, credit)?;
        let amount_minor = debit.amount.to_minor_units()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.primary.begin().await?;

        if TransactionRepo::find_live(
            &mut *tx,
            &debit.wallet_id,
            debit.reference.as_str(),
            TransactionType::Debit,
        )
        .await?
        .is_some()
        {
            return Err(PersistenceError::DuplicateReference {
                wallet_id: debit.wallet_id.clone(),
                reference: debit.reference.to_string(),
            });
        }

        let debited = sqlx::query(
            r#"
            UPDATE wallets SET balance_minor = balance_minor - ?
            WHERE id = ? AND currency = ? AND is_active = 1 AND balance_minor >= ?
            "#,
        )
        .bind(amount_minor)
        .bind(&debit.wallet_id)
        .bind(&debit.amount.currency.code)
        .bind(amount_minor)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            return Err(rejected_debit(&mut *tx, debit).await);
        }

        let sender = WalletRepo::get_by_id(&mut *tx, &debit.wallet_id).await?;
        ensure_sender_operable(&mut *tx, &sender.owner_account_id, debit.created_at).await?;
        if let DebitGuard::Limits(limits) = guard {
            enforce_limits(&mut *tx, &sender, debit, limits).await?;
        }

        credit_wallet(&mut *tx, credit, amount_minor).await?;

        for draft in [debit, credit] {
            insert_pending(&mut *tx, draft, amount_minor).await?;
        }
        for draft in [debit, credit] {
            if TransactionRepo::mark_completed(&mut *tx, &draft.id).await? != 1 {
                return Err(PersistenceError::InvalidPair(format!(
                    "row {} did not leave pending",
                    draft.id
                )));
            }
        }

        tx.commit().await?;

        tracing::debug!(
            reference = %debit.reference,
            debit_wallet = %debit.wallet_id,
            credit_wallet = %credit.wallet_id,
            amount = %debit.amount,
            "Transfer pair committed"
        );

        Ok(CommittedPair {
            debit: completed(debit),
            credit: completed(credit),
        })
    }

    /// Record a single completed credit funding a new wallet
    pub async fn append_opening_credit(&self, credit: &TransactionDraft) -> PersistenceResult<Transaction> {
        if credit.tx_type != TransactionType::Credit || credit.counterparty_wallet_id.is_some() {
            return Err(PersistenceError::InvalidPair(format!(
                "{} is not an opening credit",
                credit.id
            )));
        }
        let amount_minor = credit.amount.to_minor_units()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.primary.begin().await?;

        credit_wallet(&mut *tx, credit, amount_minor).await?;
        insert_pending(&mut *tx, credit, amount_minor).await?;
        TransactionRepo::mark_completed(&mut *tx, &credit.id).await?;

        tx.commit().await?;
        Ok(completed(credit))
    }

    /// Keep an audit trail of a pair whose commit failed.
    ///
    /// Rows are written `failed` with no balance effect; failed rows are
    /// outside the reference uniqueness index so a retry can still commit.
    pub async fn record_failed_pair(
        &self,
        debit: &TransactionDraft,
        credit: &TransactionDraft,
    ) -> PersistenceResult<()> {
        let amount_minor = debit.amount.to_minor_units()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.primary.begin().await?;
        for draft in [debit, credit] {
            TransactionRepo::insert(&mut *tx, draft, amount_minor, TransactionStatus::Failed).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // === Authoritative reads ===

    /// Sum of completed rows of one direction since `since`
    pub async fn sum_completed(
        &self,
        wallet_id: &str,
        tx_type: TransactionType,
        since: DateTime<Utc>,
    ) -> PersistenceResult<Money> {
        let mut conn = self.primary.acquire().await?;
        let wallet = WalletRepo::get_by_id(&mut *conn, wallet_id).await?;
        let minor = TransactionRepo::sum_completed(&mut *conn, wallet_id, tx_type, since).await?;
        Ok(Money::from_minor_units(minor, wallet.currency().clone()))
    }

    /// Balance as stored by the last committed write
    pub async fn current_balance(&self, wallet_id: &str) -> PersistenceResult<Money> {
        Ok(WalletRepo::get_by_id(&self.primary, wallet_id).await?.balance)
    }

    /// Receipt of the committed transfer `reference` sent from `sender_wallet_id`
    pub async fn find_transfer(
        &self,
        sender_wallet_id: &str,
        reference: &Reference,
    ) -> PersistenceResult<Option<TransferReceipt>> {
        let mut conn = self.primary.acquire().await?;
        let Some(debit) = TransactionRepo::find_live(
            &mut *conn,
            sender_wallet_id,
            reference.as_str(),
            TransactionType::Debit,
        )
        .await?
        else {
            return Ok(None);
        };

        let recipient = debit.counterparty_wallet_id.clone().ok_or_else(|| {
            PersistenceError::InvalidPair(format!("debit {} has no counterparty", debit.id))
        })?;
        let credit = TransactionRepo::find_live(
            &mut *conn,
            &recipient,
            reference.as_str(),
            TransactionType::Credit,
        )
        .await?
        .ok_or_else(|| {
            PersistenceError::InvalidPair(format!("debit {} has no matching credit", debit.id))
        })?;

        Ok(Some(TransferReceipt::from_pair(&debit, &credit)?))
    }

    // === History reads (replica when configured) ===

    /// Rows of a wallet, newest first, any status
    pub async fn history(&self, wallet_id: &str, limit: i64) -> PersistenceResult<Vec<Transaction>> {
        TransactionRepo::list_by_wallet(self.read_pool(), wallet_id, limit, false).await
    }

    /// Check every stored balance against its completed rows
    pub async fn reconcile(&self) -> PersistenceResult<ReconcileReport> {
        let wallets = WalletRepo::list_all(&self.primary).await?;
        let mut report = ReconcileReport {
            wallets_checked: wallets.len(),
            mismatches: Vec::new(),
        };
        for wallet in wallets {
            let net = TransactionRepo::net_completed(&self.primary, &wallet.id).await?;
            let derived = Money::from_minor_units(net, wallet.currency().clone());
            if derived != wallet.balance {
                tracing::warn!(
                    wallet_id = %wallet.id,
                    stored = %wallet.balance,
                    derived = %derived,
                    "Balance does not match ledger rows"
                );
                report.mismatches.push(BalanceMismatch {
                    wallet_id: wallet.id.clone(),
                    stored: wallet.balance.clone(),
                    derived,
                });
            }
        }
        Ok(report)
    }
}

// === Commit steps ===

fn validate_pair(debit: &TransactionDraft, credit: &TransactionDraft) -> PersistenceResult<()> {
    let problem = if debit.tx_type != TransactionType::Debit || credit.tx_type != TransactionType::Credit {
        Some("expected one debit and one credit")
    } else if debit.reference != credit.reference {
        Some("rows carry different references")
    } else if debit.amount != credit.amount {
        Some("debit and credit amounts differ")
    } else if debit.wallet_id == credit.wallet_id {
        Some("debit and credit target the same wallet")
    } else if debit.counterparty_wallet_id.as_deref() != Some(credit.wallet_id.as_str())
        || credit.counterparty_wallet_id.as_deref() != Some(debit.wallet_id.as_str())
    {
        Some("counterparty wallets do not point at each other")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(PersistenceError::InvalidPair(format!(
            "{} ({})",
            problem, debit.reference
        ))),
        None => Ok(()),
    }
}

/// Explain why the conditional debit touched no row
async fn rejected_debit(conn: &mut SqliteConnection, draft: &TransactionDraft) -> PersistenceError {
    match WalletRepo::find_by_id(&mut *conn, &draft.wallet_id).await {
        Err(e) => e,
        Ok(None) => PersistenceError::not_found("Wallet", &draft.wallet_id),
        Ok(Some(wallet)) if !wallet.is_active => PersistenceError::WalletInactive(wallet.id),
        Ok(Some(wallet)) if wallet.currency().code != draft.amount.currency.code => {
            PersistenceError::Core(CoreError::CurrencyMismatch {
                expected: wallet.currency().code.clone(),
                actual: draft.amount.currency.code.clone(),
            })
        }
        Ok(Some(wallet)) => PersistenceError::InsufficientFunds {
            wallet_id: wallet.id,
            needed: draft.amount.amount,
            available: wallet.balance.amount,
        },
    }
}

/// Status and lockout as committed by the time the debit took the write lock
async fn ensure_sender_operable(
    conn: &mut SqliteConnection,
    account_id: &str,
    at: DateTime<Utc>,
) -> PersistenceResult<()> {
    let account = AccountRepo::get_row(&mut *conn, account_id)
        .await?
        .into_account(Vec::new())?;
    if account.is_operable(at) {
        return Ok(());
    }
    Err(PersistenceError::AccountNotOperable {
        account_id: account.id,
        status: account.status,
        locked_until: account.locked_until,
    })
}

/// `wallet` is the sender as read after its debit
async fn enforce_limits(
    conn: &mut SqliteConnection,
    wallet: &Wallet,
    debit: &TransactionDraft,
    limits: &LimitSchedule,
) -> PersistenceResult<()> {
    let currency = wallet.currency().clone();

    let single = limits.single_transaction_limit(wallet.kyc_level)?;
    if debit.amount.amount > single {
        return Err(PersistenceError::LimitExceeded {
            wallet_id: wallet.id.clone(),
            limit: LimitKind::SingleTransaction,
            limit_amount: single,
            attempted: debit.amount.amount,
        });
    }

    let today = TransactionRepo::sum_completed(
        &mut *conn,
        &wallet.id,
        TransactionType::Debit,
        day_start(debit.created_at),
    )
    .await?;
    let this_month = TransactionRepo::sum_completed(
        &mut *conn,
        &wallet.id,
        TransactionType::Debit,
        month_start(debit.created_at),
    )
    .await?;

    wallet
        .check_cumulative(
            &debit.amount,
            &Money::from_minor_units(today, currency.clone()),
            &Money::from_minor_units(this_month, currency),
            limits,
        )
        .map_err(|e| match e {
            CoreError::LimitExceeded {
                limit,
                limit_amount,
                attempted,
            } => PersistenceError::LimitExceeded {
                wallet_id: wallet.id.clone(),
                limit,
                limit_amount,
                attempted,
            },
            other => other.into(),
        })
}

async fn credit_wallet(
    conn: &mut SqliteConnection,
    credit: &TransactionDraft,
    amount_minor: i64,
) -> PersistenceResult<()> {
    let credited = sqlx::query(
        r#"
        UPDATE wallets SET balance_minor = balance_minor + ?
        WHERE id = ? AND currency = ? AND is_active = 1
        "#,
    )
    .bind(amount_minor)
    .bind(&credit.wallet_id)
    .bind(&credit.amount.currency.code)
    .execute(&mut *conn)
    .await?;

    if credited.rows_affected() == 1 {
        return Ok(());
    }

    Err(match WalletRepo::find_by_id(&mut *conn, &credit.wallet_id).await? {
        None => PersistenceError::not_found("Wallet", &credit.wallet_id),
        Some(wallet) if !wallet.is_active => PersistenceError::WalletInactive(wallet.id),
        Some(wallet) => PersistenceError::Core(CoreError::CurrencyMismatch {
            expected: wallet.currency().code.clone(),
            actual: credit.amount.currency.code.clone(),
        }),
    })
}

async fn insert_pending(
    conn: &mut SqliteConnection,
    draft: &TransactionDraft,
    amount_minor: i64,
) -> PersistenceResult<()> {
    match TransactionRepo::insert(&mut *conn, draft, amount_minor, TransactionStatus::Pending).await {
        Ok(()) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(PersistenceError::DuplicateReference {
            wallet_id: draft.wallet_id.clone(),
            reference: draft.reference.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn completed(draft: &TransactionDraft) -> Transaction {
    Transaction {
        id: draft.id.clone(),
        wallet_id: draft.wallet_id.clone(),
        tx_type: draft.tx_type,
        amount: draft.amount.clone(),
        description: draft.description.clone(),
        status: TransactionStatus::Completed,
        reference: draft.reference.clone(),
        counterparty_wallet_id: draft.counterparty_wallet_id.clone(),
        created_at: draft.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mobiwallet_core::Currency;
    use rust_decimal_macros::dec;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 17, 45, 12).unwrap()
    }

    #[test]
    fn test_spending_windows() {
        assert_eq!(day_start(at()), Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
        assert_eq!(month_start(at()), Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap());

        let first = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(month_start(first), first);
        assert_eq!(day_start(first), first);
    }

    #[test]
    fn test_validate_pair() {
        let reference = Reference::parse("ref-1").unwrap();
        let amount = Money::new(dec!(500), Currency::rwf());
        let (debit, credit) =
            TransactionDraft::transfer_pair("wal-a", "wal-b", amount.clone(), "rent", &reference, at())
                .unwrap();
        assert!(validate_pair(&debit, &credit).is_ok());
        assert!(matches!(
            validate_pair(&credit, &debit),
            Err(PersistenceError::InvalidPair(_))
        ));

        let mut short = credit.clone();
        short.amount = Money::new(dec!(499), Currency::rwf());
        assert!(validate_pair(&debit, &short).is_err());

        let (_, stray) = TransactionDraft::transfer_pair(
            "wal-c",
            "wal-b",
            amount,
            "rent",
            &reference,
            at(),
        )
        .unwrap();
        assert!(validate_pair(&debit, &stray).is_err());
    }
}
