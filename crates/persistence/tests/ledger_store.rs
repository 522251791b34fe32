//! Integration tests for the ledger store
//!
//! Each test runs against a fresh SQLite file in a temp directory.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use mobiwallet_core::{
    Account, AccountStatus, ComplianceAction, Currency, LimitKind, LimitSchedule, Money, NewAccount, Reference,
    TransactionDraft, TransactionStatus, TransactionType, Wallet,
};
use mobiwallet_persistence::{
    AccountRepo, ComplianceRepo, Database, DebitGuard, PersistenceError, StorageConfig, WalletRepo,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
}

fn rwf(amount: Decimal) -> Money {
    Money::new(amount, Currency::rwf())
}

async fn setup() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::for_path(&dir.path().join("ledger.db"));
    let db = Database::open(&config).await.unwrap();
    (dir, db)
}

async fn create_wallet(db: &Database, n: u32, kyc_level: u8) -> Wallet {
    let new = NewAccount {
        phone_number: format!("+25078800{:04}", n),
        full_name: format!("Holder {}", n),
        email: None,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        is_pep: false,
        source_of_funds: Some("salary".to_string()),
    };
    let change = Account::open(&format!("acc-{}", n), new, "test", t0()).unwrap();
    AccountRepo::insert(db.pool(), &change.account).await.unwrap();
    ComplianceRepo::append_all(db.pool(), &change.account.id, &change.recorded)
        .await
        .unwrap();

    let wallet = Wallet::new(&format!("wal-{}", n), &change.account.id, Currency::rwf(), kyc_level, t0());
    WalletRepo::insert(db.pool(), &wallet).await.unwrap();
    wallet
}

async fn fund(db: &Database, wallet_id: &str, amount: Decimal) {
    let draft = TransactionDraft::opening_credit(wallet_id, rwf(amount), &Reference::generate(t0()), t0())
        .unwrap();
    db.ledger().append_opening_credit(&draft).await.unwrap();
}

fn pair(from: &str, to: &str, amount: Decimal, reference: &str) -> (TransactionDraft, TransactionDraft) {
    TransactionDraft::transfer_pair(
        from,
        to,
        rwf(amount),
        "test transfer",
        &Reference::parse(reference).unwrap(),
        t0(),
    )
    .unwrap()
}

async fn balance(db: &Database, wallet_id: &str) -> Decimal {
    db.ledger().current_balance(wallet_id).await.unwrap().amount
}

#[tokio::test]
async fn test_append_pair_moves_balance_and_records_rows() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(1000)).await;

    let (debit, credit) = pair(&a.id, &b.id, dec!(500), "rent-oct");
    let committed = db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
        .unwrap();
    assert_eq!(committed.debit.status, TransactionStatus::Completed);

    assert_eq!(balance(&db, &a.id).await, dec!(500));
    assert_eq!(balance(&db, &b.id).await, dec!(500));

    let history = db.ledger().history(&a.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tx_type, TransactionType::Debit);
    assert_eq!(history[1].tx_type, TransactionType::Credit);
    assert!(history.iter().all(|t| t.status == TransactionStatus::Completed));

    let receipt = db
        .ledger()
        .find_transfer(&a.id, &Reference::parse("rent-oct").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt, committed.receipt().unwrap());
    assert_eq!(receipt.recipient_wallet_id, b.id);

    let spent = db
        .ledger()
        .sum_completed(&a.id, TransactionType::Debit, t0())
        .await
        .unwrap();
    assert_eq!(spent.amount, dec!(500));

    assert!(db.ledger().reconcile().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_insufficient_funds_leaves_no_trace() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(100)).await;

    let (debit, credit) = pair(&a.id, &b.id, dec!(101), "too-much");
    let err = db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
        .unwrap_err();

    match err {
        PersistenceError::InsufficientFunds { needed, available, .. } => {
            assert_eq!(needed, dec!(101));
            assert_eq!(available, dec!(100));
        }
        other => panic!("expected insufficient funds, got {:?}", other),
    }
    assert_eq!(balance(&db, &a.id).await, dec!(100));
    assert_eq!(balance(&db, &b.id).await, dec!(0));
    assert!(db.ledger().history(&b.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_recipient_rolls_back_debit() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(1000)).await;
    WalletRepo::deactivate(db.pool(), &b.id).await.unwrap();

    let (debit, credit) = pair(&a.id, &b.id, dec!(300), "to-closed");
    let err = db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::WalletInactive(ref id) if id == &b.id));

    assert_eq!(balance(&db, &a.id).await, dec!(1000));
    assert_eq!(db.ledger().history(&a.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_reference_is_rejected() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(1000)).await;

    let (debit, credit) = pair(&a.id, &b.id, dec!(200), "once");
    db.ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
        .unwrap();

    let (debit, credit) = pair(&a.id, &b.id, dec!(200), "once");
    let err = db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::DuplicateReference { .. }));

    assert_eq!(balance(&db, &a.id).await, dec!(800));
    assert_eq!(balance(&db, &b.id).await, dec!(200));
}

#[tokio::test]
async fn test_committed_reference_wins_over_funds_check() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(100)).await;
    let limits = LimitSchedule::default();

    let (debit, credit) = pair(&a.id, &b.id, dec!(60), "client-ref-1");
    db.ledger()
        .append_pair(&debit, &credit, DebitGuard::Limits(&limits))
        .await
        .unwrap();

    // Only 40 left: the retry must still be recognised by its reference
    let (debit, credit) = pair(&a.id, &b.id, dec!(60), "client-ref-1");
    match db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Limits(&limits))
        .await
    {
        Err(PersistenceError::DuplicateReference { wallet_id, reference }) => {
            assert_eq!(wallet_id, a.id);
            assert_eq!(reference, "client-ref-1");
        }
        other => panic!("expected duplicate reference, got {:?}", other),
    }
    assert_eq!(balance(&db, &a.id).await, dec!(40));
}

#[tokio::test]
async fn test_sender_status_checked_inside_commit() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(1000)).await;

    let account = AccountRepo::load(db.pool(), &a.owner_account_id).await.unwrap();
    let suspended = account.suspend("chargeback review", "ops", t0()).unwrap().account;
    AccountRepo::update(db.pool(), &suspended).await.unwrap();

    let (debit, credit) = pair(&a.id, &b.id, dec!(100), "while-suspended");
    match db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
    {
        Err(PersistenceError::AccountNotOperable { account_id, status, .. }) => {
            assert_eq!(account_id, a.owner_account_id);
            assert_eq!(status, AccountStatus::Suspended);
        }
        other => panic!("expected suspended sender, got {:?}", other),
    }

    let mut locked = account.clone();
    locked.locked_until = Some(t0() + Duration::minutes(30));
    AccountRepo::update(db.pool(), &locked).await.unwrap();

    let (debit, credit) = pair(&a.id, &b.id, dec!(100), "while-locked");
    match db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
    {
        Err(PersistenceError::AccountNotOperable { locked_until, .. }) => {
            assert_eq!(locked_until, Some(t0() + Duration::minutes(30)));
        }
        other => panic!("expected locked sender, got {:?}", other),
    }

    assert_eq!(balance(&db, &a.id).await, dec!(1000));
    assert_eq!(balance(&db, &b.id).await, dec!(0));
    assert_eq!(db.ledger().history(&a.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_rows_keep_reference_retryable() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(1000)).await;

    let (debit, credit) = pair(&a.id, &b.id, dec!(250), "retry-me");
    db.ledger().record_failed_pair(&debit, &credit).await.unwrap();

    let reference = Reference::parse("retry-me").unwrap();
    assert!(db.ledger().find_transfer(&a.id, &reference).await.unwrap().is_none());
    assert_eq!(balance(&db, &a.id).await, dec!(1000));

    let (debit, credit) = pair(&a.id, &b.id, dec!(250), "retry-me");
    db.ledger()
        .append_pair(&debit, &credit, DebitGuard::Unchecked)
        .await
        .unwrap();

    let history = db.ledger().history(&a.id, 10).await.unwrap();
    let statuses: Vec<_> = history
        .iter()
        .filter(|t| t.reference == reference)
        .map(|t| t.status)
        .collect();
    assert_eq!(statuses.len(), 2);
    assert!(statuses.contains(&TransactionStatus::Failed));
    assert!(statuses.contains(&TransactionStatus::Completed));
    assert_eq!(balance(&db, &a.id).await, dec!(750));
    assert!(db.ledger().reconcile().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_cumulative_limit_checked_inside_commit() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    fund(&db, &a.id, dec!(5000000)).await;
    let limits = LimitSchedule::default();

    for reference in ["day-1", "day-2"] {
        let (debit, credit) = pair(&a.id, &b.id, dec!(1000000), reference);
        db.ledger()
            .append_pair(&debit, &credit, DebitGuard::Limits(&limits))
            .await
            .unwrap();
    }

    let (debit, credit) = pair(&a.id, &b.id, dec!(1), "day-3");
    match db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Limits(&limits))
        .await
    {
        Err(PersistenceError::LimitExceeded { limit, attempted, .. }) => {
            assert_eq!(limit, LimitKind::Daily);
            assert_eq!(attempted, dec!(2000001));
        }
        other => panic!("expected daily limit, got {:?}", other),
    }

    let (debit, credit) = pair(&a.id, &b.id, dec!(1000001), "too-big");
    match db
        .ledger()
        .append_pair(&debit, &credit, DebitGuard::Limits(&limits))
        .await
    {
        Err(PersistenceError::LimitExceeded { limit, .. }) => {
            assert_eq!(limit, LimitKind::SingleTransaction)
        }
        other => panic!("expected single transaction limit, got {:?}", other),
    }

    assert_eq!(balance(&db, &a.id).await, dec!(3000000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let (_dir, db) = setup().await;
    let a = create_wallet(&db, 1, 1).await;
    let b = create_wallet(&db, 2, 1).await;
    let c = create_wallet(&db, 3, 1).await;
    fund(&db, &a.id, dec!(100)).await;

    let mut handles = Vec::new();
    for (to, reference) in [(b.id.clone(), "race-b"), (c.id.clone(), "race-c")] {
        let ledger = db.ledger().clone();
        let from = a.id.clone();
        handles.push(tokio::spawn(async move {
            let (debit, credit) = pair(&from, &to, dec!(60), reference);
            ledger.append_pair(&debit, &credit, DebitGuard::Unchecked).await
        }));
    }

    let mut committed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(PersistenceError::InsufficientFunds { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!((committed, rejected), (1, 1));

    assert_eq!(balance(&db, &a.id).await, dec!(40));
    let total = balance(&db, &a.id).await + balance(&db, &b.id).await + balance(&db, &c.id).await;
    assert_eq!(total, dec!(100));
}

#[tokio::test]
async fn test_account_round_trip_with_history() {
    let (_dir, db) = setup().await;
    let wallet = create_wallet(&db, 7, 1).await;

    let account = AccountRepo::load(db.pool(), &wallet.owner_account_id).await.unwrap();
    assert_eq!(account.phone_number, "+250788000007");
    assert_eq!(account.compliance_history.len(), 1);
    assert_eq!(account.compliance_history[0].action, ComplianceAction::AccountOpened);

    let found = WalletRepo::find_by_phone(db.pool(), "+250788000007").await.unwrap();
    assert_eq!(found.map(|w| w.id), Some(wallet.id.clone()));

    let duplicate = Wallet::new("wal-other", &account.id, Currency::rwf(), 1, t0());
    let err = WalletRepo::insert(db.pool(), &duplicate).await.unwrap_err();
    assert!(matches!(err, PersistenceError::AlreadyExists { .. }));
}
