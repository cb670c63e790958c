#![allow(clippy::unwrap_used)]

use super::*;
use crate::db::Database;
use crate::error::LimitError;
use crate::models::{CounterKind, LimitStatus, OrderLimit, SpendLimit, TypeLimit};
use rust_decimal_macros::dec;
use tempfile::TempDir;

const BUSY: Duration = Duration::from_secs(5);

fn setup() -> (TempDir, LimitEngine) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.db");

    let db = Database::open(&path, BUSY).unwrap();
    let mut limit = SpendLimit::new("CREDIT".into(), "5812".into(), dec!(1000));
    limit.hour_count = 100;
    db.upsert_spend_limit(&limit).unwrap();
    db.insert_type_limit(&TypeLimit::new("PIX".into(), "TRANSFER".into()))
        .unwrap();
    db.insert_order_limit(&OrderLimit::new(
        "PIX".into(),
        "CHANNEL:MOBILE".into(),
        CounterKind::Value,
        dec!(500),
    ))
    .unwrap();

    let pool = DbPool::open(&path, 4, BUSY).unwrap();
    (dir, LimitEngine::new(pool, Duration::from_secs(5)))
}

fn make_txn(amount: rust_decimal::Decimal) -> TransactionRecord {
    TransactionRecord::new(
        "4111111111111111".into(),
        "CREDIT".into(),
        "5812".into(),
        "tx-1".into(),
        amount,
    )
}

fn make_request() -> LimitCheckRequest {
    LimitCheckRequest {
        transaction_id: "tx-1".into(),
        key: "CPF:1".into(),
        type_limit: "PIX".into(),
        order_limit: "CHANNEL:MOBILE".into(),
        amount: dec!(100),
        quantity: 1,
        ..LimitCheckRequest::default()
    }
}

#[tokio::test]
async fn test_evaluate_transaction_through_pool() {
    let (_dir, engine) = setup();
    let first = engine.evaluate_transaction(make_txn(dec!(600))).await.unwrap();
    assert!(!first.status.is_breach());

    let second = engine.evaluate_transaction(make_txn(dec!(600))).await.unwrap();
    assert!(second.status.is_breach());
    assert_eq!(second.sum_amount, dec!(1200));
    assert_eq!(second.sum_count, 2);
}

#[tokio::test]
async fn test_check_limit_through_pool() {
    let (_dir, engine) = setup();
    let verdicts = engine.check_limit(make_request()).await.unwrap();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].status, LimitStatus::ValueApproved);
}

#[tokio::test]
async fn test_not_found_propagates() {
    let (_dir, engine) = setup();
    let mut request = make_request();
    request.type_limit = "TED".into();
    let err = engine.check_limit(request).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_zero_timeout_fails_without_writing() {
    let (dir, engine) = setup();
    let engine = LimitEngine::new(engine.pool.clone(), Duration::ZERO);

    let err = engine.evaluate_transaction(make_txn(dec!(10))).await.unwrap_err();
    assert!(matches!(err, LimitError::Timeout));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let db = Database::open(&dir.path().join("limits.db"), BUSY).unwrap();
    assert!(db.get_transaction_limits("4111111111111111").unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_commit_is_reported_as_committed() {
    let (dir, engine) = setup();
    let result = engine
        .pool
        .interact(Duration::from_millis(20), |conn, _deadline| {
            boundary::within_transaction(conn, None, |store| {
                std::thread::sleep(Duration::from_millis(80));
                store.insert_transaction(&make_txn(dec!(10)))
            })
        })
        .await;
    let id = result.unwrap();

    let db = Database::open(&dir.path().join("limits.db"), BUSY).unwrap();
    let stored = db.get_transaction_limits("4111111111111111").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, Some(id));
}

#[tokio::test]
async fn test_locked_database_times_out_without_writing() {
    let (dir, engine) = setup();
    let path = dir.path().join("limits.db");
    let mut holder = Database::open(&path, BUSY).unwrap();
    let lock = holder
        .connection_mut()
        .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
        .unwrap();

    let engine = LimitEngine::new(engine.pool.clone(), Duration::from_millis(100));
    let err = engine.evaluate_transaction(make_txn(dec!(10))).await.unwrap_err();
    assert!(matches!(err, LimitError::Timeout));
    lock.rollback().unwrap();

    let db = Database::open(&path, BUSY).unwrap();
    assert!(db.get_transaction_limits("4111111111111111").unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_are_all_recorded() {
    let (dir, engine) = setup();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.evaluate_transaction(make_txn(dec!(1))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let db = Database::open(&dir.path().join("limits.db"), BUSY).unwrap();
    assert_eq!(db.get_transaction_limits("4111111111111111").unwrap().len(), 8);
}

#[tokio::test]
async fn test_stat_reports_pool_size() {
    let (_dir, engine) = setup();
    engine.check_limit(make_request()).await.unwrap();
    let stats = engine.stat();
    assert_eq!(stats.max_size, 4);
    assert!(stats.size >= 1);
    assert!(stats.available <= stats.size);
}
