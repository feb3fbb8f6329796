//! Concurrent callers against the same cards
//!
//! Each task uses its own pooled connection; correctness comes from the
//! store's write lock only.

mod common;

use cardbank_engine::{AccountService, LedgerError, TransactionEngine, TransferRequest};
use cardbank_persistence::{CardRepo, StoreConfig};
use common::{count, open, setup_with};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn pool_config() -> StoreConfig {
    StoreConfig {
        max_connections: 8,
        lock_timeout_ms: 30_000,
        acquire_timeout_ms: 30_000,
        ..StoreConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_never_overdraw() {
    let (_dir, ctx) = setup_with(pool_config()).await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(100.00)).await;
    let ctx = Arc::new(ctx);

    // 20 × 7.00 against 100.00: floor(100 / 7) = 14 succeed
    let mut handles = Vec::new();
    for _ in 0..20 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            TransactionEngine::new(&ctx)
                .withdraw("CARD001", dec!(7.00))
                .await
        }));
    }

    let mut succeeded = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientFunds { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(succeeded, 14);
    assert_eq!(insufficient, 6);

    let accounts = AccountService::new(&ctx);
    assert_eq!(accounts.balance("CARD001").await.unwrap().value(), dec!(2.00));
    assert_eq!(accounts.ledger("CARD001").await.unwrap().len(), 15);
    assert!(accounts.audit("CARD001").await.unwrap().consistent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reciprocal_transfers_do_not_deadlock() {
    let (_dir, ctx) = setup_with(pool_config()).await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(500.00)).await;
    open(&ctx, "Bob", "ID2", "CARD002", dec!(500.00)).await;
    let ctx = Arc::new(ctx);

    let mut handles = Vec::new();
    for i in 0..20 {
        let ctx = Arc::clone(&ctx);
        let (source, destination) = if i % 2 == 0 {
            ("CARD001", "CARD002")
        } else {
            ("CARD002", "CARD001")
        };
        handles.push(tokio::spawn(async move {
            let request = TransferRequest {
                source: source.to_string(),
                destination: destination.to_string(),
                amount: dec!(10.00),
                note: String::new(),
                anonymous: false,
            };
            TransactionEngine::new(&ctx).transfer(&request).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let accounts = AccountService::new(&ctx);
    let a = accounts.balance("CARD001").await.unwrap().value();
    let b = accounts.balance("CARD002").await.unwrap().value();
    assert_eq!(a + b, dec!(1000.00));
    assert_eq!(a, dec!(500.00));
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM messages").await, 20);
    for card in ["CARD001", "CARD002"] {
        assert!(accounts.audit(card).await.unwrap().consistent);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_deposits_and_withdrawals_replay() {
    let (_dir, ctx) = setup_with(pool_config()).await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(50.00)).await;
    let ctx = Arc::new(ctx);

    let mut handles = Vec::new();
    for i in 0..30 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            let engine = TransactionEngine::new(&ctx);
            if i % 3 == 0 {
                engine.withdraw("CARD001", dec!(12.50)).await
            } else {
                engine.deposit("CARD001", dec!(1.25)).await
            }
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => assert!(receipt.balance.value() >= dec!(0)),
            Err(err) => assert!(matches!(err, LedgerError::InsufficientFunds { .. })),
        }
    }

    let audit = AccountService::new(&ctx).audit("CARD001").await.unwrap();
    assert!(audit.consistent, "{:?}", audit.issue);
}

#[tokio::test]
async fn test_lock_wait_is_bounded() {
    let (_dir, ctx) = setup_with(StoreConfig {
        lock_timeout_ms: 200,
        ..StoreConfig::default()
    })
    .await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(50.00)).await;

    // another caller holds the card row
    let mut held = ctx.pool().begin().await.unwrap();
    CardRepo::lock(&mut held, "CARD001").await.unwrap().unwrap();

    let started = std::time::Instant::now();
    let err = TransactionEngine::new(&ctx)
        .withdraw("CARD001", dec!(10.00))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::LockTimeout(_)), "{err:?}");
    assert!(err.is_retryable());
    assert!(started.elapsed() < std::time::Duration::from_secs(5));

    held.rollback().await.unwrap();
    let accounts = AccountService::new(&ctx);
    assert_eq!(accounts.balance("CARD001").await.unwrap().value(), dec!(50.00));
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM transactions").await, 1);

    // the same withdrawal goes through once the lock is released
    TransactionEngine::new(&ctx)
        .withdraw("CARD001", dec!(10.00))
        .await
        .unwrap();
    assert_eq!(accounts.balance("CARD001").await.unwrap().value(), dec!(40.00));
}
