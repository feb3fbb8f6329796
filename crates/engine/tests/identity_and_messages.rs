//! Identity verifier, messaging sink and read-side account queries

mod common;

use cardbank_core::{CardStatus, MessageType, Money, Profile, SYSTEM_SENDER};
use cardbank_engine::{
    AccountService, IdentityVerifier, LedgerError, MessagingService, TransactionEngine,
    TransferRequest, DEFAULT_HISTORY_LIMIT,
};
use common::{count, open, setup};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_login() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(10.00)).await;
    let identity = IdentityVerifier::new(&ctx);

    assert!(identity.verify_login("CARD001", "pw1").await.unwrap());
    assert!(!identity.verify_login("CARD001", "wrong").await.unwrap());
    assert!(!identity.verify_login("NOPE", "pw1").await.unwrap());

    identity
        .close_account("CARD001", "Alice", "555-0100")
        .await
        .unwrap();
    assert!(!identity.verify_login("CARD001", "pw1").await.unwrap());
}

#[tokio::test]
async fn test_malformed_stored_hash_is_internal() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(10.00)).await;
    sqlx::query("UPDATE cards SET password_hash = 'not-a-phc-string' WHERE card_number = 'CARD001'")
        .execute(ctx.pool())
        .await
        .unwrap();

    let err = IdentityVerifier::new(&ctx)
        .verify_login("CARD001", "pw1")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Internal(_)));
}

#[tokio::test]
async fn test_identity_and_password_reset() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(10.00)).await;
    let identity = IdentityVerifier::new(&ctx);

    assert!(identity.verify_identity("CARD001", "Alice", "555-0100").await.unwrap());
    assert!(!identity.verify_identity("CARD001", "Alice", "555-0199").await.unwrap());
    assert!(!identity.verify_identity("NOPE", "Alice", "555-0100").await.unwrap());

    let err = identity
        .reset_password("CARD001", "Mallory", "555-0100", "pw2")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized));
    assert!(identity.verify_login("CARD001", "pw1").await.unwrap());

    identity
        .reset_password("CARD001", "Alice", "555-0100", "pw2")
        .await
        .unwrap();
    assert!(identity.verify_login("CARD001", "pw2").await.unwrap());
    assert!(!identity.verify_login("CARD001", "pw1").await.unwrap());

    assert!(identity.update_password("CARD001", "pw3").await.unwrap());
    assert!(!identity.update_password("NOPE", "pw3").await.unwrap());
}

#[tokio::test]
async fn test_profile_read_and_update() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(10.00)).await;
    open(&ctx, "Bob", "ID2", "CARD002", dec!(0)).await;
    let accounts = AccountService::new(&ctx);
    let identity = IdentityVerifier::new(&ctx);

    let profile = accounts.profile("CARD001").await.unwrap();
    assert_eq!(profile.profile.name, "Alice");
    assert_eq!(profile.profile.id_card, "ID1");
    assert_eq!(profile.balance.value(), dec!(10.00));
    assert_eq!(profile.status, CardStatus::Active);
    assert_eq!(accounts.owner_name("CARD002").await.unwrap(), "Bob");

    let updated = Profile::new("Alice Smith", "ID9", "555-0111", "New Addr");
    identity.update_profile("CARD001", &updated).await.unwrap();
    assert_eq!(accounts.profile("CARD001").await.unwrap().profile, updated);

    let clash = Profile::new("Alice Smith", "ID2", "555-0111", "");
    let err = identity.update_profile("CARD001", &clash).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateAccount));

    let err = identity.update_profile("NOPE", &updated).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));

    let err = accounts.profile("NOPE").await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
    assert!(!accounts.exists("NOPE").await.unwrap());
    assert!(accounts.exists("CARD001").await.unwrap());
}

#[tokio::test]
async fn test_account_closure() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(42.50)).await;
    let identity = IdentityVerifier::new(&ctx);

    let err = identity
        .closure_check("CARD001", "Alice", "000")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized));
    let remaining = identity
        .closure_check("CARD001", "Alice", "555-0100")
        .await
        .unwrap();
    assert_eq!(remaining.value(), dec!(42.50));

    let err = identity
        .close_account("CARD001", "Alice", "000")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized));
    let err = identity
        .close_account("NOPE", "Alice", "555-0100")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized));

    let balance = identity
        .close_account("CARD001", "Alice", "555-0100")
        .await
        .unwrap();
    assert_eq!(balance.value(), dec!(42.50));

    let err = identity
        .close_account("CARD001", "Alice", "555-0100")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountClosed(_)));

    // nothing is deleted
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM users").await, 1);
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM transactions").await, 1);
    let profile = AccountService::new(&ctx).profile("CARD001").await.unwrap();
    assert_eq!(profile.status, CardStatus::Closed);
}

#[tokio::test]
async fn test_closed_card_keeps_credentials_and_profile() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(5.00)).await;
    let identity = IdentityVerifier::new(&ctx);
    identity
        .close_account("CARD001", "Alice", "555-0100")
        .await
        .unwrap();
    let hash_before: String =
        sqlx::query_scalar("SELECT password_hash FROM cards WHERE card_number = 'CARD001'")
            .fetch_one(ctx.pool())
            .await
            .unwrap();

    let err = identity.update_password("CARD001", "pw2").await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountClosed(_)));
    let err = identity
        .reset_password("CARD001", "Alice", "555-0100", "pw2")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountClosed(_)));
    let updated = Profile::new("Alice Smith", "ID9", "555-0111", "");
    let err = identity.update_profile("CARD001", &updated).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountClosed(_)));

    let hash_after: String =
        sqlx::query_scalar("SELECT password_hash FROM cards WHERE card_number = 'CARD001'")
            .fetch_one(ctx.pool())
            .await
            .unwrap();
    assert_eq!(hash_before, hash_after);
    let profile = AccountService::new(&ctx).profile("CARD001").await.unwrap();
    assert_eq!(profile.profile.name, "Alice");
    assert_eq!(profile.profile.id_card, "ID1");
}

#[tokio::test]
async fn test_mark_read_twice() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(100.00)).await;
    open(&ctx, "Bob", "ID2", "CARD002", dec!(0)).await;
    let receipt = TransactionEngine::new(&ctx)
        .transfer(&TransferRequest {
            source: "CARD001".to_string(),
            destination: "CARD002".to_string(),
            amount: dec!(50.00),
            note: "lunch".to_string(),
            anonymous: false,
        })
        .await
        .unwrap();

    let messages = MessagingService::new(&ctx);
    assert_eq!(messages.unread_count("CARD002").await.unwrap(), 1);
    assert!(messages.mark_read(receipt.message_id).await.unwrap());
    assert!(messages.mark_read(receipt.message_id).await.unwrap());
    assert!(messages.get(receipt.message_id).await.unwrap().is_read);
    assert_eq!(messages.unread_count("CARD002").await.unwrap(), 0);

    assert!(!messages.mark_read(9_999).await.unwrap());
    let err = messages.get(9_999).await.unwrap_err();
    assert!(matches!(err, LedgerError::MessageNotFound(9_999)));
}

#[tokio::test]
async fn test_system_messages() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(1.00)).await;
    let messages = MessagingService::new(&ctx);

    messages
        .send_system_message("CARD001", "Welcome", "your card is ready")
        .await
        .unwrap();
    messages
        .append_message("CARD001", "Bob", MessageType::Transfer, Money::ZERO, "hi")
        .await
        .unwrap();

    let inbox = messages.inbox("CARD001").await.unwrap();
    assert_eq!(inbox.len(), 2);
    let system = inbox
        .iter()
        .find(|m| m.message_type == MessageType::System)
        .unwrap();
    assert_eq!(system.sender_name, SYSTEM_SENDER);
    assert_eq!(system.content, "Welcome: your card is ready");
    assert!(system.amount.is_zero());

    let err = messages
        .send_system_message("NOPE", "", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
}

#[tokio::test]
async fn test_history_limit_and_order() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(0)).await;
    let engine = TransactionEngine::new(&ctx);
    for _ in 0..25 {
        engine.deposit("CARD001", dec!(1.00)).await.unwrap();
    }

    let accounts = AccountService::new(&ctx);
    let history = accounts.history("CARD001", None).await.unwrap();
    assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT as usize);
    assert_eq!(history[0].balance_after.value(), dec!(25.00));
    assert!(history.windows(2).all(|w| w[0].id > w[1].id));

    let ledger = accounts.ledger("CARD001").await.unwrap();
    assert_eq!(ledger.len(), 26);
    assert!(ledger.windows(2).all(|w| w[0].id < w[1].id));

    let err = accounts.history("NOPE", None).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
}

#[tokio::test]
async fn test_ledger_rows_cannot_be_rewritten() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(10.00)).await;

    let update = sqlx::query("UPDATE transactions SET amount_cents = 1")
        .execute(ctx.pool())
        .await;
    assert!(update.is_err());
    let delete = sqlx::query("DELETE FROM transactions").execute(ctx.pool()).await;
    assert!(delete.is_err());
    assert!(AccountService::new(&ctx).audit("CARD001").await.unwrap().consistent);
}
