//! Shared setup for engine integration tests

#![allow(dead_code)]

use cardbank_core::Profile;
use cardbank_engine::{
    OpenAccountRequest, OpenedAccount, SecurityConfig, ServiceContext, TransactionEngine,
};
use cardbank_persistence::{Database, StoreConfig};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Cheap Argon2 parameters so tests stay fast
pub fn fast_security() -> SecurityConfig {
    SecurityConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}

/// Fresh database in a temp dir. Keep the `TempDir` alive for the test.
pub async fn setup() -> (TempDir, ServiceContext) {
    setup_with(StoreConfig::default()).await
}

pub async fn setup_with(config: StoreConfig) -> (TempDir, ServiceContext) {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig {
        url: StoreConfig::for_path(temp_dir.path().join("cardbank.db")).url,
        ..config
    };
    let db = Database::init(&config).await.unwrap();
    let ctx = ServiceContext::new(&db, &fast_security()).unwrap();
    (temp_dir, ctx)
}

pub fn open_request(name: &str, id_card: &str, card: &str, initial: Decimal) -> OpenAccountRequest {
    OpenAccountRequest {
        profile: Profile::new(name, id_card, "555-0100", "Addr"),
        card_number: card.to_string(),
        password: "pw1".to_string(),
        initial_deposit: initial,
    }
}

pub async fn open(ctx: &ServiceContext, name: &str, id_card: &str, card: &str, initial: Decimal) -> OpenedAccount {
    TransactionEngine::new(ctx)
        .open_account(&open_request(name, id_card, card, initial))
        .await
        .unwrap()
}

pub async fn count(ctx: &ServiceContext, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(ctx.pool())
        .await
        .unwrap()
}
