//! # Cardbank Persistence
//!
//! Ledger store for Cardbank: SQLite schema, connection pool and
//! repositories for users, cards, ledger entries and messages.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cardbank_persistence::{CardRepo, Database, StoreConfig};
//!
//! let db = Database::init(&StoreConfig::for_path("cardbank.db")).await?;
//! let balance = CardRepo::get_balance(db.pool(), "CARD001").await?;
//! db.close().await;
//! ```

pub mod config;
pub mod error;
pub mod sqlite;

pub use config::StoreConfig;
pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::{
    create_pool, init_database, run_migrations, CardRepo, MessageRepo, TransactionRepo, UserRepo,
};
pub use sqlite::schema::{
    Adjustment, CardRow, LockedCard, MessageRow, NewLedgerEntry, NewMessage, ProfileRow,
    TransactionRow, UserRow,
};

use sqlx::SqlitePool;

/// Database facade owning the connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect without touching the schema
    pub async fn connect(config: &StoreConfig) -> PersistenceResult<Self> {
        let pool = create_pool(config).await?;
        Ok(Self { pool })
    }

    /// Connect and run pending migrations
    pub async fn init(config: &StoreConfig) -> PersistenceResult<Self> {
        let pool = init_database(config).await?;
        Ok(Self { pool })
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection; later operations fail as unavailable
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
