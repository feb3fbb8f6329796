//! Store configuration
//!
//! Connection pool sizing and the bounded lock wait used by every
//! money-moving transaction.

use crate::error::{PersistenceError, PersistenceResult};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Ledger store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite URL (e.g. `sqlite:data/cardbank.db`)
    #[serde(default = "default_url")]
    pub url: String,

    /// Pool size; one connection per concurrent operation
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub min_connections: u32,

    /// How long an operation waits for a free pooled connection
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// How long a transaction waits for a card row lock before failing
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_url() -> String {
    "sqlite:data/cardbank.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            min_connections: 0,
            acquire_timeout_ms: default_acquire_timeout_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Config pointing at a database file, other settings default
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            url: format!("sqlite:{}", path.as_ref().display()),
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn validate(&self) -> PersistenceResult<()> {
        if self.url.trim().is_empty() {
            return Err(PersistenceError::Configuration(
                "database url is empty".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(PersistenceError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(PersistenceError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.acquire_timeout_ms == 0 || self.lock_timeout_ms == 0 {
            return Err(PersistenceError::Configuration(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// SQLite connection options: WAL, foreign keys, bounded busy wait
    pub fn connect_options(&self) -> PersistenceResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.lock_timeout());
        Ok(options)
    }
}
