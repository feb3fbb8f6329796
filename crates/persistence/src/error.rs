//! # Persistence Errors
//!
//! Error types for the persistence layer. Raw `sqlx` errors are classified
//! on conversion so callers can tell constraint violations, lock timeouts
//! and connection failures apart without looking at driver codes.

use cardbank_core::CoreError;
use rust_decimal::Decimal;
use thiserror::Error;

/// SQLite primary result codes for a busy or locked database
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// The lock wait (busy timeout) expired
    #[error("Database busy: {0}")]
    Busy(String),

    // === Balance errors ===
    #[error("Insufficient balance: need {needed}, available {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    // === Conversion errors ===
    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] CoreError),

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                if db.is_unique_violation() {
                    Self::UniqueViolation(db.message().to_string())
                } else if db.is_check_violation() {
                    Self::CheckViolation(db.message().to_string())
                } else if is_busy_code(db.code().as_deref()) {
                    Self::Busy(db.message().to_string())
                } else {
                    Self::Database(sqlx::Error::Database(db))
                }
            }
            other => Self::Database(other),
        }
    }
}

fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        // extended codes keep the primary code in the low byte
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

impl PersistenceError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Connection-level failure that a fresh connection may not hit again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::WorkerCrashed
            )
        )
    }

    /// The store cannot be reached at all
    pub fn is_unavailable(&self) -> bool {
        self.is_transient() || matches!(self, Self::Database(sqlx::Error::PoolClosed))
    }
}
