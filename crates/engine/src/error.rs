//! Engine errors
//!
//! [`LedgerError`] is the failure taxonomy handed to the API layer. Store
//! failures keep their [`PersistenceError`] as `source()` for logging, but
//! their `Display` text never includes it.

use cardbank_core::CoreError;
use cardbank_persistence::PersistenceError;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Boxed cause of an internal failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a Cardbank operation
#[derive(Debug, Error)]
pub enum LedgerError {
    // === Not found ===
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Source account not found: {0}")]
    SourceNotFound(String),

    #[error("Destination account not found: {0}")]
    DestinationNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(i64),

    // === Business rule rejections ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Account is closed: {0}")]
    AccountClosed(String),

    #[error("Account already exists")]
    DuplicateAccount,

    #[error("Identity verification failed")]
    Unauthorized,

    // === Store failures ===
    /// The bounded wait for a card row lock expired
    #[error("Timed out waiting for an account lock")]
    LockTimeout(#[source] PersistenceError),

    #[error("Ledger store unavailable")]
    StoreUnavailable(#[source] PersistenceError),

    #[error("Internal error")]
    Internal(#[source] BoxError),
}

/// Result type alias for engine operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Stable classification of a [`LedgerError`] for the API layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    InsufficientFunds,
    InvalidOperation,
    AccountClosed,
    DuplicateAccount,
    Unauthorized,
    LockTimeout,
    StoreUnavailable,
    Internal,
}

impl ErrorKind {
    /// Machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::AccountClosed => "account_closed",
            ErrorKind::DuplicateAccount => "duplicate_account",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::LockTimeout => "lock_timeout",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP-style status
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidAmount | ErrorKind::InvalidOperation => 400,
            ErrorKind::InsufficientFunds
            | ErrorKind::AccountClosed
            | ErrorKind::DuplicateAccount => 409,
            ErrorKind::Unauthorized => 401,
            ErrorKind::LockTimeout | ErrorKind::StoreUnavailable => 503,
            ErrorKind::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound(_)
            | LedgerError::SourceNotFound(_)
            | LedgerError::DestinationNotFound(_)
            | LedgerError::MessageNotFound(_) => ErrorKind::NotFound,
            LedgerError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            LedgerError::AccountClosed(_) => ErrorKind::AccountClosed,
            LedgerError::DuplicateAccount => ErrorKind::DuplicateAccount,
            LedgerError::Unauthorized => ErrorKind::Unauthorized,
            LedgerError::LockTimeout(_) => ErrorKind::LockTimeout,
            LedgerError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The caller may try the same request again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::LockTimeout(_) | LedgerError::StoreUnavailable(_)
        )
    }

    /// A permanent rejection by a business rule, as opposed to a store fault
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            LedgerError::LockTimeout(_) | LedgerError::StoreUnavailable(_) | LedgerError::Internal(_)
        )
    }

    /// Connection-level failure worth one automatic retry
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, LedgerError::StoreUnavailable(source) if source.is_transient())
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LedgerError::Internal(Box::new(err))
    }

    pub fn insufficient_funds(needed: Decimal, available: Decimal) -> Self {
        LedgerError::InsufficientFunds { needed, available }
    }
}

impl From<PersistenceError> for LedgerError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::InsufficientFunds { needed, available } => {
                LedgerError::InsufficientFunds { needed, available }
            }
            PersistenceError::NotFound { ref entity, ref id } if entity == "Card" => {
                LedgerError::AccountNotFound(id.clone())
            }
            err if err.is_busy() => LedgerError::LockTimeout(err),
            err if err.is_unavailable() => LedgerError::StoreUnavailable(err),
            err => LedgerError::Internal(Box::new(err)),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::from(err).into()
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        if err.is_amount_error() {
            LedgerError::InvalidAmount(err.to_string())
        } else {
            LedgerError::internal(err)
        }
    }
}
