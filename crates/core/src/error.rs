//! # Error Module
//!
//! Domain errors raised while building core values, before anything reaches
//! the store.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // === Money errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount has more than 2 decimal places: {0}")]
    TooPrecise(Decimal),

    #[error("Amount out of range: {0}")]
    OutOfRange(Decimal),

    // === Enum parsing ===
    #[error("Invalid {field} value: {value}")]
    InvalidEnumValue { field: &'static str, value: String },

    // === Ledger replay ===
    #[error("Ledger entry {entry_id} records balance {recorded}, replay gives {replayed}")]
    LedgerMismatch {
        entry_id: i64,
        recorded: Decimal,
        replayed: Decimal,
    },

    #[error("Ledger entry {entry_id} would take the balance below zero")]
    LedgerOverdraft { entry_id: i64 },
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub(crate) fn invalid_enum(field: &'static str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field,
            value: value.to_string(),
        }
    }

    /// True for errors caused by a malformed amount
    pub fn is_amount_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidAmount(_) | CoreError::TooPrecise(_) | CoreError::OutOfRange(_)
        )
    }
}
