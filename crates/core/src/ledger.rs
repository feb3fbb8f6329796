//! # Ledger Module
//!
//! Append-only ledger entries. Every balance change of a card is recorded
//! as exactly one [`LedgerEntry`] carrying the balance right after the
//! change, so the full history can be replayed and checked.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Account opening with its initial deposit (may be zero)
    Open,
    /// Credit
    Deposit,
    /// Debit
    Withdraw,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Open => "open",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
        }
    }

    /// Balance after applying an entry of this type to `balance`.
    ///
    /// `None` when a withdrawal would go below zero or a credit overflows.
    pub fn apply(&self, balance: Money, amount: Money) -> Option<Money> {
        match self {
            TransactionType::Open | TransactionType::Deposit => balance.checked_add(amount),
            TransactionType::Withdraw => balance.checked_sub(amount),
        }
    }
}

impl FromStr for TransactionType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "open" => Ok(TransactionType::Open),
            "deposit" => Ok(TransactionType::Deposit),
            "withdraw" => Ok(TransactionType::Withdraw),
            other => Err(CoreError::invalid_enum("transaction type", other)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub card_id: i64,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Replays ledger entries (oldest first) from a zero balance.
///
/// Every entry's `balance_after` must equal the previous balance plus or
/// minus its amount. Returns the final balance.
pub fn replay<'a, I>(entries: I) -> CoreResult<Money>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut balance = Money::ZERO;
    for entry in entries {
        let next = entry
            .tx_type
            .apply(balance, entry.amount)
            .ok_or(CoreError::LedgerOverdraft { entry_id: entry.id })?;
        if next != entry.balance_after {
            return Err(CoreError::LedgerMismatch {
                entry_id: entry.id,
                recorded: entry.balance_after.value(),
                replayed: next.value(),
            });
        }
        balance = next;
    }
    Ok(balance)
}
