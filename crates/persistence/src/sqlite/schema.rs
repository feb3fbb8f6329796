//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables.
//! The schema itself lives in `migrations/20261019000000_init.sql`.

use crate::error::PersistenceError;
use cardbank_core::{
    Card, CardStatus, LedgerEntry, Message, MessageType, Money, Profile, TransactionType,
};
use chrono::{DateTime, Utc};

/// Row type for table `users`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: i64,
    pub name: String,
    pub id_card: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `cards`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardRow {
    pub card_id: i64,
    pub user_id: i64,
    pub card_number: String,
    pub password_hash: String,
    pub balance_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A card row as returned by a locking statement
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedCardRow {
    pub card_id: i64,
    pub user_id: i64,
    pub balance_cents: i64,
    pub status: String,
}

/// Card row held under the write lock of the current transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedCard {
    pub card_id: i64,
    pub user_id: i64,
    pub balance: Money,
    pub status: CardStatus,
}

/// `users` joined with `cards`, for profile reads
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub name: String,
    pub id_card: String,
    pub phone: String,
    pub address: String,
    pub card_number: String,
    pub balance_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `transactions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub card_id: i64,
    #[sqlx(rename = "type")]
    pub tx_type: String,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `messages`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub recipient_card: String,
    pub sender_name: String,
    #[sqlx(rename = "type")]
    pub message_type: String,
    pub amount_cents: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry about to be appended
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub card_id: i64,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn new(
        card_id: i64,
        tx_type: TransactionType,
        amount: Money,
        balance_after: Money,
        description: impl Into<String>,
    ) -> Self {
        Self {
            card_id,
            tx_type,
            amount,
            balance_after,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Message about to be inserted
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub recipient_card: String,
    pub sender_name: String,
    pub message_type: MessageType,
    pub amount: Money,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(
        recipient_card: &str,
        sender_name: &str,
        message_type: MessageType,
        amount: Money,
        content: &str,
    ) -> Self {
        Self {
            recipient_card: recipient_card.to_string(),
            sender_name: sender_name.to_string(),
            message_type,
            amount,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Signed balance change applied by `CardRepo::adjust_balance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Credit(Money),
    Debit(Money),
}

impl Adjustment {
    pub fn signed_cents(&self) -> i64 {
        match self {
            Adjustment::Credit(m) => m.cents(),
            Adjustment::Debit(m) => -m.cents(),
        }
    }

    pub fn amount(&self) -> Money {
        match self {
            Adjustment::Credit(m) | Adjustment::Debit(m) => *m,
        }
    }
}

// === Conversion implementations ===

impl TryFrom<LockedCardRow> for LockedCard {
    type Error = PersistenceError;

    fn try_from(row: LockedCardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            card_id: row.card_id,
            user_id: row.user_id,
            balance: Money::from_cents(row.balance_cents)?,
            status: row.status.parse::<CardStatus>()?,
        })
    }
}

impl TryFrom<CardRow> for Card {
    type Error = PersistenceError;

    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        Ok(Card {
            card_id: row.card_id,
            user_id: row.user_id,
            card_number: row.card_number,
            balance: Money::from_cents(row.balance_cents)?,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

impl From<&ProfileRow> for Profile {
    fn from(row: &ProfileRow) -> Self {
        Profile::new(&row.name, &row.id_card, &row.phone, &row.address)
    }
}

impl TryFrom<TransactionRow> for LedgerEntry {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id,
            card_id: row.card_id,
            tx_type: row.tx_type.parse()?,
            amount: Money::from_cents(row.amount_cents)?,
            balance_after: Money::from_cents(row.balance_after_cents)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = PersistenceError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            recipient_card: row.recipient_card,
            sender_name: row.sender_name,
            message_type: row.message_type.parse()?,
            amount: Money::from_cents(row.amount_cents)?,
            content: row.content,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}
