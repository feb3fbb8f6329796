//! Repository implementations for SQLite
//!
//! Single-row reads take any executor (pool, connection or transaction).
//! Money-moving statements are meant to run inside a transaction opened by
//! the engine; the repos never open transactions themselves.

use crate::config::StoreConfig;
use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use cardbank_core::{CardStatus, Money, Profile};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, info};

// ============================================================================
// User Repository
// ============================================================================

/// Repository for the users table
pub struct UserRepo;

impl UserRepo {
    /// Insert a user, returning the generated `user_id`
    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        exec: E,
        profile: &Profile,
    ) -> PersistenceResult<i64> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (name, id_card, phone, address, created_at)
             VALUES (?, ?, ?, ?, ?) RETURNING user_id",
        )
        .bind(&profile.name)
        .bind(&profile.id_card)
        .bind(&profile.phone)
        .bind(&profile.address)
        .bind(chrono::Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(user_id)
    }

    pub async fn get<'e, E: SqliteExecutor<'e>>(exec: E, user_id: i64) -> PersistenceResult<UserRow> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(exec)
            .await?
            .ok_or_else(|| PersistenceError::not_found("User", &user_id.to_string()))
    }

    /// Replace the identity fields of the user owning `card_number`.
    ///
    /// Returns `false` when no such card exists.
    pub async fn update_for_card<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
        profile: &Profile,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, id_card = ?, phone = ?, address = ?
             WHERE user_id = (SELECT user_id FROM cards WHERE card_number = ?)",
        )
        .bind(&profile.name)
        .bind(&profile.id_card)
        .bind(&profile.phone)
        .bind(&profile.address)
        .bind(card_number)
        .execute(exec)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Display name of the card's owner
    pub async fn name_for_card<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
    ) -> PersistenceResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>(
            "SELECT u.name FROM users u JOIN cards c ON c.user_id = u.user_id
             WHERE c.card_number = ?",
        )
        .bind(card_number)
        .fetch_optional(exec)
        .await?;
        Ok(name)
    }

    /// Exact match of the owner's name and phone
    pub async fn matches_identity<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
        name: &str,
        phone: &str,
    ) -> PersistenceResult<bool> {
        let hit = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users u JOIN cards c ON c.user_id = u.user_id
             WHERE c.card_number = ? AND u.name = ? AND u.phone = ?",
        )
        .bind(card_number)
        .bind(name)
        .bind(phone)
        .fetch_one(exec)
        .await?;
        Ok(hit > 0)
    }

    pub async fn count<'e, E: SqliteExecutor<'e>>(exec: E) -> PersistenceResult<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(exec)
            .await?;
        Ok(n)
    }
}

// ============================================================================
// Card Repository
// ============================================================================

/// Repository for the cards table (the account repository)
pub struct CardRepo;

impl CardRepo {
    pub async fn find<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
    ) -> PersistenceResult<Option<CardRow>> {
        let row = sqlx::query_as::<_, CardRow>("SELECT * FROM cards WHERE card_number = ?")
            .bind(card_number)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    pub async fn get<'e, E: SqliteExecutor<'e>>(exec: E, card_number: &str) -> PersistenceResult<CardRow> {
        Self::find(exec, card_number)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Card", card_number))
    }

    pub async fn exists<'e, E: SqliteExecutor<'e>>(exec: E, card_number: &str) -> PersistenceResult<bool> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cards WHERE card_number = ?")
            .bind(card_number)
            .fetch_one(exec)
            .await?;
        Ok(n > 0)
    }

    /// Committed balance, read without locking
    pub async fn get_balance<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
    ) -> PersistenceResult<Money> {
        let cents = sqlx::query_scalar::<_, i64>(
            "SELECT balance_cents FROM cards WHERE card_number = ?",
        )
        .bind(card_number)
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| PersistenceError::not_found("Card", card_number))?;
        Ok(Money::from_cents(cents)?)
    }

    /// Take the write lock on a card row and return it as seen under the lock.
    ///
    /// The no-op UPDATE makes SQLite acquire its write lock before anything
    /// is read, so the lock wait is bounded by the busy timeout and the
    /// returned balance cannot change until the transaction ends.
    /// `None` when the card does not exist.
    pub async fn lock(
        conn: &mut SqliteConnection,
        card_number: &str,
    ) -> PersistenceResult<Option<LockedCard>> {
        let row = sqlx::query_as::<_, LockedCardRow>(
            "UPDATE cards SET balance_cents = balance_cents WHERE card_number = ?
             RETURNING card_id, user_id, balance_cents, status",
        )
        .bind(card_number)
        .fetch_optional(&mut *conn)
        .await?;
        debug!(card = card_number, found = row.is_some(), "card row locked");
        row.map(LockedCard::try_from).transpose()
    }

    /// Apply a signed balance change as one conditional statement.
    ///
    /// The row is only written when the resulting balance stays at or above
    /// `minimum`; otherwise the card is re-read to tell a missing card from
    /// an insufficient balance.
    pub async fn adjust_balance(
        conn: &mut SqliteConnection,
        card_number: &str,
        adjustment: Adjustment,
        minimum: Money,
    ) -> PersistenceResult<Money> {
        let delta = adjustment.signed_cents();
        let updated = sqlx::query_scalar::<_, i64>(
            "UPDATE cards SET balance_cents = balance_cents + ?1
             WHERE card_number = ?2 AND balance_cents + ?1 >= ?3
             RETURNING balance_cents",
        )
        .bind(delta)
        .bind(card_number)
        .bind(minimum.cents())
        .fetch_optional(&mut *conn)
        .await?;

        match updated {
            Some(cents) => Ok(Money::from_cents(cents)?),
            None => {
                let available = Self::get_balance(&mut *conn, card_number).await?;
                Err(PersistenceError::InsufficientFunds {
                    needed: adjustment.amount().value(),
                    available: available.value(),
                })
            }
        }
    }

    /// Insert a card, returning the generated `card_id`
    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        exec: E,
        user_id: i64,
        card_number: &str,
        password_hash: &str,
        balance: Money,
    ) -> PersistenceResult<i64> {
        let card_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO cards (user_id, card_number, password_hash, balance_cents, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING card_id",
        )
        .bind(user_id)
        .bind(card_number)
        .bind(password_hash)
        .bind(balance.cents())
        .bind(CardStatus::Active.as_str())
        .bind(chrono::Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(card_id)
    }

    pub async fn set_status<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
        status: CardStatus,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query("UPDATE cards SET status = ? WHERE card_number = ?")
            .bind(status.as_str())
            .bind(card_number)
            .execute(exec)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password_hash<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
        password_hash: &str,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query("UPDATE cards SET password_hash = ? WHERE card_number = ?")
            .bind(password_hash)
            .bind(card_number)
            .execute(exec)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Owner identity joined with the card
    pub async fn get_profile<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
    ) -> PersistenceResult<Option<ProfileRow>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT u.name, u.id_card, u.phone, u.address,
                    c.card_number, c.balance_cents, c.status, c.created_at
             FROM cards c JOIN users u ON u.user_id = c.user_id
             WHERE c.card_number = ?",
        )
        .bind(card_number)
        .fetch_optional(exec)
        .await?;
        Ok(row)
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Repository for the append-only transactions table
pub struct TransactionRepo;

impl TransactionRepo {
    /// Append a ledger entry, returning its id
    pub async fn append<'e, E: SqliteExecutor<'e>>(
        exec: E,
        entry: &NewLedgerEntry,
    ) -> PersistenceResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO transactions (card_id, type, amount_cents, balance_after_cents, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(entry.card_id)
        .bind(entry.tx_type.as_str())
        .bind(entry.amount.cents())
        .bind(entry.balance_after.cents())
        .bind(&entry.description)
        .bind(entry.created_at)
        .fetch_one(exec)
        .await?;
        Ok(id)
    }

    /// Most recent entries of a card, newest first
    pub async fn history<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_number: &str,
        limit: u32,
    ) -> PersistenceResult<Vec<TransactionRow>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT t.* FROM transactions t JOIN cards c ON c.card_id = t.card_id
             WHERE c.card_number = ?
             ORDER BY t.created_at DESC, t.id DESC
             LIMIT ?",
        )
        .bind(card_number)
        .bind(i64::from(limit))
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }

    /// Every entry of a card in replay order
    pub async fn ledger<'e, E: SqliteExecutor<'e>>(
        exec: E,
        card_id: i64,
    ) -> PersistenceResult<Vec<TransactionRow>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE card_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(card_id)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }

    pub async fn count<'e, E: SqliteExecutor<'e>>(exec: E, card_id: i64) -> PersistenceResult<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE card_id = ?")
            .bind(card_id)
            .fetch_one(exec)
            .await?;
        Ok(n)
    }
}

// ============================================================================
// Message Repository
// ============================================================================

/// Repository for the messages table
pub struct MessageRepo;

impl MessageRepo {
    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        exec: E,
        message: &NewMessage,
    ) -> PersistenceResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO messages (recipient_card, sender_name, type, amount_cents, content, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?) RETURNING id",
        )
        .bind(&message.recipient_card)
        .bind(&message.sender_name)
        .bind(message.message_type.as_str())
        .bind(message.amount.cents())
        .bind(&message.content)
        .bind(message.created_at)
        .fetch_one(exec)
        .await?;
        Ok(id)
    }

    pub async fn get<'e, E: SqliteExecutor<'e>>(exec: E, id: i64) -> PersistenceResult<Option<MessageRow>> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    /// Inbox of a card, newest first
    pub async fn list_for<'e, E: SqliteExecutor<'e>>(
        exec: E,
        recipient_card: &str,
    ) -> PersistenceResult<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE recipient_card = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(recipient_card)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }

    /// Set `is_read`. SQLite counts matched rows, so marking an already
    /// read message still reports `true`; `false` means no such message.
    pub async fn mark_read<'e, E: SqliteExecutor<'e>>(exec: E, id: i64) -> PersistenceResult<bool> {
        let result = sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unread_count<'e, E: SqliteExecutor<'e>>(
        exec: E,
        recipient_card: &str,
    ) -> PersistenceResult<i64> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE recipient_card = ? AND is_read = 0",
        )
        .bind(recipient_card)
        .fetch_one(exec)
        .await?;
        Ok(n)
    }

    pub async fn count_for<'e, E: SqliteExecutor<'e>>(
        exec: E,
        recipient_card: &str,
    ) -> PersistenceResult<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE recipient_card = ?")
            .bind(recipient_card)
            .fetch_one(exec)
            .await?;
        Ok(n)
    }
}

// ============================================================================
// Database Initialization
// ============================================================================

/// Build a connection pool from config
pub async fn create_pool(config: &StoreConfig) -> PersistenceResult<SqlitePool> {
    config.validate()?;
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_with(config.connect_options()?)
        .await?;
    debug!(url = %config.url, max = config.max_connections, "pool created");
    Ok(pool)
}

/// Run migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Open (creating if needed) a database and bring its schema up to date
pub async fn init_database(config: &StoreConfig) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    info!(url = %config.url, "database ready");
    Ok(pool)
}
