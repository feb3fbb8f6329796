//! SQLite persistence module
//!
//! Repository pattern for SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, init_database, run_migrations, CardRepo, MessageRepo, TransactionRepo, UserRepo,
};
pub use schema::{
    Adjustment, CardRow, LockedCard, MessageRow, NewLedgerEntry, NewMessage, ProfileRow,
    TransactionRow, UserRow,
};
