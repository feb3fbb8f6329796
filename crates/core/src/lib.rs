//! # Cardbank Core
//!
//! Domain types shared by every layer of Cardbank. Nothing in this crate
//! touches the database; it only describes cards, money and ledger entries
//! and the rules that hold between them.
//!
//! ## Modules
//!
//! - [`money`]: fixed-point [`Money`] with exactly two decimal places
//! - [`account`]: [`Card`], [`CardStatus`] and the owner [`Profile`]
//! - [`ledger`]: append-only [`LedgerEntry`] and balance [`replay`](ledger::replay)
//! - [`message`]: inbox [`Message`] records
//! - [`error`]: [`CoreError`]

pub mod account;
pub mod error;
pub mod ledger;
pub mod message;
pub mod money;

pub use account::{Card, CardStatus, Profile};
pub use error::{CoreError, CoreResult};
pub use ledger::{LedgerEntry, TransactionType};
pub use message::{Message, MessageType, ANONYMOUS_SENDER, SYSTEM_SENDER};
pub use money::Money;
