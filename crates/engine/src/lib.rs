//! # Cardbank Engine
//!
//! The transactional core of Cardbank.
//!
//! ## Services
//!
//! - [`TransactionEngine`]: deposit, withdraw, transfer, open account
//! - [`AccountService`]: balance, profile, history, ledger audit
//! - [`MessagingService`]: inbox notices
//! - [`IdentityVerifier`]: login, identity checks, password reset, closure
//!
//! All services borrow one [`ServiceContext`], which owns the connection
//! pool, the step hook, the password hasher and the retry policy.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cardbank_engine::{SecurityConfig, ServiceContext, TransactionEngine};
//! use cardbank_persistence::{Database, StoreConfig};
//!
//! let db = Database::init(&StoreConfig::for_path("cardbank.db")).await?;
//! let ctx = ServiceContext::new(&db, &SecurityConfig::default())?;
//! let receipt = TransactionEngine::new(&ctx).deposit("CARD001", dec!(50.00)).await?;
//! ctx.close().await;
//! ```

pub mod account;
pub mod context;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod messaging;
pub mod password;

pub use account::{AccountProfile, AccountService, LedgerAudit, DEFAULT_HISTORY_LIMIT};
pub use context::{RetryPolicy, ServiceContext};
pub use engine::{
    OpenAccountRequest, OpenedAccount, Receipt, TransactionEngine, TransferReceipt,
    TransferRequest,
};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use hooks::{HookError, NoOpHook, Operation, Step, StepHook};
pub use identity::IdentityVerifier;
pub use messaging::MessagingService;
pub use password::{PasswordError, PasswordHasher, SecurityConfig};
