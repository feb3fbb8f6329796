//! Service context
//!
//! Explicitly constructed handle shared by every service: the connection
//! pool, the step hook, the password hasher and the retry policy. There is
//! no global store handle; build one context at startup and call
//! [`ServiceContext::close`] on shutdown.

use crate::error::{LedgerError, LedgerResult};
use crate::hooks::{NoOpHook, Operation, Step, StepHook};
use crate::password::{PasswordHasher, SecurityConfig};
use cardbank_persistence::Database;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Automatic retries for transient store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_retries: 0 }
    }
}

/// Context for engine operations
#[derive(Clone)]
pub struct ServiceContext {
    pool: SqlitePool,
    hook: Arc<dyn StepHook>,
    hasher: PasswordHasher,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ServiceContext {
    /// Create a context from an opened database
    pub fn new(db: &Database, security: &SecurityConfig) -> LedgerResult<Self> {
        let hasher = PasswordHasher::new(security).map_err(LedgerError::internal)?;
        Ok(Self::from_parts(db.pool().clone(), hasher))
    }

    pub fn from_parts(pool: SqlitePool, hasher: PasswordHasher) -> Self {
        Self {
            pool,
            hook: Arc::new(NoOpHook),
            hasher,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn StepHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Close the pool. Later operations fail with `StoreUnavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Report an abortable step to the hook
    pub(crate) fn step(&self, operation: Operation, step: Step) -> LedgerResult<()> {
        debug!(%operation, %step, "step");
        self.hook.on_step(operation, step).map_err(|err| {
            warn!(%operation, %step, reason = %err.reason, "hook aborted operation");
            LedgerError::internal(err)
        })
    }

    /// Report a step the hook cannot veto
    pub(crate) fn notify(&self, operation: Operation, step: Step) {
        debug!(%operation, %step, "step");
        if let Err(err) = self.hook.on_step(operation, step) {
            debug!(%operation, %step, reason = %err.reason, "hook error ignored");
        }
    }

    /// Open a transaction for `operation`
    pub(crate) async fn begin(&self, operation: Operation) -> LedgerResult<Transaction<'static, Sqlite>> {
        let tx = self.pool.begin().await?;
        self.notify(operation, Step::Started);
        Ok(tx)
    }

    /// Commit on success, roll back on failure
    pub(crate) async fn finish<T>(
        &self,
        tx: Transaction<'static, Sqlite>,
        operation: Operation,
        result: LedgerResult<T>,
    ) -> LedgerResult<T> {
        match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    self.notify(operation, Step::Committed);
                    Ok(value)
                }
                Err(err) => {
                    let err = LedgerError::from(err);
                    error!(%operation, error = ?err, "commit failed");
                    self.notify(operation, Step::RolledBack);
                    Err(err)
                }
            },
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    error!(%operation, error = %rollback, "rollback failed");
                }
                self.notify(operation, Step::RolledBack);
                if err.is_rejection() {
                    warn!(%operation, error = %err, "operation rejected, rolled back");
                } else {
                    error!(%operation, error = ?err, "operation failed, rolled back");
                }
                Err(err)
            }
        }
    }

    /// Run `attempt`, retrying transient store failures per the policy.
    ///
    /// Each attempt must open its own transaction so a retry gets a fresh
    /// pooled connection.
    pub(crate) async fn run<T, F, Fut>(&self, label: &str, mut attempt: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_transient() && retries < self.retry.max_retries => {
                    retries += 1;
                    warn!(operation = label, retry = retries, error = ?err, "transient store failure, retrying");
                }
                other => return other,
            }
        }
    }
}
