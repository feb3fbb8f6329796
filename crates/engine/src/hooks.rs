//! Step hooks
//!
//! Every money-moving operation runs as one store transaction that walks
//! through `Started → Locked → Validated → Mutated → Logged → Committed`,
//! or ends in `RolledBack` from any step. A [`StepHook`] sees each step;
//! returning an error from `Locked`, `Validated`, `Mutated` or `Logged`
//! aborts the unit and rolls it back. That is how fault injection tests
//! force a failure between two sub-steps.

use std::fmt;
use thiserror::Error;

/// Operation a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Deposit,
    Withdraw,
    Transfer,
    OpenAccount,
    CloseAccount,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::Transfer => "transfer",
            Operation::OpenAccount => "open_account",
            Operation::CloseAccount => "close_account",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Started,
    /// Every touched card row is write-locked
    Locked,
    /// Business rules checked against the locked rows
    Validated,
    /// Balances (or rows) written
    Mutated,
    /// Ledger entries and messages appended
    Logged,
    Committed,
    RolledBack,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Started => "started",
            Step::Locked => "locked",
            Step::Validated => "validated",
            Step::Mutated => "mutated",
            Step::Logged => "logged",
            Step::Committed => "committed",
            Step::RolledBack => "rolled_back",
        }
    }

    /// Whether a hook error at this step aborts the operation
    pub fn can_abort(&self) -> bool {
        matches!(
            self,
            Step::Locked | Step::Validated | Step::Mutated | Step::Logged
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("hook aborted {operation} at step {step}: {reason}")]
pub struct HookError {
    pub operation: Operation,
    pub step: Step,
    pub reason: String,
}

impl HookError {
    pub fn new(operation: Operation, step: Step, reason: impl Into<String>) -> Self {
        Self {
            operation,
            step,
            reason: reason.into(),
        }
    }
}

/// Observer of operation steps
pub trait StepHook: Send + Sync {
    /// Called after each step. Errors are ignored for `Started`,
    /// `Committed` and `RolledBack`.
    fn on_step(&self, operation: Operation, step: Step) -> Result<(), HookError>;
}

/// Default hook that never interferes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHook;

impl StepHook for NoOpHook {
    fn on_step(&self, _operation: Operation, _step: Step) -> Result<(), HookError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abortable_steps() {
        assert!(Step::Mutated.can_abort());
        assert!(!Step::Started.can_abort());
        assert!(!Step::Committed.can_abort());
        assert!(!Step::RolledBack.can_abort());
    }

    #[test]
    fn test_hook_error_display() {
        let err = HookError::new(Operation::Transfer, Step::Logged, "injected");
        assert_eq!(
            err.to_string(),
            "hook aborted transfer at step logged: injected"
        );
        assert!(NoOpHook.on_step(Operation::Deposit, Step::Locked).is_ok());
    }
}
