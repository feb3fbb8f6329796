//! Fault injection at every step of every money operation
//!
//! A hook error after `Locked`, `Validated`, `Mutated` or `Logged` must
//! leave users, cards, ledger and messages exactly as they were.

mod common;

use cardbank_engine::{
    AccountService, HookError, LedgerError, Operation, Step, StepHook, TransactionEngine,
    TransferRequest,
};
use common::{count, open, open_request, setup};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

/// Fails one operation at one step
struct FailAt {
    operation: Operation,
    step: Step,
}

impl StepHook for FailAt {
    fn on_step(&self, operation: Operation, step: Step) -> Result<(), HookError> {
        if operation == self.operation && step == self.step {
            return Err(HookError::new(operation, step, "injected fault"));
        }
        Ok(())
    }
}

/// Records every step it sees
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(Operation, Step)>>,
}

impl StepHook for Recorder {
    fn on_step(&self, operation: Operation, step: Step) -> Result<(), HookError> {
        self.seen.lock().unwrap().push((operation, step));
        Ok(())
    }
}

const ABORTABLE: [Step; 4] = [Step::Locked, Step::Validated, Step::Mutated, Step::Logged];

#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    users: i64,
    cards: i64,
    entries: i64,
    messages: i64,
    balances: Vec<i64>,
}

async fn snapshot(ctx: &cardbank_engine::ServiceContext) -> Snapshot {
    let balances = sqlx::query_scalar::<_, i64>(
        "SELECT balance_cents FROM cards ORDER BY card_number",
    )
    .fetch_all(ctx.pool())
    .await
    .unwrap();
    Snapshot {
        users: count(ctx, "SELECT COUNT(*) FROM users").await,
        cards: count(ctx, "SELECT COUNT(*) FROM cards").await,
        entries: count(ctx, "SELECT COUNT(*) FROM transactions").await,
        messages: count(ctx, "SELECT COUNT(*) FROM messages").await,
        balances,
    }
}

async fn run(ctx: &cardbank_engine::ServiceContext, operation: Operation) -> Result<(), LedgerError> {
    let engine = TransactionEngine::new(ctx);
    match operation {
        Operation::Deposit => engine.deposit("CARD001", dec!(5.00)).await.map(|_| ()),
        Operation::Withdraw => engine.withdraw("CARD001", dec!(5.00)).await.map(|_| ()),
        Operation::Transfer => engine
            .transfer(&TransferRequest {
                source: "CARD001".to_string(),
                destination: "CARD002".to_string(),
                amount: dec!(5.00),
                note: "rent".to_string(),
                anonymous: false,
            })
            .await
            .map(|_| ()),
        Operation::OpenAccount => engine
            .open_account(&open_request("Carol", "ID3", "CARD003", dec!(5.00)))
            .await
            .map(|_| ()),
        Operation::CloseAccount => cardbank_engine::IdentityVerifier::new(ctx)
            .close_account("CARD001", "Alice", "555-0100")
            .await
            .map(|_| ()),
    }
}

#[tokio::test]
async fn test_failure_at_each_step_rolls_back() {
    let operations = [
        Operation::Deposit,
        Operation::Withdraw,
        Operation::Transfer,
        Operation::OpenAccount,
        Operation::CloseAccount,
    ];
    for operation in operations {
        for step in ABORTABLE {
            // close has no ledger step
            if operation == Operation::CloseAccount && step == Step::Logged {
                continue;
            }
            let (_dir, ctx) = setup().await;
            open(&ctx, "Alice", "ID1", "CARD001", dec!(100.00)).await;
            open(&ctx, "Bob", "ID2", "CARD002", dec!(0)).await;
            let before = snapshot(&ctx).await;

            let ctx = ctx.with_hook(Arc::new(FailAt { operation, step }));
            let err = run(&ctx, operation).await.unwrap_err();
            assert!(
                matches!(err, LedgerError::Internal(_)),
                "{operation} at {step}: {err:?}"
            );
            assert!(!err.is_retryable());

            assert_eq!(snapshot(&ctx).await, before, "{operation} at {step}");
            let status: String =
                sqlx::query_scalar("SELECT status FROM cards WHERE card_number = 'CARD001'")
                    .fetch_one(ctx.pool())
                    .await
                    .unwrap();
            assert_eq!(status, "active");

            // the same operation succeeds once the fault is gone
            let ctx = ctx.with_hook(Arc::new(cardbank_engine::NoOpHook));
            run(&ctx, operation).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_step_sequence() {
    let (_dir, ctx) = setup().await;
    open(&ctx, "Alice", "ID1", "CARD001", dec!(100.00)).await;

    let recorder = Arc::new(Recorder::default());
    let ctx = ctx.with_hook(recorder.clone());
    TransactionEngine::new(&ctx)
        .deposit("CARD001", dec!(1.00))
        .await
        .unwrap();
    let _ = TransactionEngine::new(&ctx)
        .withdraw("CARD001", dec!(1000.00))
        .await
        .unwrap_err();

    let seen = recorder.seen.lock().unwrap().clone();
    let deposit: Vec<Step> = seen
        .iter()
        .filter(|(op, _)| *op == Operation::Deposit)
        .map(|(_, step)| *step)
        .collect();
    assert_eq!(
        deposit,
        vec![
            Step::Started,
            Step::Locked,
            Step::Validated,
            Step::Mutated,
            Step::Logged,
            Step::Committed
        ]
    );
    let withdraw: Vec<Step> = seen
        .iter()
        .filter(|(op, _)| *op == Operation::Withdraw)
        .map(|(_, step)| *step)
        .collect();
    assert_eq!(withdraw, vec![Step::Started, Step::Locked, Step::RolledBack]);

    let accounts = AccountService::new(&ctx);
    assert_eq!(accounts.balance("CARD001").await.unwrap().value(), dec!(101.00));
}
