//! Transaction engine - deposit, withdraw, transfer, open account
//!
//! Each operation is one store transaction. The first statement of every
//! unit is a write on the card row(s) involved, so the store's write lock
//! is held from the start and released only at commit or rollback.
//! Concurrent callers on the same card queue on that lock for at most the
//! configured lock timeout.

use crate::context::ServiceContext;
use crate::error::{LedgerError, LedgerResult};
use crate::hooks::{Operation, Step};
use cardbank_core::{
    CardStatus, MessageType, Money, Profile, TransactionType, ANONYMOUS_SENDER,
};
use cardbank_persistence::{
    Adjustment, CardRepo, LockedCard, MessageRepo, NewLedgerEntry, NewMessage, PersistenceError,
    TransactionRepo, UserRepo,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

/// Result of a deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub card_number: String,
    pub amount: Money,
    /// Balance right after the operation
    pub balance: Money,
    pub entry_id: i64,
}

/// Result of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub source_card: String,
    pub destination_card: String,
    pub amount: Money,
    pub source_balance: Money,
    pub destination_balance: Money,
    pub debit_entry_id: i64,
    pub credit_entry_id: i64,
    pub message_id: i64,
}

/// Result of opening an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedAccount {
    pub user_id: i64,
    pub card_id: i64,
    pub card_number: String,
    pub balance: Money,
    pub entry_id: i64,
}

/// Request to open an account
#[derive(Debug, Clone)]
pub struct OpenAccountRequest {
    pub profile: Profile,
    pub card_number: String,
    pub password: String,
    pub initial_deposit: Decimal,
}

/// Request to move money between two cards
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: String,
    pub destination: String,
    pub amount: Decimal,
    pub note: String,
    /// Hide the sender's name from the recipient
    pub anonymous: bool,
}

/// Transaction Engine - all-or-nothing money operations
pub struct TransactionEngine<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransactionEngine<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Credit `amount` to a card. Returns the new balance.
    #[instrument(skip(self), fields(op = "deposit"))]
    pub async fn deposit(&self, card_number: &str, amount: Decimal) -> LedgerResult<Receipt> {
        let amount = Money::positive(amount)?;
        let receipt = self
            .ctx
            .run(Operation::Deposit.as_str(), || {
                self.single(Operation::Deposit, card_number, amount)
            })
            .await?;
        info!(card = card_number, %amount, balance = %receipt.balance, "deposit committed");
        Ok(receipt)
    }

    /// Debit `amount` from a card. Fails without any change when the
    /// balance does not cover it.
    #[instrument(skip(self), fields(op = "withdraw"))]
    pub async fn withdraw(&self, card_number: &str, amount: Decimal) -> LedgerResult<Receipt> {
        let amount = Money::positive(amount)?;
        let receipt = self
            .ctx
            .run(Operation::Withdraw.as_str(), || {
                self.single(Operation::Withdraw, card_number, amount)
            })
            .await?;
        info!(card = card_number, %amount, balance = %receipt.balance, "withdrawal committed");
        Ok(receipt)
    }

    /// Move money between two cards, logging both sides and notifying the
    /// recipient.
    ///
    /// Both card rows are locked in ascending card number order whatever the
    /// direction, so two transfers between the same pair can never wait on
    /// each other in a cycle.
    #[instrument(skip(self, request), fields(op = "transfer", source = %request.source, destination = %request.destination))]
    pub async fn transfer(&self, request: &TransferRequest) -> LedgerResult<TransferReceipt> {
        if request.source == request.destination {
            return Err(LedgerError::InvalidOperation(
                "cannot transfer to the same card".to_string(),
            ));
        }
        if request.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidOperation(format!(
                "transfer amount must be positive: {}",
                request.amount
            )));
        }
        let amount = Money::positive(request.amount)?;

        let receipt = self
            .ctx
            .run(Operation::Transfer.as_str(), || self.transfer_once(request, amount))
            .await?;
        info!(
            source = %request.source,
            destination = %request.destination,
            %amount,
            source_balance = %receipt.source_balance,
            destination_balance = %receipt.destination_balance,
            "transfer committed"
        );
        Ok(receipt)
    }

    /// Create the user, the card and its opening ledger entry together.
    #[instrument(skip(self, request), fields(op = "open_account", card = %request.card_number))]
    pub async fn open_account(&self, request: &OpenAccountRequest) -> LedgerResult<OpenedAccount> {
        if let Some(field) = request.profile.missing_field() {
            return Err(LedgerError::InvalidOperation(format!("{} is required", field)));
        }
        if request.card_number.trim().is_empty() {
            return Err(LedgerError::InvalidOperation(
                "card number is required".to_string(),
            ));
        }
        if request.password.is_empty() {
            return Err(LedgerError::InvalidOperation(
                "password is required".to_string(),
            ));
        }
        let initial = Money::new(request.initial_deposit)?;
        // hashed before the transaction so no lock is held while it runs
        let password_hash = self
            .ctx
            .hasher()
            .spawn_hash(&request.password)
            .await
            .map_err(LedgerError::internal)?;

        let opened = self
            .ctx
            .run(Operation::OpenAccount.as_str(), || {
                self.open_once(request, initial, &password_hash)
            })
            .await?;
        info!(
            card = %opened.card_number,
            user_id = opened.user_id,
            balance = %opened.balance,
            "account opened"
        );
        Ok(opened)
    }

    // === Units of work ===

    async fn single(
        &self,
        op: Operation,
        card_number: &str,
        amount: Money,
    ) -> LedgerResult<Receipt> {
        let mut tx = self.ctx.begin(op).await?;
        let result = self.apply_single(&mut tx, op, card_number, amount).await;
        self.ctx.finish(tx, op, result).await
    }

    async fn apply_single(
        &self,
        conn: &mut SqliteConnection,
        op: Operation,
        card_number: &str,
        amount: Money,
    ) -> LedgerResult<Receipt> {
        let (adjustment, tx_type, description) = match op {
            Operation::Withdraw => (
                Adjustment::Debit(amount),
                TransactionType::Withdraw,
                "withdrawal",
            ),
            _ => (Adjustment::Credit(amount), TransactionType::Deposit, "deposit"),
        };

        let card = CardRepo::lock(conn, card_number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(card_number.to_string()))?;
        self.ctx.step(op, Step::Locked)?;

        ensure_active(&card, card_number)?;
        if let Adjustment::Debit(needed) = adjustment {
            ensure_covers(&card, needed)?;
        }
        self.ctx.step(op, Step::Validated)?;

        let balance = CardRepo::adjust_balance(conn, card_number, adjustment, Money::ZERO).await?;
        self.ctx.step(op, Step::Mutated)?;

        let entry = NewLedgerEntry::new(card.card_id, tx_type, amount, balance, description);
        let entry_id = TransactionRepo::append(&mut *conn, &entry).await?;
        self.ctx.step(op, Step::Logged)?;

        Ok(Receipt {
            card_number: card_number.to_string(),
            amount,
            balance,
            entry_id,
        })
    }

    async fn transfer_once(
        &self,
        request: &TransferRequest,
        amount: Money,
    ) -> LedgerResult<TransferReceipt> {
        let op = Operation::Transfer;
        let mut tx = self.ctx.begin(op).await?;
        let result = self.apply_transfer(&mut tx, request, amount).await;
        self.ctx.finish(tx, op, result).await
    }

    async fn apply_transfer(
        &self,
        conn: &mut SqliteConnection,
        request: &TransferRequest,
        amount: Money,
    ) -> LedgerResult<TransferReceipt> {
        let op = Operation::Transfer;
        let source_card = request.source.as_str();
        let destination_card = request.destination.as_str();

        let (source, destination) = if source_card < destination_card {
            let source = CardRepo::lock(conn, source_card).await?;
            let destination = CardRepo::lock(conn, destination_card).await?;
            (source, destination)
        } else {
            let destination = CardRepo::lock(conn, destination_card).await?;
            let source = CardRepo::lock(conn, source_card).await?;
            (source, destination)
        };
        self.ctx.step(op, Step::Locked)?;

        let source = source.ok_or_else(|| LedgerError::SourceNotFound(source_card.to_string()))?;
        ensure_active(&source, source_card)?;
        ensure_covers(&source, amount)?;
        let destination = destination
            .ok_or_else(|| LedgerError::DestinationNotFound(destination_card.to_string()))?;
        ensure_active(&destination, destination_card)?;
        self.ctx.step(op, Step::Validated)?;

        let source_balance =
            CardRepo::adjust_balance(conn, source_card, Adjustment::Debit(amount), Money::ZERO)
                .await?;
        let destination_balance = CardRepo::adjust_balance(
            conn,
            destination_card,
            Adjustment::Credit(amount),
            Money::ZERO,
        )
        .await?;
        self.ctx.step(op, Step::Mutated)?;

        let sender = if request.anonymous {
            ANONYMOUS_SENDER.to_string()
        } else {
            UserRepo::name_for_card(&mut *conn, source_card)
                .await?
                .ok_or_else(|| LedgerError::SourceNotFound(source_card.to_string()))?
        };

        let debit = NewLedgerEntry::new(
            source.card_id,
            TransactionType::Withdraw,
            amount,
            source_balance,
            format!("transfer to {}", destination_card),
        );
        let debit_entry_id = TransactionRepo::append(&mut *conn, &debit).await?;

        let credit = NewLedgerEntry::new(
            destination.card_id,
            TransactionType::Deposit,
            amount,
            destination_balance,
            format!("transfer from {}", sender),
        );
        let credit_entry_id = TransactionRepo::append(&mut *conn, &credit).await?;

        let message = NewMessage::new(
            destination_card,
            &sender,
            MessageType::Transfer,
            amount,
            &request.note,
        );
        let message_id = MessageRepo::insert(&mut *conn, &message).await?;
        self.ctx.step(op, Step::Logged)?;

        Ok(TransferReceipt {
            source_card: source_card.to_string(),
            destination_card: destination_card.to_string(),
            amount,
            source_balance,
            destination_balance,
            debit_entry_id,
            credit_entry_id,
            message_id,
        })
    }

    async fn open_once(
        &self,
        request: &OpenAccountRequest,
        initial: Money,
        password_hash: &str,
    ) -> LedgerResult<OpenedAccount> {
        let op = Operation::OpenAccount;
        let mut tx = self.ctx.begin(op).await?;
        let result = self.apply_open(&mut tx, request, initial, password_hash).await;
        self.ctx.finish(tx, op, result).await
    }

    async fn apply_open(
        &self,
        conn: &mut SqliteConnection,
        request: &OpenAccountRequest,
        initial: Money,
        password_hash: &str,
    ) -> LedgerResult<OpenedAccount> {
        let op = Operation::OpenAccount;
        let card_number = request.card_number.as_str();

        // The user insert is the first write and takes the store lock.
        let user_id = UserRepo::insert(&mut *conn, &request.profile)
            .await
            .map_err(duplicate_as_account)?;
        self.ctx.step(op, Step::Locked)?;

        if CardRepo::exists(&mut *conn, card_number).await? {
            return Err(LedgerError::DuplicateAccount);
        }
        self.ctx.step(op, Step::Validated)?;

        let card_id = CardRepo::insert(&mut *conn, user_id, card_number, password_hash, initial)
            .await
            .map_err(duplicate_as_account)?;
        self.ctx.step(op, Step::Mutated)?;

        let entry = NewLedgerEntry::new(
            card_id,
            TransactionType::Open,
            initial,
            initial,
            "account opened",
        );
        let entry_id = TransactionRepo::append(&mut *conn, &entry).await?;
        self.ctx.step(op, Step::Logged)?;

        Ok(OpenedAccount {
            user_id,
            card_id,
            card_number: card_number.to_string(),
            balance: initial,
            entry_id,
        })
    }
}

fn ensure_active(card: &LockedCard, card_number: &str) -> LedgerResult<()> {
    if card.status == CardStatus::Closed {
        return Err(LedgerError::AccountClosed(card_number.to_string()));
    }
    Ok(())
}

fn ensure_covers(card: &LockedCard, needed: Money) -> LedgerResult<()> {
    if card.balance < needed {
        return Err(LedgerError::insufficient_funds(
            needed.value(),
            card.balance.value(),
        ));
    }
    Ok(())
}

/// Unique violations on `users.id_card` or `cards.card_number`
pub(crate) fn duplicate_as_account(err: PersistenceError) -> LedgerError {
    if err.is_unique_violation() {
        LedgerError::DuplicateAccount
    } else {
        err.into()
    }
}
