//! Read-side account queries
//!
//! Plain reads run without row locks and only see committed state.

use crate::context::ServiceContext;
use crate::error::{LedgerError, LedgerResult};
use cardbank_core::ledger::replay;
use cardbank_core::{CardStatus, LedgerEntry, Money, Profile};
use cardbank_persistence::{CardRepo, TransactionRepo, UserRepo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Number of entries returned by [`AccountService::history`] by default
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Owner identity together with the card's current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountProfile {
    #[serde(flatten)]
    pub profile: Profile,
    pub card_number: String,
    pub balance: Money,
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome of replaying a card's ledger against its stored balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub card_number: String,
    pub entries: usize,
    pub stored: Money,
    /// `None` when the chain of `balance_after` values is broken
    pub replayed: Option<Money>,
    pub consistent: bool,
    pub issue: Option<String>,
}

/// Account Service - balances, profiles, history, audit
pub struct AccountService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AccountService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn balance(&self, card_number: &str) -> LedgerResult<Money> {
        self.ctx
            .run("balance", || async move {
                Ok::<_, LedgerError>(CardRepo::get_balance(self.ctx.pool(), card_number).await?)
            })
            .await
    }

    pub async fn exists(&self, card_number: &str) -> LedgerResult<bool> {
        self.ctx
            .run("exists", || async move {
                Ok::<_, LedgerError>(CardRepo::exists(self.ctx.pool(), card_number).await?)
            })
            .await
    }

    /// Display name of the card's owner
    pub async fn owner_name(&self, card_number: &str) -> LedgerResult<String> {
        self.ctx
            .run("owner_name", || async move {
                UserRepo::name_for_card(self.ctx.pool(), card_number)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(card_number.to_string()))
            })
            .await
    }

    pub async fn profile(&self, card_number: &str) -> LedgerResult<AccountProfile> {
        self.ctx
            .run("profile", || async move {
                let row = CardRepo::get_profile(self.ctx.pool(), card_number)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(card_number.to_string()))?;
                Ok::<_, LedgerError>(AccountProfile {
                    profile: Profile::from(&row),
                    card_number: row.card_number,
                    balance: Money::from_cents(row.balance_cents)?,
                    status: row.status.parse()?,
                    created_at: row.created_at,
                })
            })
            .await
    }

    /// Most recent ledger entries, newest first. `limit` defaults to
    /// [`DEFAULT_HISTORY_LIMIT`].
    pub async fn history(
        &self,
        card_number: &str,
        limit: Option<u32>,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        self.ctx
            .run("history", || async move {
                if !CardRepo::exists(self.ctx.pool(), card_number).await? {
                    return Err(LedgerError::AccountNotFound(card_number.to_string()));
                }
                let rows = TransactionRepo::history(self.ctx.pool(), card_number, limit).await?;
                rows.into_iter()
                    .map(|row| LedgerEntry::try_from(row).map_err(LedgerError::from))
                    .collect::<LedgerResult<Vec<_>>>()
            })
            .await
    }

    /// Every ledger entry of a card, oldest first
    pub async fn ledger(&self, card_number: &str) -> LedgerResult<Vec<LedgerEntry>> {
        self.ctx
            .run("ledger", || async move {
                let card = CardRepo::find(self.ctx.pool(), card_number)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(card_number.to_string()))?;
                let rows = TransactionRepo::ledger(self.ctx.pool(), card.card_id).await?;
                rows.into_iter()
                    .map(|row| LedgerEntry::try_from(row).map_err(LedgerError::from))
                    .collect::<LedgerResult<Vec<_>>>()
            })
            .await
    }

    /// Replay the full ledger and compare with the stored balance.
    ///
    /// Balance and ledger are read in one transaction so a concurrent
    /// commit cannot show up in only one of them.
    pub async fn audit(&self, card_number: &str) -> LedgerResult<LedgerAudit> {
        let audit = self
            .ctx
            .run("audit", || async move {
                let mut tx = self.ctx.pool().begin().await?;
                let card = CardRepo::find(&mut *tx, card_number)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(card_number.to_string()))?;
                let rows = TransactionRepo::ledger(&mut *tx, card.card_id).await?;
                tx.commit().await?;

                let stored = Money::from_cents(card.balance_cents)?;
                let entries = rows
                    .into_iter()
                    .map(LedgerEntry::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, LedgerError>(build_audit(card_number, stored, &entries))
            })
            .await?;

        if !audit.consistent {
            warn!(card = card_number, issue = ?audit.issue, "ledger audit failed");
        }
        Ok(audit)
    }
}

fn build_audit(card_number: &str, stored: Money, entries: &[LedgerEntry]) -> LedgerAudit {
    let (replayed, issue) = match replay(entries) {
        Ok(balance) if balance == stored => (Some(balance), None),
        Ok(balance) => (
            Some(balance),
            Some(format!(
                "stored balance {} differs from replayed balance {}",
                stored, balance
            )),
        ),
        Err(err) => (None, Some(err.to_string())),
    };
    LedgerAudit {
        card_number: card_number.to_string(),
        entries: entries.len(),
        stored,
        replayed,
        consistent: issue.is_none(),
        issue,
    }
}
