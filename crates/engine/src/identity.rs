//! Identity verifier - login, identity checks, password reset, profile
//! updates and account closure

use crate::context::ServiceContext;
use crate::engine::duplicate_as_account;
use crate::error::{LedgerError, LedgerResult};
use crate::hooks::{Operation, Step};
use cardbank_core::{CardStatus, Money, Profile};
use cardbank_persistence::{CardRepo, UserRepo};
use sqlx::SqliteConnection;
use tracing::{info, warn};

/// Identity Verifier - compares submitted credentials with stored values
pub struct IdentityVerifier<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> IdentityVerifier<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// True iff the card exists, is active and the password matches.
    pub async fn verify_login(&self, card_number: &str, password: &str) -> LedgerResult<bool> {
        let card = self
            .ctx
            .run("verify_login", || async move {
                Ok::<_, LedgerError>(CardRepo::find(self.ctx.pool(), card_number).await?)
            })
            .await?;
        let Some(card) = card else {
            warn!(card = card_number, "login for unknown card");
            return Ok(false);
        };
        if card.status != CardStatus::Closed.as_str() {
            let ok = self
                .ctx
                .hasher()
                .spawn_verify(password, &card.password_hash)
                .await
                .map_err(LedgerError::internal)?;
            if !ok {
                warn!(card = card_number, "login with wrong password");
            }
            return Ok(ok);
        }
        warn!(card = card_number, "login for closed card");
        Ok(false)
    }

    /// True iff the stored name and phone of the card's owner match exactly.
    /// Unknown cards give `false`.
    pub async fn verify_identity(
        &self,
        card_number: &str,
        name: &str,
        phone: &str,
    ) -> LedgerResult<bool> {
        self.ctx
            .run("verify_identity", || async move {
                Ok::<_, LedgerError>(
                    UserRepo::matches_identity(self.ctx.pool(), card_number, name, phone).await?,
                )
            })
            .await
    }

    /// Replace the password hash. Callers verify identity first. `false`
    /// when the card does not exist, `AccountClosed` once it is closed.
    pub async fn update_password(&self, card_number: &str, new_password: &str) -> LedgerResult<bool> {
        if new_password.is_empty() {
            return Err(LedgerError::InvalidOperation(
                "password is required".to_string(),
            ));
        }
        if !self.ensure_open(card_number).await? {
            return Ok(false);
        }
        let hash = self
            .ctx
            .hasher()
            .spawn_hash(new_password)
            .await
            .map_err(LedgerError::internal)?;
        let hash = hash.as_str();
        let updated = self
            .ctx
            .run("update_password", || async move {
                Ok::<_, LedgerError>(
                    CardRepo::update_password_hash(self.ctx.pool(), card_number, hash).await?,
                )
            })
            .await?;
        if updated {
            info!(card = card_number, "password updated");
        }
        Ok(updated)
    }

    /// Identity-checked password reset
    pub async fn reset_password(
        &self,
        card_number: &str,
        name: &str,
        phone: &str,
        new_password: &str,
    ) -> LedgerResult<()> {
        if !self.verify_identity(card_number, name, phone).await? {
            warn!(card = card_number, "password reset with wrong identity");
            return Err(LedgerError::Unauthorized);
        }
        if !self.update_password(card_number, new_password).await? {
            return Err(LedgerError::AccountNotFound(card_number.to_string()));
        }
        Ok(())
    }

    /// Replace the owner's name, national ID, phone and address of an open
    /// card.
    pub async fn update_profile(&self, card_number: &str, profile: &Profile) -> LedgerResult<()> {
        if let Some(field) = profile.missing_field() {
            return Err(LedgerError::InvalidOperation(format!("{} is required", field)));
        }
        if !self.ensure_open(card_number).await? {
            return Err(LedgerError::AccountNotFound(card_number.to_string()));
        }
        let updated = self
            .ctx
            .run("update_profile", || async move {
                UserRepo::update_for_card(self.ctx.pool(), card_number, profile)
                    .await
                    .map_err(duplicate_as_account)
            })
            .await?;
        if !updated {
            return Err(LedgerError::AccountNotFound(card_number.to_string()));
        }
        info!(card = card_number, "profile updated");
        Ok(())
    }

    /// Check that the caller may close the card and report what is left on
    /// it. Fails with `Unauthorized` on identity mismatch and
    /// `AccountClosed` if it is already closed.
    pub async fn closure_check(
        &self,
        card_number: &str,
        name: &str,
        phone: &str,
    ) -> LedgerResult<Money> {
        if !self.verify_identity(card_number, name, phone).await? {
            return Err(LedgerError::Unauthorized);
        }
        let card = self
            .ctx
            .run("closure_check", || async move {
                Ok::<_, LedgerError>(CardRepo::get(self.ctx.pool(), card_number).await?)
            })
            .await?;
        if card.status == CardStatus::Closed.as_str() {
            return Err(LedgerError::AccountClosed(card_number.to_string()));
        }
        Ok(Money::from_cents(card.balance_cents)?)
    }

    /// Close a card after an identity check. User, card and ledger rows
    /// stay in place; only the status changes. Returns the balance left on
    /// the card at closing time.
    pub async fn close_account(&self, card_number: &str, name: &str, phone: &str) -> LedgerResult<Money> {
        let op = Operation::CloseAccount;
        let balance = self
            .ctx
            .run(op.as_str(), || async move {
                let mut tx = self.ctx.begin(op).await?;
                let result = self.apply_close(&mut tx, card_number, name, phone).await;
                self.ctx.finish(tx, op, result).await
            })
            .await?;
        info!(card = card_number, %balance, "account closed");
        Ok(balance)
    }

    /// `Ok(false)` for an unknown card, `AccountClosed` for a closed one
    async fn ensure_open(&self, card_number: &str) -> LedgerResult<bool> {
        let card = self
            .ctx
            .run("card_status", || async move {
                Ok::<_, LedgerError>(CardRepo::find(self.ctx.pool(), card_number).await?)
            })
            .await?;
        match card {
            None => Ok(false),
            Some(card) if card.status == CardStatus::Closed.as_str() => {
                Err(LedgerError::AccountClosed(card_number.to_string()))
            }
            Some(_) => Ok(true),
        }
    }

    async fn apply_close(
        &self,
        conn: &mut SqliteConnection,
        card_number: &str,
        name: &str,
        phone: &str,
    ) -> LedgerResult<Money> {
        let op = Operation::CloseAccount;
        let card = CardRepo::lock(conn, card_number)
            .await?
            .ok_or(LedgerError::Unauthorized)?;
        self.ctx.step(op, Step::Locked)?;

        if !UserRepo::matches_identity(&mut *conn, card_number, name, phone).await? {
            return Err(LedgerError::Unauthorized);
        }
        if card.status == CardStatus::Closed {
            return Err(LedgerError::AccountClosed(card_number.to_string()));
        }
        self.ctx.step(op, Step::Validated)?;

        CardRepo::set_status(&mut *conn, card_number, CardStatus::Closed).await?;
        self.ctx.step(op, Step::Mutated)?;

        Ok(card.balance)
    }
}
