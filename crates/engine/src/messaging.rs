//! Messaging sink - inbox notices addressed to a card number

use crate::context::ServiceContext;
use crate::error::{LedgerError, LedgerResult};
use cardbank_core::{Message, MessageType, Money, SYSTEM_SENDER};
use cardbank_persistence::{CardRepo, MessageRepo, NewMessage};
use tracing::{debug, info};

/// Messaging Service - append, list and mark messages
pub struct MessagingService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MessagingService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Insert a message. No balance is touched.
    pub async fn append_message(
        &self,
        recipient_card: &str,
        sender_display: &str,
        message_type: MessageType,
        amount: Money,
        content: &str,
    ) -> LedgerResult<i64> {
        let message = NewMessage::new(recipient_card, sender_display, message_type, amount, content);
        let message = &message;
        let id = self
            .ctx
            .run("append_message", || async move {
                Ok::<_, LedgerError>(MessageRepo::insert(self.ctx.pool(), message).await?)
            })
            .await?;
        debug!(recipient = recipient_card, message_id = id, %message_type, "message appended");
        Ok(id)
    }

    /// Notice from the bank itself. A non-empty title is prefixed to the
    /// content as `"<title>: <content>"`.
    pub async fn send_system_message(
        &self,
        recipient_card: &str,
        title: &str,
        content: &str,
    ) -> LedgerResult<i64> {
        let exists = self
            .ctx
            .run("send_system_message", || async move {
                Ok::<_, LedgerError>(CardRepo::exists(self.ctx.pool(), recipient_card).await?)
            })
            .await?;
        if !exists {
            return Err(LedgerError::AccountNotFound(recipient_card.to_string()));
        }
        let content = system_content(title, content);
        let id = self
            .append_message(
                recipient_card,
                SYSTEM_SENDER,
                MessageType::System,
                Money::ZERO,
                &content,
            )
            .await?;
        info!(recipient = recipient_card, message_id = id, "system message sent");
        Ok(id)
    }

    /// Set `is_read`. Marking an already read message again still returns
    /// `true`; `false` means there is no such message.
    pub async fn mark_read(&self, message_id: i64) -> LedgerResult<bool> {
        self.ctx
            .run("mark_read", || async move {
                Ok::<_, LedgerError>(MessageRepo::mark_read(self.ctx.pool(), message_id).await?)
            })
            .await
    }

    pub async fn get(&self, message_id: i64) -> LedgerResult<Message> {
        let row = self
            .ctx
            .run("get_message", || async move {
                Ok::<_, LedgerError>(MessageRepo::get(self.ctx.pool(), message_id).await?)
            })
            .await?
            .ok_or(LedgerError::MessageNotFound(message_id))?;
        Ok(Message::try_from(row)?)
    }

    /// Inbox of a card, newest first
    pub async fn inbox(&self, recipient_card: &str) -> LedgerResult<Vec<Message>> {
        let rows = self
            .ctx
            .run("inbox", || async move {
                Ok::<_, LedgerError>(MessageRepo::list_for(self.ctx.pool(), recipient_card).await?)
            })
            .await?;
        rows.into_iter()
            .map(|row| Message::try_from(row).map_err(LedgerError::from))
            .collect()
    }

    pub async fn unread_count(&self, recipient_card: &str) -> LedgerResult<i64> {
        self.ctx
            .run("unread_count", || async move {
                Ok::<_, LedgerError>(
                    MessageRepo::unread_count(self.ctx.pool(), recipient_card).await?,
                )
            })
            .await
    }
}

fn system_content(title: &str, content: &str) -> String {
    if title.is_empty() {
        content.to_string()
    } else {
        format!("{}: {}", title, content)
    }
}
