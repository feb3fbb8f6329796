//! # Message Module
//!
//! Inbox notifications addressed to a card number. Messages are linked to
//! a card by value only; they are not owned by the card row.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sender name shown for anonymous transfers
pub const ANONYMOUS_SENDER: &str = "anonymous";

/// Sender name used for system notices
pub const SYSTEM_SENDER: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Incoming transfer notice
    Transfer,
    /// Notice generated by the bank itself
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Transfer => "transfer",
            MessageType::System => "system",
        }
    }
}

impl FromStr for MessageType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "transfer" => Ok(MessageType::Transfer),
            "system" => Ok(MessageType::System),
            other => Err(CoreError::invalid_enum("message type", other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub recipient_card: String,
    pub sender_name: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Zero for system messages
    pub amount: Money,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
