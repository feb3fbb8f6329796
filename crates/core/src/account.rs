//! # Account Module
//!
//! A [`Card`] is the account a customer logs in with and moves money
//! through. Each card belongs to exactly one user, whose identity fields
//! are kept in a [`Profile`].

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Open for logins and money movement
    Active,
    /// Closed by its owner; history is kept, nothing else is allowed
    Closed,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Closed => "closed",
        }
    }
}

impl FromStr for CardStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "active" => Ok(CardStatus::Active),
            "closed" => Ok(CardStatus::Closed),
            other => Err(CoreError::invalid_enum("card status", other)),
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity fields of the user who owns a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    /// National ID number, unique across users
    pub id_card: String,
    pub phone: String,
    pub address: String,
}

impl Profile {
    pub fn new(name: &str, id_card: &str, phone: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            id_card: id_card.to_string(),
            phone: phone.to_string(),
            address: address.to_string(),
        }
    }

    /// Returns the name of the first required field that is blank.
    ///
    /// Address may be empty; every other field is required.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("name", &self.name),
            ("id_card", &self.id_card),
            ("phone", &self.phone),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }
}

/// A card (account) as seen by callers. The password hash never leaves
/// the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: i64,
    pub user_id: i64,
    pub card_number: String,
    pub balance: Money,
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_status_roundtrip() {
        for status in [CardStatus::Active, CardStatus::Closed] {
            assert_eq!(status.as_str().parse::<CardStatus>().unwrap(), status);
        }
        let err = "frozen".parse::<CardStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid card status value: frozen");
    }

    #[test]
    fn test_profile_missing_field() {
        let profile = Profile::new("Alice", "ID1", "555-0100", "");
        assert_eq!(profile.missing_field(), None);

        let profile = Profile::new("Alice", "  ", "555-0100", "Addr");
        assert_eq!(profile.missing_field(), Some("id_card"));
    }
}
