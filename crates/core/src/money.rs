//! # Money Module
//!
//! Fixed-point currency amounts backed by `rust_decimal::Decimal`.
//!
//! Every [`Money`] value is non-negative and carries exactly two decimal
//! places. Values with finer precision are rejected instead of rounded, so
//! repeated deposits and withdrawals can never drift.

use crate::error::{CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places kept for every amount and balance.
pub const SCALE: u32 = 2;

/// A non-negative amount of money with two decimal places.
///
/// # Invariant
/// The inner value is `>= 0`, has scale [`SCALE`] and its minor units
/// (cents) fit in an `i64`. All constructors enforce this.
///
/// # Example
/// ```
/// use cardbank_core::Money;
/// use rust_decimal::Decimal;
///
/// let m = Money::new(Decimal::new(1050, 2)).unwrap();
/// assert_eq!(m.cents(), 1050);
/// assert_eq!(m.to_string(), "10.50");
///
/// assert!(Money::new(Decimal::new(-1, 0)).is_err());
/// assert!(Money::new(Decimal::new(1005, 3)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero, already at scale 2
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// Create Money from a decimal value.
    ///
    /// Fails for negative values, values with more than two decimal places
    /// and values whose cents do not fit in an `i64`.
    pub fn new(value: Decimal) -> CoreResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(CoreError::InvalidAmount(format!(
                "amount cannot be negative: {}",
                value
            )));
        }
        if value.round_dp(SCALE) != value {
            return Err(CoreError::TooPrecise(value));
        }

        let mut scaled = value;
        scaled.rescale(SCALE);
        if i64::try_from(scaled.mantissa()).is_err() {
            return Err(CoreError::OutOfRange(value));
        }
        // -0 normalizes to 0
        scaled.set_sign_positive(true);
        Ok(Self(scaled))
    }

    /// Create Money that must be strictly positive (a transaction amount).
    pub fn positive(value: Decimal) -> CoreResult<Self> {
        let money = Self::new(value)?;
        if money.is_zero() {
            return Err(CoreError::InvalidAmount(
                "amount must be greater than zero".to_string(),
            ));
        }
        Ok(money)
    }

    /// Create Money from minor units as stored in the database.
    pub fn from_cents(cents: i64) -> CoreResult<Self> {
        if cents < 0 {
            return Err(CoreError::InvalidAmount(format!(
                "amount cannot be negative: {} cents",
                cents
            )));
        }
        Ok(Self(Decimal::new(cents, SCALE)))
    }

    /// Minor units (cents) of this amount
    pub fn cents(&self) -> i64 {
        // scale is fixed at 2 and range-checked on construction
        self.0.mantissa() as i64
    }

    /// The inner Decimal value
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Addition; `None` if the result no longer fits in `i64` cents
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents()
            .checked_add(other.cents())
            .and_then(|c| Self::from_cents(c).ok())
    }

    /// Subtraction; `None` if the result would be negative
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.cents()
            .checked_sub(other.cents())
            .and_then(|c| Self::from_cents(c).ok())
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl FromStr for Money {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| CoreError::InvalidAmount(format!("{}: {}", s, e)))?;
        Self::new(value)
    }
}
