//! # Card Number Module
//!
//! Provides the `CardNumber` type: the fixed-width numeric business key of a
//! gift credential.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Card numbers are 12-digit integers drawn uniformly at random:         │
//! │                                                                         │
//! │      100000000000 ≤ n ≤ 999999999999                                   │
//! │                                                                         │
//! │  The lower bound keeps the width fixed (no leading zeros), the random  │
//! │  draw keeps numbers non-sequential. Uniqueness is enforced by the      │
//! │  store's UNIQUE constraint, not by this type.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Range Constants
// =============================================================================

/// Inclusive lower bound of the card number range (smallest 12-digit number).
pub const CARD_NUMBER_MIN: i64 = 100_000_000_000;

/// Inclusive upper bound of the card number range (largest 12-digit number).
pub const CARD_NUMBER_MAX: i64 = 999_999_999_999;

/// Fixed digit width of every card number.
pub const CARD_NUMBER_WIDTH: usize = 12;

// =============================================================================
// CardNumber Type
// =============================================================================

/// A fixed-width 12-digit gift-card number.
///
/// Values are always inside `[CARD_NUMBER_MIN, CARD_NUMBER_MAX]`; the
/// constructor rejects anything else so a persisted credential can never
/// carry a short or overlong number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(try_from = "i64", into = "i64")]
pub struct CardNumber(i64);

/// Error for out-of-range card number values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("card number {0} is outside the 12-digit range")]
pub struct CardNumberOutOfRange(pub i64);

impl CardNumber {
    /// Creates a CardNumber, rejecting values outside the 12-digit range.
    ///
    /// ## Example
    /// ```rust
    /// use giftwise_core::CardNumber;
    ///
    /// assert!(CardNumber::try_new(123456789012).is_ok());
    /// assert!(CardNumber::try_new(1234).is_err());
    /// ```
    pub fn try_new(value: i64) -> Result<Self, CardNumberOutOfRange> {
        if (CARD_NUMBER_MIN..=CARD_NUMBER_MAX).contains(&value) {
            Ok(CardNumber(value))
        } else {
            Err(CardNumberOutOfRange(value))
        }
    }

    /// Returns the raw numeric value.
    #[inline]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Renders the number in `XXXX XXXX XXXX` groups for human-facing
    /// surfaces (the plain `Display` form stays machine-friendly).
    pub fn grouped(&self) -> String {
        let digits = self.0.to_string();
        debug_assert_eq!(digits.len(), CARD_NUMBER_WIDTH);
        format!("{} {} {}", &digits[0..4], &digits[4..8], &digits[8..12])
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl TryFrom<i64> for CardNumber {
    type Error = CardNumberOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        CardNumber::try_new(value)
    }
}

impl From<CardNumber> for i64 {
    fn from(number: CardNumber) -> i64 {
        number.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
