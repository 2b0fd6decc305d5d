//! # Amount Module
//!
//! Provides the `Amount` type for gift-card denominations.
//!
//! ## The Closed Denomination Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Gift cards are sold in fixed denominations only:                       │
//! │                                                                         │
//! │      1000  •  2000  •  5000   (whole currency units)                   │
//! │                                                                         │
//! │  An Amount can only be constructed from a member of this set, so a     │
//! │  persisted credential can never carry an off-menu value.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use giftwise_core::Amount;
//!
//! let amount = Amount::try_new(1000).unwrap();
//! assert_eq!(amount.value(), 1000);
//!
//! // Off-menu values are rejected at construction
//! assert!(Amount::try_new(1500).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

// =============================================================================
// Denominations
// =============================================================================

/// The fixed set of allowed gift-card denominations, in whole currency units.
pub const ALLOWED_DENOMINATIONS: [i64; 3] = [1000, 2000, 5000];

// =============================================================================
// Amount Type
// =============================================================================

/// A gift-card amount, guaranteed to be a member of [`ALLOWED_DENOMINATIONS`].
///
/// ## Design Decisions
/// - **i64 inner value**: matches the store's integer column
/// - **Closed constructor**: `try_new` is the only way in; serde deserialization
///   routes through it via `try_from`
/// - **Whole units**: denominations are whole currency units, not cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Creates an Amount from a raw value, rejecting anything outside the
    /// allowed denomination set.
    ///
    /// ## Example
    /// ```rust
    /// use giftwise_core::Amount;
    ///
    /// assert!(Amount::try_new(2000).is_ok());
    /// assert!(Amount::try_new(0).is_err());
    /// assert!(Amount::try_new(-1000).is_err());
    /// ```
    pub fn try_new(value: i64) -> Result<Self, ValidationError> {
        if ALLOWED_DENOMINATIONS.contains(&value) {
            Ok(Amount(value))
        } else {
            Err(ValidationError::NotAllowed {
                field: "amount".to_string(),
                allowed: ALLOWED_DENOMINATIONS.to_vec(),
            })
        }
    }

    /// Returns the amount in whole currency units.
    #[inline]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// The smallest allowed denomination.
    #[inline]
    pub const fn smallest() -> Self {
        Amount(ALLOWED_DENOMINATIONS[0])
    }

    /// The largest allowed denomination.
    #[inline]
    pub const fn largest() -> Self {
        Amount(ALLOWED_DENOMINATIONS[ALLOWED_DENOMINATIONS.len() - 1])
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl TryFrom<i64> for Amount {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::try_new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> i64 {
        amount.0
    }
}

/// Display shows the raw unit value; currency formatting is an upstream
/// presentation concern.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_denominations() {
        for value in ALLOWED_DENOMINATIONS {
            let amount = Amount::try_new(value).unwrap();
            assert_eq!(amount.value(), value);
        }
    }

    #[test]
    fn test_rejected_values() {
        for value in [0, -1000, 1, 999, 1500, 3000, 10000] {
            assert!(Amount::try_new(value).is_err(), "{value} should be rejected");
        }
    }

    #[test]
    fn test_rejection_names_the_field_and_set() {
        let err = Amount::try_new(1500).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotAllowed {
                field: "amount".to_string(),
                allowed: vec![1000, 2000, 5000],
            }
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let amount = Amount::try_new(5000).unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "5000");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_serde_rejects_off_menu_values() {
        let result: Result<Amount, _> = serde_json::from_str("1500");
        assert!(result.is_err());
    }

    #[test]
    fn test_bounds() {
        assert_eq!(Amount::smallest().value(), 1000);
        assert_eq!(Amount::largest().value(), 5000);
    }
}
