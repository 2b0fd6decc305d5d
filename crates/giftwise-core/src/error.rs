//! # Error Types
//!
//! Domain-specific error types for giftwise-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  giftwise-core errors (this file)                                      │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  giftwise-db errors (separate crate)                                   │
//! │  └── DbError          - Store operation failures                       │
//! │                                                                         │
//! │  giftwise-engine errors (separate crate)                               │
//! │  └── IssuanceError    - Per-attempt issuance failures                  │
//! │                                                                         │
//! │  Flow: ValidationError → IssuanceError → caller                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, bounds, value)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// These represent violations of domain rules outside plain input validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status transition that the one-way lifecycle forbids.
    ///
    /// ## When This Occurs
    /// - Attempting Redeemed→Issued or Expired→Redeemed
    /// - Re-entering a terminal status
    #[error("credential {card_number} is {current}, cannot transition to {requested}")]
    InvalidStatusTransition {
        card_number: i64,
        current: String,
        requested: String,
    },

    /// A sealed token string that does not parse as `hex(nonce):hex(ct)`.
    #[error("sealed token is malformed")]
    MalformedToken,

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements. Used for early
/// validation before any allocation or sealing runs. Every variant names the
/// offending field so the upstream surface can attach it to the right input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g. malformed email address).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in the allowed set (e.g. amount not a denomination).
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<i64> },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
