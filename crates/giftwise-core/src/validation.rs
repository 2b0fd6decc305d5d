//! # Validation Module
//!
//! Issuance input validation for the Giftwise engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Upstream routing collaborator                                │
//! │  ├── Free-text sanitization (HTML escaping etc.)                       │
//! │  └── Transport-level checks                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - domain rules                                   │
//! │  ├── Lengths (name ≤30, message 1–180)                                 │
//! │  ├── Email shape                                                       │
//! │  └── Amount membership in the denomination set                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (SQLite)                                               │
//! │  ├── NOT NULL constraints                                              │
//! │  └── UNIQUE constraints (card_number, sealed_token)                    │
//! │                                                                         │
//! │  Defense in depth: each layer catches a different class of error       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use giftwise_core::validation::{validate_recipient_name, validate_gift_message};
//!
//! validate_recipient_name("Mila").unwrap();
//! validate_gift_message("Happy birthday!").unwrap();
//! ```

use crate::amount::Amount;
use crate::error::ValidationError;
use crate::types::IssuanceRequest;
use crate::{MAX_GIFT_MESSAGE_LEN, MAX_RECIPIENT_NAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a recipient name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 30 characters
pub fn validate_recipient_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "recipient_name".to_string(),
        });
    }

    if name.chars().count() > MAX_RECIPIENT_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "recipient_name".to_string(),
            max: MAX_RECIPIENT_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates a gift message.
///
/// ## Rules
/// - 1 to 180 characters after trimming
pub fn validate_gift_message(message: &str) -> ValidationResult<String> {
    let message = message.trim();

    if message.is_empty() {
        return Err(ValidationError::TooShort {
            field: "gift_message".to_string(),
            min: 1,
        });
    }

    if message.chars().count() > MAX_GIFT_MESSAGE_LEN {
        return Err(ValidationError::TooLong {
            field: "gift_message".to_string(),
            max: MAX_GIFT_MESSAGE_LEN,
        });
    }

    Ok(message.to_string())
}

/// Validates a recipient email address.
///
/// ## Rules
/// Shape is `local@domain.tld` where:
/// - local part: letters, digits, `.`, `_`, `-` (non-empty)
/// - domain labels: letters, digits, `-` (each non-empty)
/// - top-level label: 2 to 6 letters
///
/// This is the same acceptance set the upstream checkout form enforces; it
/// is deliberately strict rather than RFC-complete.
pub fn validate_recipient_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "recipient_email".to_string(),
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "recipient_email".to_string(),
        reason: reason.to_string(),
    };

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing '@'"))?;

    if domain.contains('@') {
        return Err(invalid("more than one '@'"));
    }

    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("invalid characters before '@'"));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid("domain must contain a '.'"));
    }

    let tld = labels[labels.len() - 1];
    if !(2..=6).contains(&tld.len()) || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid("top-level domain must be 2-6 letters"));
    }

    for label in &labels[..labels.len() - 1] {
        if label.is_empty()
            || !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(invalid("invalid domain label"));
        }
    }

    Ok(email.to_string())
}

/// Validates a raw amount into an [`Amount`].
///
/// ## Rules
/// - Must be a member of the fixed denomination set
pub fn validate_amount(amount: i64) -> ValidationResult<Amount> {
    Amount::try_new(amount)
}

// =============================================================================
// Request Validation
// =============================================================================

/// An issuance request with every field validated and normalized.
///
/// Existence of this type is the proof the coordinator relies on: it can only
/// be produced by [`validate_request`]. Payment authorization is deliberately
/// NOT part of it — that check belongs to the coordinator, which distinguishes
/// `PaymentNotAuthorized` from field-level validation errors.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub recipient_name: String,
    pub gift_message: String,
    pub recipient_email: String,
    pub amount: Amount,
}

/// Validates all fields of an issuance request.
///
/// Fails on the first violated rule, with field detail.
pub fn validate_request(request: &IssuanceRequest) -> ValidationResult<ValidatedRequest> {
    Ok(ValidatedRequest {
        recipient_name: validate_recipient_name(&request.recipient_name)?,
        gift_message: validate_gift_message(&request.gift_message)?,
        recipient_email: validate_recipient_email(&request.recipient_email)?,
        amount: validate_amount(request.amount)?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
