//! # Engine Error Types
//!
//! The issuance-side error taxonomy.
//!
//! ## Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Issuance Error Taxonomy                             │
//! │                                                                         │
//! │  Validation          recoverable, surfaced with field detail           │
//! │  PaymentNotAuthorized fatal for the attempt, surfaced                  │
//! │  AllocationExhausted  fatal, operator-actionable                       │
//! │  RenderFailed         fatal for the attempt                            │
//! │  DuplicateCardNumber  fatal for the attempt; whole attempt retryable   │
//! │  StageTimedOut        fatal for the attempt (stage named)              │
//! │  Store                fatal for the attempt                            │
//! │                                                                         │
//! │  NOT here: redemption outcomes (TokenInvalid, NotFound,                │
//! │  AlreadyRedeemed, Expired) are normal results, and delivery failures   │
//! │  are logged and retried by the outbox worker — neither ever surfaces   │
//! │  as an issuance error.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::allocator::AllocationError;
use crate::coordinator::IssuanceStage;
use crate::render::RenderError;
use crate::sealer::SealError;
use giftwise_core::ValidationError;
use giftwise_db::DbError;

/// Per-attempt issuance failures.
///
/// Any of these aborts the attempt. Failures raised before the Persisting
/// stage leave no durable side effect; a Persisting failure may be retried
/// by the caller as a whole new attempt (fresh allocation, fresh token).
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// Caller input violated a field rule.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The payment handshake did not report success.
    #[error("payment was not authorized")]
    PaymentNotAuthorized,

    /// The allocator ran out of attempts without finding a free number.
    #[error("could not allocate a unique card number after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    /// Sealing the redemption secret failed.
    #[error("token sealing failed: {0}")]
    Sealing(#[from] SealError),

    /// Rendering or storing the card artifact failed.
    #[error("rendering failed: {0}")]
    RenderFailed(#[from] RenderError),

    /// The store's UNIQUE constraint rejected the allocated card number at
    /// commit time (the authoritative duplicate check). The whole attempt is
    /// retryable and will draw a fresh allocation.
    #[error("card number {card_number} already exists")]
    DuplicateCardNumber { card_number: i64 },

    /// A stage exceeded the caller-supplied timeout.
    #[error("issuance stage {stage} timed out")]
    StageTimedOut { stage: IssuanceStage },

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl From<AllocationError> for IssuanceError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Exhausted { attempts } => {
                IssuanceError::AllocationExhausted { attempts }
            }
            AllocationError::Store(e) => IssuanceError::Store(e),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_error_conversion() {
        let err: IssuanceError = AllocationError::Exhausted { attempts: 1000 }.into();
        assert!(matches!(
            err,
            IssuanceError::AllocationExhausted { attempts: 1000 }
        ));

        let err: IssuanceError = AllocationError::Store(DbError::PoolExhausted).into();
        assert!(matches!(err, IssuanceError::Store(_)));
    }

    #[test]
    fn test_stage_timeout_message_names_the_stage() {
        let err = IssuanceError::StageTimedOut {
            stage: IssuanceStage::Rendering,
        };
        assert_eq!(err.to_string(), "issuance stage rendering timed out");
    }
}
