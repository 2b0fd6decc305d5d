//! # Card Number Allocator
//!
//! Draws unique 12-digit card numbers.
//!
//! ## Allocation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Bounded Random Allocation                            │
//! │                                                                         │
//! │  attempt = 1                                                            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  draw ~ Uniform[100000000000, 999999999999]  (OS CSPRNG)               │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  index.contains(draw)? ──no──► return draw                             │
//! │     │                                                                   │
//! │    yes (collision)                                                      │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  attempt < bound? ──yes──► draw again (independent draw, no            │
//! │     │                      incrementing, no sequential fallback)       │
//! │     no                                                                  │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  AllocationExhausted (fatal, operator-actionable)                      │
//! │                                                                         │
//! │  The pre-check races with concurrent issuance BY DESIGN: the store's   │
//! │  UNIQUE constraint at insert time is the actual invariant, this loop   │
//! │  only keeps the duplicate-insert rate near zero.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Draws come from the OS CSPRNG: a predictable sequence would let an
//! attacker guess valid card numbers.

use rand::rngs::OsRng;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use giftwise_core::card::{CARD_NUMBER_MAX, CARD_NUMBER_MIN};
use giftwise_core::CardNumber;
use giftwise_db::{CredentialRepository, DbError};

// =============================================================================
// Collision Index
// =============================================================================

/// The allocator's view of "is this number taken?".
///
/// Implemented by the credential repository in production; tests supply
/// scripted implementations to exercise the retry loop.
pub trait CardNumberIndex {
    /// Whether the number already exists in the store.
    fn contains(
        &self,
        number: CardNumber,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;
}

impl CardNumberIndex for CredentialRepository {
    async fn contains(&self, number: CardNumber) -> Result<bool, DbError> {
        self.card_number_exists(number).await
    }
}

// =============================================================================
// Policy & Errors
// =============================================================================

/// Allocation policy.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorPolicy {
    /// Maximum independent draws before giving up.
    pub max_attempts: u32,
}

impl Default for AllocatorPolicy {
    fn default() -> Self {
        AllocatorPolicy { max_attempts: 1000 }
    }
}

/// Allocation errors.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Every draw within the attempt bound collided.
    ///
    /// At 12 digits this means the number space is badly saturated (or the
    /// index is misbehaving); surfaced to operators rather than retried.
    #[error("could not allocate a unique card number after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The collision index failed.
    #[error("allocation index error: {0}")]
    Store(#[from] DbError),
}

// =============================================================================
// Allocator
// =============================================================================

/// Allocates card numbers by bounded random draw.
///
/// The allocator reserves nothing: a returned number is only provisionally
/// free, and the insert's UNIQUE constraint remains the final arbiter.
#[derive(Debug, Clone, Default)]
pub struct CardNumberAllocator {
    policy: AllocatorPolicy,
}

impl CardNumberAllocator {
    /// Creates an allocator with the given policy.
    pub fn new(policy: AllocatorPolicy) -> Self {
        CardNumberAllocator { policy }
    }

    /// Draws a card number that the index does not currently contain.
    ///
    /// Each attempt is an independent uniform draw over the full 12-digit
    /// range; collisions never fall back to incrementing.
    pub async fn allocate<I: CardNumberIndex>(
        &self,
        index: &I,
    ) -> Result<CardNumber, AllocationError> {
        for attempt in 1..=self.policy.max_attempts {
            let value = OsRng.gen_range(CARD_NUMBER_MIN..=CARD_NUMBER_MAX);
            let number =
                CardNumber::try_new(value).expect("uniform draw stays within the card range");

            if !index.contains(number).await? {
                debug!(attempts = attempt, "Card number allocated");
                return Ok(number);
            }
        }

        warn!(
            attempts = self.policy.max_attempts,
            "Card number allocation exhausted its attempt bound"
        );
        Err(AllocationError::Exhausted {
            attempts: self.policy.max_attempts,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Index that reports collisions for the first N calls, then free.
    struct CollideFirstN {
        n: u32,
        calls: AtomicU32,
    }

    impl CollideFirstN {
        fn new(n: u32) -> Self {
            CollideFirstN {
                n,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl CardNumberIndex for CollideFirstN {
        async fn contains(&self, _number: CardNumber) -> Result<bool, DbError> {
            let seen = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(seen < self.n)
        }
    }

    /// Index where every number is taken.
    struct AlwaysCollides;

    impl CardNumberIndex for AlwaysCollides {
        async fn contains(&self, _number: CardNumber) -> Result<bool, DbError> {
            Ok(true)
        }
    }

    /// Index where nothing is taken.
    struct NeverCollides;

    impl CardNumberIndex for NeverCollides {
        async fn contains(&self, _number: CardNumber) -> Result<bool, DbError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_first_draw_usually_wins() {
        let allocator = CardNumberAllocator::default();
        let number = allocator.allocate(&NeverCollides).await.unwrap();

        assert!(number.value() >= CARD_NUMBER_MIN);
        assert!(number.value() <= CARD_NUMBER_MAX);
    }

    #[tokio::test]
    async fn test_succeeds_on_draw_n_after_n_minus_one_collisions() {
        let allocator = CardNumberAllocator::new(AllocatorPolicy { max_attempts: 10 });
        let index = CollideFirstN::new(9);

        let number = allocator.allocate(&index).await.unwrap();
        assert!(number.value() >= CARD_NUMBER_MIN);
        assert_eq!(index.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_exhausts_at_the_bound() {
        let allocator = CardNumberAllocator::default();
        let err = allocator.allocate(&AlwaysCollides).await.unwrap_err();

        assert!(
            matches!(err, AllocationError::Exhausted { attempts: 1000 }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_collision_past_the_bound_is_exhausted() {
        let allocator = CardNumberAllocator::new(AllocatorPolicy { max_attempts: 5 });
        let index = CollideFirstN::new(5);

        let err = allocator.allocate(&index).await.unwrap_err();
        assert!(
            matches!(err, AllocationError::Exhausted { attempts: 5 }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_draws_are_non_sequential() {
        // Statistical smoke test: 100 independent draws should not form a
        // consecutive run (probability ~0 for a uniform 12-digit draw)
        let allocator = CardNumberAllocator::default();
        let mut previous: Option<i64> = None;
        let mut consecutive = 0;

        for _ in 0..100 {
            let number = allocator.allocate(&NeverCollides).await.unwrap().value();
            if let Some(prev) = previous {
                if number == prev + 1 {
                    consecutive += 1;
                }
            }
            previous = Some(number);
        }

        assert_eq!(consecutive, 0);
    }
}
