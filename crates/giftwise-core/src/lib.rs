//! # giftwise-core: Pure Domain Logic for the Giftwise Engine
//!
//! This crate is the **heart** of the gift-credential engine. It contains the
//! domain types and rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Giftwise Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Upstream collaborators                          │   │
//! │  │   payment handshake ──► HTTP routing ──► request validation     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ IssuanceRequest / sealed token         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   giftwise-engine                               │   │
//! │  │   Allocator ── Sealer ── Renderer ── Coordinator ── Verifier    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ giftwise-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  amount   │  │   card    │  │ validation│  │   │
//! │  │   │Credential │  │  Amount   │  │CardNumber │  │   rules   │  │   │
//! │  │   │  Status   │  │ Denoms    │  │  range    │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CRYPTO • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    giftwise-db (Store)                          │   │
//! │  │        SQLite credential store, unique constraints, CAS         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (GiftCredential, CredentialStatus, DTOs)
//! - [`amount`] - Denomination-restricted Amount type
//! - [`card`] - Fixed-width CardNumber type
//! - [`token`] - SealedToken wire encoding
//! - [`error`] - Domain error types
//! - [`validation`] - Issuance request validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic - same input = same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Closed Sets**: amounts and statuses are closed types, not open integers/strings
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod amount;
pub mod card;
pub mod error;
pub mod token;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use giftwise_core::Amount` instead of
// `use giftwise_core::amount::Amount`

pub use amount::Amount;
pub use card::CardNumber;
pub use error::{CoreError, ValidationError};
pub use token::SealedToken;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of the recipient name, in characters.
pub const MAX_RECIPIENT_NAME_LEN: usize = 30;

/// Maximum length of the gift message, in characters. A message is required,
/// so the minimum is 1.
pub const MAX_GIFT_MESSAGE_LEN: usize = 180;

/// Number of random bytes in a redemption secret before sealing.
pub const REDEMPTION_SECRET_LEN: usize = 20;
