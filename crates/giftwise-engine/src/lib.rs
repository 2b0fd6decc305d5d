//! # giftwise-engine: Gift-Credential Issuance & Redemption
//!
//! This crate turns a validated purchase signal into a uniquely numbered,
//! cryptographically sealed, visually rendered redeemable credential, and
//! later verifies redemption requests against it.
//!
//! ## Issuance Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Issuance Pipeline                                │
//! │                                                                         │
//! │  IssuanceRequest                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Validating ──► Allocating ──► Sealing ──► Rendering ──► Persisting    │
//! │   (fields,      (random        (AES-GCM    (QR + PNG     (INSERT with  │
//! │    payment)      12-digit       seal)       artifact)     UNIQUE check)│
//! │                  draw)                                        │         │
//! │                                                               ▼         │
//! │                                                          Delivering    │
//! │                                                          (outbox, non- │
//! │                                                           fatal)       │
//! │                                                               │         │
//! │                                                               ▼         │
//! │                                                             Done       │
//! │                                                                         │
//! │  Failures before Persisting leave nothing durable behind.              │
//! │  Delivery failures never roll back a persisted credential.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Redemption Flow
//! ```text
//! token ──► unseal ──► find_by_token ──► expiry/status checks ──► CAS
//!              │            │                   │                   │
//!        TokenInvalid    NotFound       Expired/AlreadyRedeemed  Redeemed
//!                                                             (or Already-
//!                                                              Redeemed if
//!                                                              the CAS lost)
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Environment-backed engine configuration
//! - [`sealer`] - TokenSealer (AES-256-GCM seal/unseal)
//! - [`allocator`] - CardNumberAllocator (bounded random draw)
//! - [`render`] - CredentialRenderer + ArtifactStore
//! - [`coordinator`] - IssuanceCoordinator state machine
//! - [`verifier`] - RedemptionVerifier
//! - [`delivery`] - DeliveryProcessor + DeliveryTransport boundary
//! - [`error`] - Engine error taxonomy

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod error;
pub mod render;
pub mod sealer;
pub mod verifier;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::{AllocatorPolicy, CardNumberAllocator, CardNumberIndex};
pub use config::{ConfigError, EngineConfig};
pub use coordinator::{IssuanceCoordinator, IssuancePolicy, IssuanceStage};
pub use delivery::{
    DeliveryError, DeliveryPolicy, DeliveryProcessor, DeliveryProcessorHandle, DeliveryTransport,
};
pub use error::IssuanceError;
pub use render::{ArtifactStore, CardTemplate, CredentialRenderer, RenderError};
pub use sealer::{SealError, SealingKey, TokenSealer};
pub use verifier::RedemptionVerifier;
