//! # Issuance Coordinator
//!
//! Orchestrates one issuance attempt end to end.
//!
//! ## Per-Attempt State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Issuance State Machine                               │
//! │                                                                         │
//! │  Validating ──► Allocating ──► Sealing ──► Rendering ──► Persisting    │
//! │      │              │             │            │              │         │
//! │      │              │             │            │              │         │
//! │  Validation/    Allocation-   Sealing     RenderFailed   Duplicate-    │
//! │  PaymentNot-    Exhausted                 StageTimedOut  CardNumber/   │
//! │  Authorized                                              Store/        │
//! │                                                          StageTimedOut │
//! │                                                               │         │
//! │         no durable side effect ◄──────────────────────────────┤         │
//! │         (nothing to compensate)            credential durable │         │
//! │                                                               ▼         │
//! │                                                          Delivering    │
//! │                                                          (non-fatal!)  │
//! │                                                               │         │
//! │                                                               ▼         │
//! │                                                             Done       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rendering and persistence run under the caller-supplied per-stage
//! timeout; everything earlier is CPU-bound or attempt-bounded already.
//! A `Delivering` failure is logged and left to the outbox worker — the
//! credential is already durably Issued and is never rolled back.

use chrono::{Duration as ChronoDuration, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::allocator::{AllocatorPolicy, CardNumberAllocator};
use crate::error::IssuanceError;
use crate::render::{ArtifactStore, CredentialRenderer, RenderError, RenderRequest};
use crate::sealer::TokenSealer;
use giftwise_core::validation::validate_request;
use giftwise_core::{
    CredentialStatus, DeliveryJob, GiftCredential, IssuanceRequest, IssuanceReceipt,
};
use giftwise_db::Database;

// =============================================================================
// Stages
// =============================================================================

/// The stage an issuance attempt is in.
///
/// Used in tracing fields and timeout errors; stages advance strictly left
/// to right and an attempt dies in the stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceStage {
    Validating,
    Allocating,
    Sealing,
    Rendering,
    Persisting,
    Delivering,
    Done,
}

impl IssuanceStage {
    /// Lowercase name for logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceStage::Validating => "validating",
            IssuanceStage::Allocating => "allocating",
            IssuanceStage::Sealing => "sealing",
            IssuanceStage::Rendering => "rendering",
            IssuanceStage::Persisting => "persisting",
            IssuanceStage::Delivering => "delivering",
            IssuanceStage::Done => "done",
        }
    }
}

impl fmt::Display for IssuanceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Issuance policy knobs.
#[derive(Debug, Clone)]
pub struct IssuancePolicy {
    /// Validity window added to the issuance instant; expiry is fixed at
    /// issuance and immutable afterwards.
    pub validity_days: i64,

    /// Per-stage timeout for the Rendering and Persisting stages.
    pub stage_timeout: Duration,

    /// Allocator attempt bound.
    pub allocator: AllocatorPolicy,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        IssuancePolicy {
            validity_days: 365,
            stage_timeout: Duration::from_secs(10),
            allocator: AllocatorPolicy::default(),
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Runs issuance attempts.
///
/// Holds only injected collaborators (store handle, sealer, renderer,
/// artifact store) — no global state. Each `issue` call is an independent
/// unit of work; concurrent calls share nothing but the store and the
/// read-only key inside the sealer.
#[derive(Clone)]
pub struct IssuanceCoordinator {
    db: Database,
    sealer: TokenSealer,
    renderer: Arc<CredentialRenderer>,
    artifacts: ArtifactStore,
    allocator: CardNumberAllocator,
    policy: IssuancePolicy,
}

impl IssuanceCoordinator {
    /// Creates a coordinator from its collaborators.
    pub fn new(
        db: Database,
        sealer: TokenSealer,
        renderer: Arc<CredentialRenderer>,
        artifacts: ArtifactStore,
        policy: IssuancePolicy,
    ) -> Self {
        let allocator = CardNumberAllocator::new(policy.allocator);
        IssuanceCoordinator {
            db,
            sealer,
            renderer,
            artifacts,
            allocator,
            policy,
        }
    }

    /// Runs one issuance attempt.
    ///
    /// On success the credential is durably `Issued` and a delivery job is
    /// queued. On failure nothing durable exists (failures before
    /// Persisting) or the attempt may simply be retried from scratch
    /// (Persisting failures — a retry draws a fresh allocation and token).
    pub async fn issue(
        &self,
        request: &IssuanceRequest,
    ) -> Result<IssuanceReceipt, IssuanceError> {
        // ---- Validating ----------------------------------------------------
        debug!(stage = %IssuanceStage::Validating, "Issuance attempt started");

        let validated = validate_request(request)?;

        // The payment signal is checked before any allocation happens; it is
        // opaque here (the provider handshake lives upstream)
        if !request.payment_authorized {
            return Err(IssuanceError::PaymentNotAuthorized);
        }

        // ---- Allocating ----------------------------------------------------
        debug!(stage = %IssuanceStage::Allocating, "Allocating card number");

        let repo = self.db.credentials();
        let card_number = self.allocator.allocate(&repo).await?;

        // ---- Sealing -------------------------------------------------------
        debug!(stage = %IssuanceStage::Sealing, card_number = %card_number, "Sealing token");

        // The plaintext secret is dropped (and wiped) right here; only the
        // sealed form travels further
        let (_secret, sealed) = self.sealer.seal()?;
        let sealed_token = sealed.encode();

        // ---- Rendering -----------------------------------------------------
        debug!(stage = %IssuanceStage::Rendering, card_number = %card_number, "Rendering artifact");

        let artifact_ref = {
            let renderer = Arc::clone(&self.renderer);
            let token_for_render = sealed_token.clone();
            let amount = validated.amount;

            let render_stage = async {
                let bytes = tokio::task::spawn_blocking(move || {
                    renderer.render(&RenderRequest {
                        card_number,
                        amount,
                        sealed_token: &token_for_render,
                    })
                })
                .await
                .map_err(|e| RenderError::Encoding(format!("render task failed: {e}")))??;

                self.artifacts.save(card_number, &bytes).await
            };

            match timeout(self.policy.stage_timeout, render_stage).await {
                Err(_) => {
                    return Err(IssuanceError::StageTimedOut {
                        stage: IssuanceStage::Rendering,
                    })
                }
                Ok(result) => result?,
            }
        };

        // ---- Persisting ----------------------------------------------------
        debug!(stage = %IssuanceStage::Persisting, card_number = %card_number, "Persisting credential");

        let now = Utc::now();
        let credential = GiftCredential {
            id: Uuid::new_v4().to_string(),
            card_number,
            recipient_name: validated.recipient_name,
            gift_message: validated.gift_message,
            recipient_email: validated.recipient_email.clone(),
            amount: validated.amount,
            sealed_token: sealed_token.clone(),
            artifact_ref: artifact_ref.clone(),
            status: CredentialStatus::Issued,
            issued_at: now,
            expires_at: now + ChronoDuration::days(self.policy.validity_days),
            redeemed_at: None,
            revision: 0,
        };

        match timeout(self.policy.stage_timeout, repo.insert(&credential)).await {
            Err(_) => {
                return Err(IssuanceError::StageTimedOut {
                    stage: IssuanceStage::Persisting,
                })
            }
            // The UNIQUE constraint fired after the allocator's advisory
            // pre-check passed: a concurrent attempt won the number. Fatal
            // for this attempt; the caller may retry with a fresh draw.
            Ok(Err(e)) if e.is_unique_violation_on("card_number") => {
                return Err(IssuanceError::DuplicateCardNumber {
                    card_number: card_number.value(),
                });
            }
            Ok(Err(e)) => return Err(IssuanceError::Store(e)),
            Ok(Ok(())) => {}
        }

        // ---- Delivering (non-fatal) ----------------------------------------
        debug!(stage = %IssuanceStage::Delivering, card_number = %card_number, "Queuing delivery");

        let job = DeliveryJob {
            card_number,
            recipient_email: credential.recipient_email.clone(),
            artifact_ref: artifact_ref.clone(),
        };
        if let Err(e) = self.db.delivery_outbox().enqueue(&job).await {
            // The credential is already durably Issued; a failed enqueue is
            // a delivery problem, never an issuance failure
            warn!(
                card_number = %card_number,
                error = %e,
                "Delivery enqueue failed; credential remains issued"
            );
        }

        // ---- Done ----------------------------------------------------------
        info!(
            stage = %IssuanceStage::Done,
            card_number = %card_number,
            amount = %credential.amount,
            expires_at = %credential.expires_at,
            "Credential issued"
        );

        Ok(IssuanceReceipt {
            card_number,
            sealed_token,
            expires_at: credential.expires_at,
            artifact_ref,
        })
    }

    /// Expires every issued credential whose expiry instant has passed.
    ///
    /// Intended to run periodically from a scheduler; redemptions racing the
    /// sweep lose their CAS and observe the expired status.
    ///
    /// ## Returns
    /// Number of credentials swept to Expired.
    pub async fn sweep_expired(&self) -> Result<u64, IssuanceError> {
        let swept = self.db.credentials().sweep_expired(Utc::now()).await?;
        if swept > 0 {
            info!(count = swept, "Expired credentials swept");
        }
        Ok(swept)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
