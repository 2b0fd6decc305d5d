//! # Redemption Verifier
//!
//! Validates and consumes presented tokens exactly once.
//!
//! ## Outcome Precedence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Redemption Decision Tree                           │
//! │                                                                         │
//! │  presented string                                                       │
//! │       │                                                                 │
//! │       ├── decode/unseal fails ───────────────► TokenInvalid            │
//! │       ▼                                                                 │
//! │  find_by_token                                                          │
//! │       ├── no row ────────────────────────────► NotFound                │
//! │       ▼                                                                 │
//! │  now ≥ expires_at? ──────────────────────────► Expired                 │
//! │       │    (regardless of prior redemption state)                      │
//! │       ▼                                                                 │
//! │  status Redeemed? ───────────────────────────► AlreadyRedeemed         │
//! │  status Expired?  ───────────────────────────► Expired                 │
//! │       ▼                                                                 │
//! │  status Issued: CAS Issued→Redeemed                                    │
//! │       ├── won ───────────────────────────────► Redeemed                │
//! │       └── lost (StaleStatus) ────────────────► AlreadyRedeemed         │
//! │            (a concurrent call consumed it first — expected, correct)   │
//! │                                                                         │
//! │  Every leaf is a NORMAL RESULT. Only store malfunctions return Err.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{debug, info};

use crate::sealer::TokenSealer;
use giftwise_core::{CredentialStatus, RedemptionOutcome, SealedToken};
use giftwise_db::{Database, DbError};

/// Verifies and consumes presented redemption tokens.
///
/// Stateless apart from injected collaborators; safe to clone into any
/// number of concurrent units of work. The compare-and-set in the store is
/// what makes concurrent redemption of the same token safe: exactly one
/// caller observes `Redeemed`.
#[derive(Clone)]
pub struct RedemptionVerifier {
    db: Database,
    sealer: TokenSealer,
}

impl RedemptionVerifier {
    /// Creates a verifier from its collaborators.
    pub fn new(db: Database, sealer: TokenSealer) -> Self {
        RedemptionVerifier { db, sealer }
    }

    /// Verifies a presented token and, if it is live, consumes it.
    ///
    /// All business denials come back as [`RedemptionOutcome`] variants in
    /// `Ok`; `Err` is reserved for store malfunctions.
    pub async fn verify(&self, presented: &str) -> Result<RedemptionOutcome, DbError> {
        // Authenticate first: a token that does not decrypt under the
        // process key is forged or corrupt, and we don't touch the store
        let sealed = match SealedToken::decode(presented.trim()) {
            Ok(sealed) => sealed,
            Err(_) => {
                debug!("Redemption rejected: malformed token");
                return Ok(RedemptionOutcome::TokenInvalid);
            }
        };
        if self.sealer.unseal(&sealed).is_err() {
            debug!("Redemption rejected: token failed authentication");
            return Ok(RedemptionOutcome::TokenInvalid);
        }

        // Lookup by the canonical encoding, so case differences in the
        // presented hex cannot dodge the unique index
        let repo = self.db.credentials();
        let credential = match repo.find_by_token(&sealed.encode()).await? {
            Some(credential) => credential,
            None => {
                debug!("Redemption rejected: no matching credential");
                return Ok(RedemptionOutcome::NotFound);
            }
        };

        // Past the expiry instant the answer is Expired no matter what
        // happened before; opportunistically sweep the row if it is still
        // marked issued (losing that CAS to someone else changes nothing)
        let now = Utc::now();
        if credential.is_expired_at(now) {
            if credential.status == CredentialStatus::Issued {
                let _ = repo
                    .update_status(
                        credential.card_number,
                        credential.revision,
                        CredentialStatus::Expired,
                    )
                    .await;
            }
            debug!(card_number = %credential.card_number, "Redemption rejected: expired");
            return Ok(RedemptionOutcome::Expired);
        }

        match credential.status {
            CredentialStatus::Redeemed => {
                debug!(card_number = %credential.card_number, "Redemption rejected: already redeemed");
                Ok(RedemptionOutcome::AlreadyRedeemed)
            }
            CredentialStatus::Expired => {
                debug!(card_number = %credential.card_number, "Redemption rejected: expired status");
                Ok(RedemptionOutcome::Expired)
            }
            CredentialStatus::Issued => {
                // Consume: the guarded UPDATE lets exactly one caller win
                match repo
                    .update_status(
                        credential.card_number,
                        credential.revision,
                        CredentialStatus::Redeemed,
                    )
                    .await
                {
                    Ok(()) => {
                        info!(
                            card_number = %credential.card_number,
                            amount = %credential.amount,
                            "Credential redeemed"
                        );
                        Ok(RedemptionOutcome::Redeemed {
                            card_number: credential.card_number,
                            amount: credential.amount,
                        })
                    }
                    // We observed Issued moments ago but lost the race to a
                    // concurrent redeemer — an expected outcome, not an error
                    Err(DbError::StaleStatus { .. }) => {
                        debug!(
                            card_number = %credential.card_number,
                            "Redemption CAS lost; already redeemed"
                        );
                        Ok(RedemptionOutcome::AlreadyRedeemed)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}
