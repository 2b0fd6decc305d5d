//! # Domain Types
//!
//! Core domain types used throughout the Giftwise engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │  GiftCredential  │   │ IssuanceRequest  │   │ IssuanceReceipt  │    │
//! │  │  ──────────────  │   │  ──────────────  │   │  ──────────────  │    │
//! │  │  id (UUID)       │   │  recipient_name  │   │  card_number     │    │
//! │  │  card_number     │   │  gift_message    │   │  sealed_token    │    │
//! │  │  sealed_token    │   │  recipient_email │   │  expires_at      │    │
//! │  │  status/revision │   │  amount (raw)    │   │  artifact_ref    │    │
//! │  └──────────────────┘   │  payment_auth    │   └──────────────────┘    │
//! │                         └──────────────────┘                           │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐                           │
//! │  │ CredentialStatus │   │ RedemptionOutcome│                           │
//! │  │  Issued          │   │  Redeemed        │                           │
//! │  │  Redeemed        │   │  AlreadyRedeemed │                           │
//! │  │  Expired         │   │  Expired         │                           │
//! │  └──────────────────┘   │  NotFound        │                           │
//! │                         │  TokenInvalid    │                           │
//! │                         └──────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every persisted credential has:
//! - `id`: UUID v4 - immutable storage identity
//! - `card_number`: business key - fixed-width, randomly allocated, unique

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::card::CardNumber;

// =============================================================================
// Credential Status
// =============================================================================

/// The lifecycle status of a gift credential.
///
/// Transitions are one-way: `Issued→Redeemed` or `Issued→Expired`. A terminal
/// status is never left; the store's guarded UPDATE enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// Credential is live and redeemable until its expiry instant.
    Issued,
    /// Credential was consumed by exactly one successful redemption.
    Redeemed,
    /// Credential passed its expiry instant without being redeemed.
    Expired,
}

impl Default for CredentialStatus {
    fn default() -> Self {
        CredentialStatus::Issued
    }
}

impl CredentialStatus {
    /// Whether the one-way lifecycle permits a transition to `next`.
    pub fn can_transition_to(&self, next: CredentialStatus) -> bool {
        matches!(
            (self, next),
            (
                CredentialStatus::Issued,
                CredentialStatus::Redeemed | CredentialStatus::Expired
            )
        )
    }

    /// Lowercase storage form, matching the sqlx derive.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Issued => "issued",
            CredentialStatus::Redeemed => "redeemed",
            CredentialStatus::Expired => "expired",
        }
    }
}

// =============================================================================
// Gift Credential
// =============================================================================

/// A persisted gift credential.
///
/// Created only by the issuance coordinator once allocation, sealing and
/// rendering have all succeeded; mutated only through the store's
/// compare-and-set; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GiftCredential {
    /// Storage identity (UUID v4).
    pub id: String,

    /// Business key: unique fixed-width 12-digit number.
    pub card_number: CardNumber,

    /// Who the card is addressed to (≤30 chars).
    pub recipient_name: String,

    /// Personal message printed with the card (1–180 chars).
    pub gift_message: String,

    /// Where the rendered card is delivered.
    pub recipient_email: String,

    /// Denomination, member of the fixed allowed set.
    pub amount: Amount,

    /// Wire-encoded sealed token (`hex(nonce):hex(ciphertext)`).
    pub sealed_token: String,

    /// Opaque reference to the rendered card image.
    pub artifact_ref: String,

    /// Lifecycle status; transitions are one-way.
    pub status: CredentialStatus,

    /// When the credential was issued.
    pub issued_at: DateTime<Utc>,

    /// Fixed at issuance (issued_at + validity window), immutable thereafter.
    pub expires_at: DateTime<Utc>,

    /// When the Issued→Redeemed transition happened, if it did.
    pub redeemed_at: Option<DateTime<Utc>>,

    /// Compare-and-set witness, bumped by every status transition.
    pub revision: i64,
}

impl GiftCredential {
    /// Whether the credential's expiry instant has passed at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Issuance DTOs
// =============================================================================

/// Issuance input from the upstream validation/routing collaborator.
///
/// Free-text fields arrive already HTML-escaped/sanitized upstream; this
/// engine enforces the domain rules (lengths, email shape, denomination set,
/// payment authorization) and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceRequest {
    pub recipient_name: String,
    pub gift_message: String,
    pub recipient_email: String,
    /// Raw amount; validated into an [`Amount`] by the engine.
    pub amount: i64,
    /// Opaque outcome of the payment-provider handshake. Must be exactly
    /// `true` or issuance fails before any allocation occurs.
    pub payment_authorized: bool,
}

/// Issuance output returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceReceipt {
    pub card_number: CardNumber,
    /// Wire-encoded sealed token; this is what the QR on the card carries.
    pub sealed_token: String,
    pub expires_at: DateTime<Utc>,
    /// Opaque reference to the rendered image artifact.
    pub artifact_ref: String,
}

// =============================================================================
// Redemption Outcome
// =============================================================================

/// The outcome of a redemption attempt.
///
/// All variants are normal business results, never system errors: a denied
/// redemption (`AlreadyRedeemed`, `Expired`, `NotFound`, `TokenInvalid`) is a
/// correct answer, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedemptionOutcome {
    /// This call consumed the credential.
    Redeemed {
        card_number: CardNumber,
        amount: Amount,
    },
    /// The credential was already consumed (possibly by a concurrent call
    /// that raced this one — an expected outcome, not an error).
    AlreadyRedeemed,
    /// The credential's expiry instant has passed.
    Expired,
    /// No credential matches the presented token.
    NotFound,
    /// The presented token is malformed or forged.
    TokenInvalid,
}

// =============================================================================
// Delivery Job
// =============================================================================

/// Payload of a queued delivery outbox entry.
///
/// The outbox row carries these fields denormalized so the delivery worker
/// never re-reads the credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryJob {
    pub card_number: CardNumber,
    pub recipient_email: String,
    pub artifact_ref: String,
}

/// A row in the delivery outbox queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeliveryOutboxEntry {
    pub id: String,
    pub card_number: CardNumber,
    pub recipient_email: String,
    pub artifact_ref: String,
    /// Number of delivery attempts so far.
    pub attempts: i64,
    /// Last error message if delivery failed.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// When delivery was last attempted.
    pub attempted_at: Option<DateTime<Utc>>,
    /// When delivery succeeded.
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the job was retired after exhausting its retry budget.
    pub dead_lettered_at: Option<DateTime<Utc>>,
}

impl DeliveryOutboxEntry {
    /// Whether this entry still needs work.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.delivered_at.is_none() && self.dead_lettered_at.is_none()
    }

    /// The job payload carried by this entry.
    pub fn job(&self) -> DeliveryJob {
        DeliveryJob {
            card_number: self.card_number,
            recipient_email: self.recipient_email.clone(),
            artifact_ref: self.artifact_ref.clone(),
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
    fn test_status_default() {
        assert_eq!(CredentialStatus::default(), CredentialStatus::Issued);
    }

    #[test]
    fn test_status_transitions_are_one_way() {
        use CredentialStatus::*;

        assert!(Issued.can_transition_to(Redeemed));
        assert!(Issued.can_transition_to(Expired));

        assert!(!Redeemed.can_transition_to(Issued));
        assert!(!Redeemed.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Issued));
        assert!(!Expired.can_transition_to(Redeemed));

        // Terminal statuses are never re-entered either
        assert!(!Redeemed.can_transition_to(Redeemed));
        assert!(!Expired.can_transition_to(Expired));
        assert!(!Issued.can_transition_to(Issued));
    }

    #[test]
    fn test_status_serde_is_snake_case() {
        let json = serde_json::to_string(&CredentialStatus::Redeemed).unwrap();
        assert_eq!(json, "\"redeemed\"");
    }

    #[test]
    fn test_outcome_serde_tagging() {
        let json = serde_json::to_string(&RedemptionOutcome::AlreadyRedeemed).unwrap();
        assert_eq!(json, "{\"status\":\"already_redeemed\"}");
    }

    #[test]
    fn test_is_expired_at() {
        let issued_at = Utc::now();
        let credential = GiftCredential {
            id: "00000000-0000-0000-0000-000000000001".to_string(),
            card_number: CardNumber::try_new(123456789012).unwrap(),
            recipient_name: "Mila".to_string(),
            gift_message: "Happy birthday!".to_string(),
            recipient_email: "mila@example.com".to_string(),
            amount: Amount::try_new(1000).unwrap(),
            sealed_token: "0102030405060708090a0b0c:deadbeef".to_string(),
            artifact_ref: "giftcard-123456789012.png".to_string(),
            status: CredentialStatus::Issued,
            issued_at,
            expires_at: issued_at + chrono::Duration::days(365),
            redeemed_at: None,
            revision: 0,
        };

        assert!(!credential.is_expired_at(issued_at));
        assert!(credential.is_expired_at(issued_at + chrono::Duration::days(365)));
        assert!(credential.is_expired_at(issued_at + chrono::Duration::days(400)));
    }

    #[test]
    fn test_outbox_entry_pending() {
        let entry = DeliveryOutboxEntry {
            id: "job-1".to_string(),
            card_number: CardNumber::try_new(123456789012).unwrap(),
            recipient_email: "mila@example.com".to_string(),
            artifact_ref: "giftcard-123456789012.png".to_string(),
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            delivered_at: None,
            dead_lettered_at: None,
        };
        assert!(entry.is_pending());

        let delivered = DeliveryOutboxEntry {
            delivered_at: Some(Utc::now()),
            ..entry.clone()
        };
        assert!(!delivered.is_pending());

        let dead = DeliveryOutboxEntry {
            dead_lettered_at: Some(Utc::now()),
            ..entry
        };
        assert!(!dead.is_pending());
    }
}
