//! # Credential Repository
//!
//! Database operations for gift credentials.
//!
//! ## Credential Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Credential Lifecycle                                │
//! │                                                                         │
//! │  1. INSERT (issuance coordinator, Persisting stage)                    │
//! │     └── insert() → row with status 'issued', revision 0                │
//! │         └── UNIQUE(card_number) violation here is the authoritative    │
//! │             duplicate check                                            │
//! │                                                                         │
//! │  2. CONSUME (redemption verifier)                                      │
//! │     └── update_status(card, rev, Redeemed)                             │
//! │         └── guarded UPDATE: WHERE revision = rev AND status='issued'   │
//! │             rows_affected == 0 → StaleStatus (CAS lost)                │
//! │                                                                         │
//! │  3. EXPIRE (background sweep)                                          │
//! │     └── sweep_expired(now) → bulk Issued→Expired for overdue rows      │
//! │                                                                         │
//! │  Rows are NEVER deleted - the table is the audit trail.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use giftwise_core::{CardNumber, CredentialStatus, GiftCredential};

/// All columns of a credential row, in schema order.
const CREDENTIAL_COLUMNS: &str = "\
    id, card_number, recipient_name, gift_message, recipient_email, \
    amount, sealed_token, artifact_ref, status, \
    issued_at, expires_at, redeemed_at, revision";

/// Repository for credential database operations.
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    pool: SqlitePool,
}

impl CredentialRepository {
    /// Creates a new CredentialRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CredentialRepository { pool }
    }

    /// Inserts a freshly issued credential.
    ///
    /// The UNIQUE constraints on `card_number` and `sealed_token` are checked
    /// here, at commit time. A violation surfaces as
    /// [`DbError::UniqueViolation`] naming the offending column; any
    /// allocator-side pre-check only reduces how often this fires.
    pub async fn insert(&self, credential: &GiftCredential) -> DbResult<()> {
        debug!(card_number = %credential.card_number, "Inserting credential");

        sqlx::query(
            r#"
            INSERT INTO gift_credentials (
                id, card_number, recipient_name, gift_message, recipient_email,
                amount, sealed_token, artifact_ref, status,
                issued_at, expires_at, redeemed_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&credential.id)
        .bind(credential.card_number)
        .bind(&credential.recipient_name)
        .bind(&credential.gift_message)
        .bind(&credential.recipient_email)
        .bind(credential.amount)
        .bind(&credential.sealed_token)
        .bind(&credential.artifact_ref)
        .bind(credential.status)
        .bind(credential.issued_at)
        .bind(credential.expires_at)
        .bind(credential.redeemed_at)
        .bind(credential.revision)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Looks up a credential by its wire-encoded sealed token.
    ///
    /// This is the redemption path: the presented token string is matched
    /// against the unique `sealed_token` index.
    pub async fn find_by_token(&self, sealed_token: &str) -> DbResult<Option<GiftCredential>> {
        let credential = sqlx::query_as::<_, GiftCredential>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM gift_credentials WHERE sealed_token = ?1"
        ))
        .bind(sealed_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    /// Looks up a credential by card number.
    pub async fn find_by_card_number(
        &self,
        card_number: CardNumber,
    ) -> DbResult<Option<GiftCredential>> {
        let credential = sqlx::query_as::<_, GiftCredential>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM gift_credentials WHERE card_number = ?1"
        ))
        .bind(card_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    /// Whether a card number is already taken.
    ///
    /// Used by the allocator's bounded retry loop as an advisory pre-check;
    /// it races with concurrent issuance by design, which is why
    /// [`insert`](Self::insert) remains authoritative.
    pub async fn card_number_exists(&self, card_number: CardNumber) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM gift_credentials WHERE card_number = ?1",
        )
        .bind(card_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Compare-and-set status transition.
    ///
    /// ## What This Does
    /// A single guarded UPDATE:
    /// - matches on `card_number`, `revision = expected_revision` and
    ///   `status = 'issued'` (the only status with outgoing edges)
    /// - bumps `revision`
    /// - stamps `redeemed_at` for the Redeemed transition
    ///
    /// `rows_affected == 0` means the witness went stale — another caller
    /// transitioned the row first (concurrent redemption, or the expiry
    /// sweep) — and surfaces as [`DbError::StaleStatus`].
    pub async fn update_status(
        &self,
        card_number: CardNumber,
        expected_revision: i64,
        new_status: CredentialStatus,
    ) -> DbResult<()> {
        if !CredentialStatus::Issued.can_transition_to(new_status) {
            return Err(DbError::InvalidStatusTarget {
                requested: new_status.as_str(),
            });
        }

        let redeemed_at = match new_status {
            CredentialStatus::Redeemed => Some(Utc::now()),
            _ => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE gift_credentials SET
                status = ?3,
                redeemed_at = COALESCE(?4, redeemed_at),
                revision = revision + 1
            WHERE card_number = ?1 AND revision = ?2 AND status = 'issued'
            "#,
        )
        .bind(card_number)
        .bind(expected_revision)
        .bind(new_status)
        .bind(redeemed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleStatus {
                card_number: card_number.value(),
                expected_revision,
            });
        }

        debug!(
            card_number = %card_number,
            status = new_status.as_str(),
            "Credential status updated"
        );

        Ok(())
    }

    /// Expires every issued credential whose expiry instant has passed.
    ///
    /// One bulk guarded UPDATE; each affected row gets its revision bumped so
    /// in-flight redemptions holding the old witness lose their CAS.
    ///
    /// ## Returns
    /// Number of credentials swept to Expired.
    pub async fn sweep_expired(&self, now: chrono::DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE gift_credentials SET
                status = 'expired',
                revision = revision + 1
            WHERE status = 'issued' AND expires_at <= ?1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Counts credentials currently in `issued` status.
    pub async fn count_issued(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM gift_credentials WHERE status = 'issued'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Counts all credentials ever issued (the full stored history).
    pub async fn count_all(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gift_credentials")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use giftwise_core::Amount;
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample(card_number: i64, token: &str) -> GiftCredential {
        let now = Utc::now();
        GiftCredential {
            id: Uuid::new_v4().to_string(),
            card_number: CardNumber::try_new(card_number).unwrap(),
            recipient_name: "Mila".to_string(),
            gift_message: "Happy birthday!".to_string(),
            recipient_email: "mila@example.com".to_string(),
            amount: Amount::try_new(1000).unwrap(),
            sealed_token: token.to_string(),
            artifact_ref: format!("giftcard-{card_number}.png"),
            status: CredentialStatus::Issued,
            issued_at: now,
            expires_at: now + Duration::days(365),
            redeemed_at: None,
            revision: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_token() {
        let db = test_db().await;
        let repo = db.credentials();

        let credential = sample(123456789012, "0102030405060708090a0b0c:aa");
        repo.insert(&credential).await.unwrap();

        let found = repo
            .find_by_token("0102030405060708090a0b0c:aa")
            .await
            .unwrap()
            .expect("credential should exist");
        assert_eq!(found.card_number, credential.card_number);
        assert_eq!(found.amount.value(), 1000);
        assert_eq!(found.status, CredentialStatus::Issued);
        assert_eq!(found.revision, 0);

        let missing = repo
            .find_by_token("0102030405060708090a0b0c:bb")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_card_number_is_rejected() {
        let db = test_db().await;
        let repo = db.credentials();

        repo.insert(&sample(123456789012, "0102030405060708090a0b0c:aa"))
            .await
            .unwrap();

        let err = repo
            .insert(&sample(123456789012, "0102030405060708090a0b0c:bb"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("card_number"), "{err:?}");
    }

    #[tokio::test]
    async fn test_duplicate_sealed_token_is_rejected() {
        let db = test_db().await;
        let repo = db.credentials();

        repo.insert(&sample(123456789012, "0102030405060708090a0b0c:aa"))
            .await
            .unwrap();

        let err = repo
            .insert(&sample(210987654321, "0102030405060708090a0b0c:aa"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("sealed_token"), "{err:?}");
    }

    #[tokio::test]
    async fn test_card_number_exists() {
        let db = test_db().await;
        let repo = db.credentials();

        let number = CardNumber::try_new(123456789012).unwrap();
        assert!(!repo.card_number_exists(number).await.unwrap());

        repo.insert(&sample(123456789012, "0102030405060708090a0b0c:aa"))
            .await
            .unwrap();
        assert!(repo.card_number_exists(number).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_status_cas_succeeds_once() {
        let db = test_db().await;
        let repo = db.credentials();

        let credential = sample(123456789012, "0102030405060708090a0b0c:aa");
        repo.insert(&credential).await.unwrap();

        repo.update_status(credential.card_number, 0, CredentialStatus::Redeemed)
            .await
            .unwrap();

        let stored = repo
            .find_by_card_number(credential.card_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, CredentialStatus::Redeemed);
        assert_eq!(stored.revision, 1);
        assert!(stored.redeemed_at.is_some());

        // Replaying with the stale witness loses the CAS
        let err = repo
            .update_status(credential.card_number, 0, CredentialStatus::Redeemed)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StaleStatus { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_update_status_never_leaves_terminal_states() {
        let db = test_db().await;
        let repo = db.credentials();

        let credential = sample(123456789012, "0102030405060708090a0b0c:aa");
        repo.insert(&credential).await.unwrap();
        repo.update_status(credential.card_number, 0, CredentialStatus::Expired)
            .await
            .unwrap();

        // Even with the current revision, a redeemed/expired row has no
        // outgoing edges: the status guard refuses the update
        let err = repo
            .update_status(credential.card_number, 1, CredentialStatus::Redeemed)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StaleStatus { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_update_status_rejects_issued_target() {
        let db = test_db().await;
        let repo = db.credentials();

        let credential = sample(123456789012, "0102030405060708090a0b0c:aa");
        repo.insert(&credential).await.unwrap();

        let err = repo
            .update_status(credential.card_number, 0, CredentialStatus::Issued)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidStatusTarget { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_sweep_expired_only_touches_overdue_issued_rows() {
        let db = test_db().await;
        let repo = db.credentials();
        let now = Utc::now();

        // Overdue and issued: swept
        let mut overdue = sample(111111111111, "0102030405060708090a0b0c:aa");
        overdue.expires_at = now - Duration::days(1);
        repo.insert(&overdue).await.unwrap();

        // Still valid: untouched
        let valid = sample(222222222222, "0102030405060708090a0b0c:bb");
        repo.insert(&valid).await.unwrap();

        // Overdue but already redeemed: untouched
        let mut redeemed = sample(333333333333, "0102030405060708090a0b0c:cc");
        redeemed.expires_at = now - Duration::days(1);
        repo.insert(&redeemed).await.unwrap();
        repo.update_status(redeemed.card_number, 0, CredentialStatus::Redeemed)
            .await
            .unwrap();

        let swept = repo.sweep_expired(now).await.unwrap();
        assert_eq!(swept, 1);

        let overdue_row = repo
            .find_by_card_number(overdue.card_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(overdue_row.status, CredentialStatus::Expired);
        assert_eq!(overdue_row.revision, 1);

        let valid_row = repo
            .find_by_card_number(valid.card_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(valid_row.status, CredentialStatus::Issued);

        let redeemed_row = repo
            .find_by_card_number(redeemed.card_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redeemed_row.status, CredentialStatus::Redeemed);
    }

    #[tokio::test]
    async fn test_counts() {
        let db = test_db().await;
        let repo = db.credentials();

        repo.insert(&sample(111111111111, "0102030405060708090a0b0c:aa"))
            .await
            .unwrap();
        repo.insert(&sample(222222222222, "0102030405060708090a0b0c:bb"))
            .await
            .unwrap();
        repo.update_status(
            CardNumber::try_new(222222222222).unwrap(),
            0,
            CredentialStatus::Redeemed,
        )
        .await
        .unwrap();

        assert_eq!(repo.count_issued().await.unwrap(), 1);
        assert_eq!(repo.count_all().await.unwrap(), 2);
    }
}
