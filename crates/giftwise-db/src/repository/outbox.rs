//! # Delivery Outbox Repository
//!
//! Manages the delivery outbox queue that decouples card delivery from the
//! issuance response.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  ISSUANCE (coordinator, Delivering stage)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO delivery_outbox (card_number, recipient_email, ...)       │
//! │       │                                                                 │
//! │       │  The credential row is already committed; a failed enqueue     │
//! │       │  is logged, never rolled back into the issuance outcome.       │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            BACKGROUND DELIVERY WORKER (async)                   │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT pending (delivered_at IS NULL AND                    │   │
//! │  │                     dead_lettered_at IS NULL)                   │   │
//! │  │  2. For each entry:                                             │   │
//! │  │     a. Hand to the DeliveryTransport collaborator               │   │
//! │  │     b. On success: mark_delivered                               │   │
//! │  │     c. On failure: mark_failed (attempts += 1)                  │   │
//! │  │     d. Attempts exhausted: mark_dead_lettered                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • The credential is never lost (it's in gift_credentials)             │
//! │  • Delivery retries survive restarts (jobs are durable rows)           │
//! │  • Dead-lettered jobs stay visible for operators                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use giftwise_core::{DeliveryJob, DeliveryOutboxEntry};

/// All columns of an outbox row, in schema order.
const OUTBOX_COLUMNS: &str = "\
    id, card_number, recipient_email, artifact_ref, attempts, last_error, \
    created_at, attempted_at, delivered_at, dead_lettered_at";

/// Repository for delivery outbox operations.
#[derive(Debug, Clone)]
pub struct DeliveryOutboxRepository {
    pool: SqlitePool,
}

impl DeliveryOutboxRepository {
    /// Creates a new DeliveryOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeliveryOutboxRepository { pool }
    }

    /// Queues a card delivery.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let job = DeliveryJob { card_number, recipient_email, artifact_ref };
    /// repo.enqueue(&job).await?;
    /// ```
    pub async fn enqueue(&self, job: &DeliveryJob) -> DbResult<DeliveryOutboxEntry> {
        let entry = DeliveryOutboxEntry {
            id: Uuid::new_v4().to_string(),
            card_number: job.card_number,
            recipient_email: job.recipient_email.clone(),
            artifact_ref: job.artifact_ref.clone(),
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            delivered_at: None,
            dead_lettered_at: None,
        };

        debug!(
            card_number = %entry.card_number,
            recipient_email = %entry.recipient_email,
            "Queuing card delivery"
        );

        sqlx::query(
            r#"
            INSERT INTO delivery_outbox (
                id, card_number, recipient_email, artifact_ref, attempts,
                last_error, created_at, attempted_at, delivered_at, dead_lettered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.card_number)
        .bind(&entry.recipient_email)
        .bind(&entry.artifact_ref)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.attempted_at)
        .bind(entry.delivered_at)
        .bind(entry.dead_lettered_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Gets pending entries that still need delivery.
    ///
    /// ## Returns
    /// Entries with neither `delivered_at` nor `dead_lettered_at` set,
    /// oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<DeliveryOutboxEntry>> {
        let entries = sqlx::query_as::<_, DeliveryOutboxEntry>(&format!(
            r#"
            SELECT {OUTBOX_COLUMNS} FROM delivery_outbox
            WHERE delivered_at IS NULL AND dead_lettered_at IS NULL
            ORDER BY created_at ASC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as successfully delivered.
    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE delivery_outbox SET
                delivered_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a delivery failure (attempt counted, job stays pending).
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE delivery_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retires a job that exhausted its retry budget.
    ///
    /// The row is kept (with `dead_lettered_at` set) so operators can see
    /// and replay it; it just stops matching the pending scan.
    pub async fn mark_dead_lettered(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE delivery_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3,
                dead_lettered_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts entries still awaiting delivery.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM delivery_outbox \
             WHERE delivered_at IS NULL AND dead_lettered_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Counts dead-lettered entries (operator-actionable backlog).
    pub async fn count_dead_lettered(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM delivery_outbox WHERE dead_lettered_at IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes old delivered entries (cleanup).
    ///
    /// Dead-lettered rows are never cleaned up automatically.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_delivered(&self, days_old: u32) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM delivery_outbox
            WHERE delivered_at IS NOT NULL
            AND delivered_at < datetime('now', '-' || ?1 || ' days')
            "#,
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
