//! # Delivery Processor
//!
//! Drains the delivery outbox and hands jobs to the transport collaborator.
//!
//! ## Delivery Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Delivery Processor Flow                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   delivery_outbox Table                         │   │
//! │  │                                                                 │   │
//! │  │  id | card_number | email | artifact_ref | attempts | ...      │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │ poll interval                           │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   DeliveryProcessor                             │   │
//! │  │                                                                 │   │
//! │  │  1. Poll: get_pending(batch_size)                              │   │
//! │  │  2. For each job: transport.deliver(job, artifact_path)        │   │
//! │  │  3. Success: mark_delivered                                    │   │
//! │  │  4. Failure: mark_failed (attempts += 1)                       │   │
//! │  │  5. Budget exhausted: mark_dead_lettered + WARN                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  TIMING (all configurable):                                            │
//! │  • Poll interval: 5 seconds                                            │
//! │  • Batch size: 100 jobs                                                │
//! │  • Max attempts: 10 (then dead-lettered, kept for operators)           │
//! │                                                                         │
//! │  Delivery is fully decoupled from issuance: a job may run after the    │
//! │  issuance response returned, and its failure never touches the         │
//! │  credential record.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The actual mail/notification transport is an external collaborator,
//! injected through [`DeliveryTransport`].

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::render::ArtifactStore;
use giftwise_core::DeliveryJob;
use giftwise_db::{Database, DbResult};

// =============================================================================
// Transport Boundary
// =============================================================================

/// Delivery transport errors (whatever the collaborator reports).
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport could not deliver the card.
    #[error("delivery transport failed: {0}")]
    Transport(String),
}

/// The outward-facing seam to the mail/notification collaborator.
///
/// Implementations send the rendered card at `artifact_path` to
/// `job.recipient_email` however they see fit; the processor owns retry
/// bookkeeping, the transport owns one attempt.
pub trait DeliveryTransport: Send + Sync + 'static {
    /// Delivers one card. An `Err` counts as a failed attempt.
    fn deliver(
        &self,
        job: &DeliveryJob,
        artifact_path: &Path,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

// =============================================================================
// Policy
// =============================================================================

/// Delivery retry policy. The retry/dead-letter behavior is configuration,
/// not hardcoded.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// How often the outbox is polled.
    pub poll_interval: Duration,

    /// Maximum jobs pulled per poll.
    pub batch_size: u32,

    /// Attempts before a job is dead-lettered.
    pub max_attempts: i64,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy {
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
            max_attempts: 10,
        }
    }
}

// =============================================================================
// Processor
// =============================================================================

/// Counters from one processing pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRunStats {
    pub delivered: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// Polls the delivery outbox and pushes jobs through the transport.
pub struct DeliveryProcessor<T> {
    db: Database,
    artifacts: ArtifactStore,
    transport: T,
    policy: DeliveryPolicy,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a running delivery processor.
#[derive(Clone)]
pub struct DeliveryProcessorHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DeliveryProcessorHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl<T: DeliveryTransport> DeliveryProcessor<T> {
    /// Creates a processor and its control handle.
    pub fn new(
        db: Database,
        artifacts: ArtifactStore,
        transport: T,
        policy: DeliveryPolicy,
    ) -> (Self, DeliveryProcessorHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let processor = DeliveryProcessor {
            db,
            artifacts,
            transport,
            policy,
            shutdown_rx,
        };
        let handle = DeliveryProcessorHandle { shutdown_tx };

        (processor, handle)
    }

    /// Runs the poll loop until shutdown.
    ///
    /// Spawn this as a background task; issuance never waits on it.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.policy.poll_interval.as_secs(),
            max_attempts = self.policy.max_attempts,
            "Delivery processor starting"
        );

        let mut interval = tokio::time::interval(self.policy.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_pending().await {
                        error!(error = %e, "Delivery pass failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Delivery processor shutting down");
                    break;
                }
            }
        }

        info!("Delivery processor stopped");
    }

    /// Runs one processing pass over the pending backlog.
    ///
    /// Exposed separately so embedders (and tests) can drive delivery
    /// without the timer loop.
    pub async fn process_pending(&self) -> DbResult<DeliveryRunStats> {
        let outbox = self.db.delivery_outbox();
        let pending = outbox.get_pending(self.policy.batch_size).await?;

        if pending.is_empty() {
            debug!("No pending deliveries");
            return Ok(DeliveryRunStats::default());
        }

        debug!(count = pending.len(), "Processing pending deliveries");

        let mut stats = DeliveryRunStats::default();

        for entry in pending {
            let job = entry.job();
            let artifact_path = self.artifacts.path_for(&job.artifact_ref);

            match self.transport.deliver(&job, &artifact_path).await {
                Ok(()) => {
                    outbox.mark_delivered(&entry.id).await?;
                    info!(
                        card_number = %job.card_number,
                        recipient_email = %job.recipient_email,
                        "Card delivered"
                    );
                    stats.delivered += 1;
                }
                Err(e) => {
                    let message = e.to_string();
                    if entry.attempts + 1 >= self.policy.max_attempts {
                        outbox.mark_dead_lettered(&entry.id, &message).await?;
                        warn!(
                            id = %entry.id,
                            card_number = %job.card_number,
                            attempts = entry.attempts + 1,
                            error = %message,
                            "Delivery dead-lettered after exhausting its retry budget"
                        );
                        stats.dead_lettered += 1;
                    } else {
                        outbox.mark_failed(&entry.id, &message).await?;
                        warn!(
                            id = %entry.id,
                            card_number = %job.card_number,
                            attempts = entry.attempts + 1,
                            error = %message,
                            "Delivery attempt failed; will retry"
                        );
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
