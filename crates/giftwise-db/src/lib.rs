//! # giftwise-db: Credential Store for the Giftwise Engine
//!
//! This crate provides durable storage for gift credentials and the delivery
//! outbox. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Giftwise Data Flow                                │
//! │                                                                         │
//! │  IssuanceCoordinator / RedemptionVerifier / DeliveryProcessor          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   giftwise-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │(credential.rs)│    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CredentialRepo│    │ 001_init.sql │  │   │
//! │  │   │ WAL mode      │    │ OutboxRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Two Atomic Guarantees
//!
//! Everything correctness-critical in the engine bottoms out here:
//!
//! 1. **Uniqueness**: `gift_credentials.card_number` carries a UNIQUE
//!    constraint checked at commit time. The allocator's pre-check is an
//!    optimization; this constraint is the invariant.
//! 2. **One-way transitions**: status changes go through a guarded UPDATE
//!    (`WHERE revision = ? AND status = 'issued'`) — a compare-and-set that
//!    lets exactly one concurrent redeemer win.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use giftwise_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/giftwise.db")).await?;
//! let credential = db.credentials().find_by_token(sealed).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::credential::CredentialRepository;
pub use repository::outbox::DeliveryOutboxRepository;
