//! # Engine Configuration
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults — except the encryption key, which is required and never
//! defaulted: it comes from the external secret store and must not appear in
//! code, logs or persisted data.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::allocator::AllocatorPolicy;
use crate::coordinator::IssuancePolicy;
use crate::delivery::DeliveryPolicy;
use crate::sealer::SealingKey;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database path.
    pub database_path: PathBuf,

    /// Process-wide sealing key (from `GIFTWISE_ENCRYPTION_KEY`, 64 hex
    /// chars). The Debug form is redacted.
    pub sealing_key: SealingKey,

    /// Static background template for the renderer.
    pub template_path: PathBuf,

    /// Directory where rendered artifacts are written.
    pub artifact_dir: PathBuf,

    /// Issuance policy (validity window, stage timeout, allocator bound).
    pub issuance: IssuancePolicy,

    /// Delivery retry/dead-letter policy.
    pub delivery: DeliveryPolicy,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// ## Variables
    /// ```text
    /// GIFTWISE_ENCRYPTION_KEY        (required, 64 hex chars)
    /// GIFTWISE_DATABASE_PATH         default ./giftwise.db
    /// GIFTWISE_TEMPLATE_PATH         default ./assets/card_background.png
    /// GIFTWISE_ARTIFACT_DIR          default ./artifacts
    /// GIFTWISE_VALIDITY_DAYS         default 365
    /// GIFTWISE_ALLOC_MAX_ATTEMPTS    default 1000
    /// GIFTWISE_STAGE_TIMEOUT_SECS    default 10
    /// GIFTWISE_DELIVERY_POLL_SECS    default 5
    /// GIFTWISE_DELIVERY_MAX_ATTEMPTS default 10
    /// GIFTWISE_DELIVERY_BATCH_SIZE   default 100
    /// ```
    pub fn load() -> Result<Self, ConfigError> {
        let sealing_key = match env::var("GIFTWISE_ENCRYPTION_KEY") {
            Ok(hex_key) => SealingKey::from_hex(&hex_key)
                .map_err(|_| ConfigError::InvalidValue("GIFTWISE_ENCRYPTION_KEY".to_string()))?,
            Err(_) => {
                return Err(ConfigError::MissingRequired(
                    "GIFTWISE_ENCRYPTION_KEY".to_string(),
                ))
            }
        };

        let config = EngineConfig {
            database_path: env::var("GIFTWISE_DATABASE_PATH")
                .unwrap_or_else(|_| "./giftwise.db".to_string())
                .into(),

            sealing_key,

            template_path: env::var("GIFTWISE_TEMPLATE_PATH")
                .unwrap_or_else(|_| "./assets/card_background.png".to_string())
                .into(),

            artifact_dir: env::var("GIFTWISE_ARTIFACT_DIR")
                .unwrap_or_else(|_| "./artifacts".to_string())
                .into(),

            issuance: IssuancePolicy {
                validity_days: parse_var("GIFTWISE_VALIDITY_DAYS", 365)?,
                stage_timeout: Duration::from_secs(parse_var(
                    "GIFTWISE_STAGE_TIMEOUT_SECS",
                    10u64,
                )?),
                allocator: AllocatorPolicy {
                    max_attempts: parse_var("GIFTWISE_ALLOC_MAX_ATTEMPTS", 1000u32)?,
                },
            },

            delivery: DeliveryPolicy {
                poll_interval: Duration::from_secs(parse_var(
                    "GIFTWISE_DELIVERY_POLL_SECS",
                    5u64,
                )?),
                batch_size: parse_var("GIFTWISE_DELIVERY_BATCH_SIZE", 100u32)?,
                max_attempts: parse_var("GIFTWISE_DELIVERY_MAX_ATTEMPTS", 10i64)?,
            },
        };

        Ok(config)
    }
}

/// Reads an env var, falling back to `default`, failing on unparseable input.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(String),

    #[error("missing required configuration: {0}")]
    MissingRequired(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
