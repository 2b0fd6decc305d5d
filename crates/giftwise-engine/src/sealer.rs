//! # Token Sealer
//!
//! AES-256-GCM sealing of redemption secrets.
//!
//! ## Sealing Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Token Sealing                                    │
//! │                                                                         │
//! │  seal()                                                                 │
//! │    │                                                                    │
//! │    ├── secret   = 20 random bytes (OS CSPRNG)                          │
//! │    ├── nonce    = 12 random bytes (fresh per call, never cached,       │
//! │    │              never derived from the card number)                  │
//! │    └── sealed   = AES-256-GCM(key, nonce, secret)                      │
//! │                   → SealedToken { nonce, ciphertext+tag }              │
//! │                                                                         │
//! │  unseal(sealed)                                                         │
//! │    └── decrypt + authenticate → secret, or TokenInvalid                │
//! │                                                                         │
//! │  The key is process-wide, loaded once at startup from the external     │
//! │  secret store. The plaintext secret is never persisted and both key    │
//! │  and secret are wiped on drop.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

use giftwise_core::token::TOKEN_NONCE_LEN;
use giftwise_core::{SealedToken, REDEMPTION_SECRET_LEN};

// =============================================================================
// Errors
// =============================================================================

/// Sealing/unsealing errors.
#[derive(Debug, Error)]
pub enum SealError {
    /// Key material has the wrong shape (not 32 bytes / 64 hex chars).
    #[error("sealing key must be 64 hex characters (32 bytes)")]
    InvalidKey,

    /// Cipher failure while sealing.
    #[error("sealing failed: {0}")]
    Encrypt(String),

    /// The presented token is malformed or failed authentication.
    ///
    /// Deliberately carries no detail: whether the failure was a bad wire
    /// format, a wrong nonce or a forged tag is not reported to callers.
    #[error("token is malformed or forged")]
    TokenInvalid,
}

// =============================================================================
// Sealing Key
// =============================================================================

/// The process-wide 256-bit sealing key.
///
/// Wrapped in [`Zeroizing`] so the material is wiped when dropped. The Debug
/// impl is redacted; the key must never appear in logs or persisted data.
#[derive(Clone)]
pub struct SealingKey(Zeroizing<[u8; 32]>);

impl SealingKey {
    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        SealingKey(Zeroizing::new(bytes))
    }

    /// Parses a key from its 64-character hex form (the shape the external
    /// secret store hands out).
    pub fn from_hex(hex_key: &str) -> Result<Self, SealError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| SealError::InvalidKey)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| SealError::InvalidKey)?;
        Ok(SealingKey(Zeroizing::new(bytes)))
    }

    fn as_slice(&self) -> &[u8] {
        &*self.0
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealingKey(..)")
    }
}

// =============================================================================
// Token Sealer
// =============================================================================

/// A redemption secret in the clear.
///
/// Exists only in memory between sealing and QR encoding (or during
/// verification); wiped on drop, never persisted, never logged.
pub type RedemptionSecret = Zeroizing<Vec<u8>>;

/// Seals and unseals redemption secrets under the process-wide key.
#[derive(Debug, Clone)]
pub struct TokenSealer {
    key: SealingKey,
}

impl TokenSealer {
    /// Creates a sealer over the given key.
    pub fn new(key: SealingKey) -> Self {
        TokenSealer { key }
    }

    /// Generates a fresh redemption secret and its sealed form.
    ///
    /// Every call draws an independent 20-byte secret and an independent
    /// 12-byte nonce from the OS CSPRNG; nonce reuse across calls is ruled
    /// out by construction.
    pub fn seal(&self) -> Result<(RedemptionSecret, SealedToken), SealError> {
        let cipher = Aes256Gcm::new_from_slice(self.key.as_slice())
            .map_err(|e| SealError::Encrypt(format!("cipher init failed: {e}")))?;

        let mut secret = Zeroizing::new(vec![0u8; REDEMPTION_SECRET_LEN]);
        OsRng.fill_bytes(secret.as_mut_slice());

        let mut nonce_bytes = [0u8; TOKEN_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = AesNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, secret.as_slice())
            .map_err(|e| SealError::Encrypt(format!("encryption failed: {e}")))?;

        let sealed = SealedToken {
            nonce: nonce_bytes,
            ciphertext,
        };

        Ok((secret, sealed))
    }

    /// Recovers the plaintext secret from a sealed token.
    ///
    /// Fails with [`SealError::TokenInvalid`] for anything that does not
    /// decrypt and authenticate under the process key.
    pub fn unseal(&self, sealed: &SealedToken) -> Result<RedemptionSecret, SealError> {
        let cipher = Aes256Gcm::new_from_slice(self.key.as_slice())
            .map_err(|_| SealError::TokenInvalid)?;

        let nonce = AesNonce::from_slice(&sealed.nonce);

        let plaintext = cipher
            .decrypt(nonce, sealed.ciphertext.as_ref())
            .map_err(|_| SealError::TokenInvalid)?;

        Ok(Zeroizing::new(plaintext))
    }

    /// Decodes a wire string and unseals it in one step.
    pub fn unseal_encoded(&self, encoded: &str) -> Result<RedemptionSecret, SealError> {
        let sealed = SealedToken::decode(encoded).map_err(|_| SealError::TokenInvalid)?;
        self.unseal(&sealed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sealer() -> TokenSealer {
        TokenSealer::new(SealingKey::from_bytes([0x42; 32]))
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let sealer = test_sealer();
        let (secret, sealed) = sealer.seal().unwrap();

        let recovered = sealer.unseal(&sealed).unwrap();
        assert_eq!(recovered.as_slice(), secret.as_slice());
        assert_eq!(secret.len(), REDEMPTION_SECRET_LEN);
    }

    #[test]
    fn test_roundtrip_survives_wire_encoding() {
        let sealer = test_sealer();
        let (secret, sealed) = sealer.seal().unwrap();

        let recovered = sealer.unseal_encoded(&sealed.encode()).unwrap();
        assert_eq!(recovered.as_slice(), secret.as_slice());
    }

    #[test]
    fn test_fresh_nonce_and_secret_per_seal() {
        let sealer = test_sealer();
        let (s1, t1) = sealer.seal().unwrap();
        let (s2, t2) = sealer.seal().unwrap();

        assert_ne!(t1.nonce, t2.nonce);
        assert_ne!(t1.ciphertext, t2.ciphertext);
        assert_ne!(s1.as_slice(), s2.as_slice());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealer = test_sealer();
        let other = TokenSealer::new(SealingKey::from_bytes([0x43; 32]));

        let (_, sealed) = sealer.seal().unwrap();
        let result = other.unseal(&sealed);
        assert!(matches!(result, Err(SealError::TokenInvalid)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let sealer = test_sealer();
        let (_, mut sealed) = sealer.seal().unwrap();

        if let Some(byte) = sealed.ciphertext.first_mut() {
            *byte ^= 0x01;
        }

        let result = sealer.unseal(&sealed);
        assert!(matches!(result, Err(SealError::TokenInvalid)));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let sealer = test_sealer();
        let (_, mut sealed) = sealer.seal().unwrap();

        sealed.nonce[0] ^= 0x01;

        let result = sealer.unseal(&sealed);
        assert!(matches!(result, Err(SealError::TokenInvalid)));
    }

    #[test]
    fn test_unseal_encoded_rejects_garbage() {
        let sealer = test_sealer();
        for garbage in ["", "not-a-token", "zz:zz", "0102030405060708090a0b0c"] {
            assert!(
                matches!(sealer.unseal_encoded(garbage), Err(SealError::TokenInvalid)),
                "{garbage}"
            );
        }
    }

    #[test]
    fn test_key_from_hex() {
        let hex_key = "42".repeat(32);
        let key = SealingKey::from_hex(&hex_key).unwrap();
        let sealer = TokenSealer::new(key);
        let (secret, sealed) = sealer.seal().unwrap();

        // Interoperates with the raw-bytes constructor
        let recovered = test_sealer().unseal(&sealed).unwrap();
        assert_eq!(recovered.as_slice(), secret.as_slice());
    }

    #[test]
    fn test_key_from_hex_rejects_bad_shapes() {
        assert!(SealingKey::from_hex("").is_err());
        assert!(SealingKey::from_hex("42").is_err());
        assert!(SealingKey::from_hex(&"42".repeat(31)).is_err());
        assert!(SealingKey::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SealingKey::from_bytes([0x42; 32]);
        assert_eq!(format!("{key:?}"), "SealingKey(..)");
    }
}
