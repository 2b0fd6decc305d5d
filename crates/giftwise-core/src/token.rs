//! # Sealed Token Module
//!
//! Wire representation of a sealed redemption token.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A sealed token travels as a single opaque string:                      │
//! │                                                                         │
//! │      hex(nonce) ":" hex(ciphertext)                                     │
//! │      └────┬───┘     └─────┬──────┘                                      │
//! │       24 chars       ≥ 2 chars (ciphertext includes the auth tag)      │
//! │                                                                         │
//! │  The nonce is carried alongside the ciphertext so decryption is        │
//! │  self-contained. The encoded string is what the store indexes, what    │
//! │  the QR code carries, and what redemption presents.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sealing and unsealing (the actual AES-GCM work) live in giftwise-engine;
//! this module only owns the byte layout and its encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Constants
// =============================================================================

/// Nonce size in bytes (AES-GCM standard nonce size).
pub const TOKEN_NONCE_LEN: usize = 12;

/// Separator between the hex nonce and hex ciphertext.
const SEPARATOR: char = ':';

// =============================================================================
// SealedToken
// =============================================================================

/// A sealed (encrypted) redemption token: nonce + ciphertext.
///
/// The ciphertext includes the authentication tag, so tampering with either
/// half is detected at unseal time. Two sealed tokens are equal only if both
/// halves match; the store additionally keeps a UNIQUE index on the encoded
/// form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedToken {
    /// Per-seal random nonce, never reused across seals.
    pub nonce: [u8; TOKEN_NONCE_LEN],
    /// AES-GCM ciphertext of the redemption secret (tag included).
    pub ciphertext: Vec<u8>,
}

/// Error for sealed-token strings that do not parse.
///
/// Deliberately carries no detail: the caller maps any decode failure to the
/// `TokenInvalid` outcome, and the reason (truncation vs. stray characters)
/// is not security-relevant to report.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("sealed token is malformed")]
pub struct TokenDecodeError;

impl SealedToken {
    /// Encodes the token into its canonical wire string.
    ///
    /// ## Example
    /// ```rust
    /// use giftwise_core::SealedToken;
    ///
    /// let token = SealedToken { nonce: [0u8; 12], ciphertext: vec![0xAB, 0xCD] };
    /// assert_eq!(token.encode(), "000000000000000000000000:abcd");
    /// ```
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            hex::encode(self.nonce),
            SEPARATOR,
            hex::encode(&self.ciphertext)
        )
    }

    /// Decodes a wire string back into a token.
    ///
    /// ## Rules
    /// - Exactly one `:` separator
    /// - Nonce half is exactly 24 hex characters (12 bytes)
    /// - Ciphertext half is non-empty hex
    pub fn decode(encoded: &str) -> Result<Self, TokenDecodeError> {
        let (nonce_hex, ct_hex) = encoded.split_once(SEPARATOR).ok_or(TokenDecodeError)?;

        if ct_hex.contains(SEPARATOR) {
            return Err(TokenDecodeError);
        }

        let nonce_bytes = hex::decode(nonce_hex).map_err(|_| TokenDecodeError)?;
        let nonce: [u8; TOKEN_NONCE_LEN] =
            nonce_bytes.try_into().map_err(|_| TokenDecodeError)?;

        let ciphertext = hex::decode(ct_hex).map_err(|_| TokenDecodeError)?;
        if ciphertext.is_empty() {
            return Err(TokenDecodeError);
        }

        Ok(SealedToken { nonce, ciphertext })
    }
}

impl fmt::Display for SealedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for SealedToken {
    type Err = TokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SealedToken::decode(s)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SealedToken {
        SealedToken {
            nonce: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            ciphertext: vec![0xDE, 0xAD, 0xBE, 0xEF],
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let token = sample();
        let encoded = token.encode();
        let decoded = SealedToken::decode(&encoded).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_encode_format() {
        let encoded = sample().encode();
        assert_eq!(encoded, "0102030405060708090a0b0c:deadbeef");
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        assert!(SealedToken::decode("0102030405060708090a0b0cdeadbeef").is_err());
    }

    #[test]
    fn test_decode_rejects_extra_separator() {
        assert!(SealedToken::decode("0102030405060708090a0b0c:dead:beef").is_err());
    }

    #[test]
    fn test_decode_rejects_short_nonce() {
        assert!(SealedToken::decode("01020304:deadbeef").is_err());
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        assert!(SealedToken::decode("zz02030405060708090a0b0c:deadbeef").is_err());
        assert!(SealedToken::decode("0102030405060708090a0b0c:nothex").is_err());
    }

    #[test]
    fn test_decode_rejects_empty_ciphertext() {
        assert!(SealedToken::decode("0102030405060708090a0b0c:").is_err());
    }

    #[test]
    fn test_decode_rejects_empty_string() {
        assert!(SealedToken::decode("").is_err());
    }

    #[test]
    fn test_from_str() {
        let token: SealedToken = "0102030405060708090a0b0c:deadbeef".parse().unwrap();
        assert_eq!(token, sample());
    }
}
