//! SHA-256 digest newtypes used for content addressing and request identity.
//!
//! [`ContentHash`] identifies document/evidence content and Merkle nodes.
//! [`RequestHash`] is the digest of a normalized operation input, used by the
//! idempotency layer to detect a key being reused for a different request.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, WellflowError};

// ---------------------------------------------------------------------------
// ContentHash
// ---------------------------------------------------------------------------

/// A 32-byte SHA-256 content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// The all-zero sentinel. Used as the Merkle root of an empty input set;
    /// never anchored.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Parse a 64-character hex string.
    ///
    /// # Errors
    /// Returns [`WellflowError::Validation`] if the input is not 64 hex chars.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| WellflowError::Validation {
            reason: format!("invalid content hash hex: {e}"),
        })?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| WellflowError::Validation {
            reason: "content hash must be 32 bytes".to_string(),
        })?;
        Ok(Self(arr))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// RequestHash
// ---------------------------------------------------------------------------

/// Digest of a normalized operation input.
///
/// Two calls with the same idempotency key must carry the same `RequestHash`;
/// a mismatch means the key was reused for a semantically different request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestHash(pub [u8; 32]);

impl RequestHash {
    /// Hash a serializable value via its canonical JSON encoding, with a
    /// domain-separation label so different operations never collide.
    ///
    /// # Errors
    /// Returns [`WellflowError::Serialization`] if the value fails to encode.
    pub fn of<T: Serialize>(label: &str, value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)
            .map_err(|e| WellflowError::Serialization(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(b"wellflow:request:v2:");
        hasher.update(label.as_bytes());
        hasher.update(b":");
        hasher.update(&encoded);
        Ok(Self(hasher.finalize().into()))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RequestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}
