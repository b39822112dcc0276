//! Globally unique identifiers used throughout WellFlow.
//!
//! Entity IDs use UUIDv7 for time-ordered lexicographic sorting. The two
//! caller-supplied tokens — [`MessageId`] and [`IdempotencyKey`] — are opaque
//! strings: the caller controls them so that retries carry the same token.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WellflowError};

// ---------------------------------------------------------------------------
// WellId
// ---------------------------------------------------------------------------

/// Unique identifier for a well (the revenue-producing asset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct WellId(pub Uuid);

impl WellId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for WellId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "well:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SettlementId
// ---------------------------------------------------------------------------

/// Globally unique settlement identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SettlementId(pub Uuid);

impl SettlementId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Extract the embedded timestamp (milliseconds since UNIX epoch) from UUIDv7.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        let bytes = self.0.as_bytes();
        u64::from_be_bytes([
            0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
        ])
    }
}

impl Default for SettlementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PayoutId
// ---------------------------------------------------------------------------

/// Unique identifier for a single payout row within a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PayoutId(pub Uuid);

impl PayoutId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PayoutId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payout:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Unique identifier for an investor / recipient account on the token ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// Unique identifier for an evidence document inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// Caller-generated unique token for consensus-log dedup.
///
/// Resubmitting the same `MessageId` within the dedup window returns the
/// previously recorded outcome instead of re-publishing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Fresh random message ID (UUIDv7 string).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn from_str(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Deterministic `MessageId` for a settlement transition.
    ///
    /// A retried transition for the same settlement produces the **exact
    /// same** message ID, so the dedup buffer collapses the resubmission.
    #[must_use]
    pub fn for_transition(settlement_id: SettlementId, transition: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"wellflow:message_id:v2:");
        hasher.update(settlement_id.0.as_bytes());
        hasher.update(transition.as_bytes());
        let hash = hasher.finalize();
        Self(hex::encode(&hash[..16]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IdempotencyKey
// ---------------------------------------------------------------------------

/// Caller-supplied idempotency token scoping one logical operation.
///
/// Keys are validated at the boundary: non-empty, at most
/// [`crate::constants::MAX_IDEMPOTENCY_KEY_LEN`] bytes, visible ASCII only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Parse and validate a caller-supplied token.
    ///
    /// # Errors
    /// Returns [`WellflowError::MalformedIdempotencyKey`] if the token is
    /// empty, too long, or contains non-visible-ASCII characters.
    pub fn parse(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(WellflowError::MalformedIdempotencyKey {
                reason: "key is empty".to_string(),
            });
        }
        if token.len() > crate::constants::MAX_IDEMPOTENCY_KEY_LEN {
            return Err(WellflowError::MalformedIdempotencyKey {
                reason: format!(
                    "key length {} exceeds {} bytes",
                    token.len(),
                    crate::constants::MAX_IDEMPOTENCY_KEY_LEN
                ),
            });
        }
        if !token.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
            return Err(WellflowError::MalformedIdempotencyKey {
                reason: "key contains non-visible-ASCII characters".to_string(),
            });
        }
        Ok(Self(token))
    }

    /// Fresh random key (UUIDv7 string). Convenient for clients and tests.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_id_uniqueness() {
        let a = SettlementId::new();
        let b = SettlementId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn settlement_id_ordering() {
        let a = SettlementId::new();
        let b = SettlementId::new();
        assert!(a < b);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn settlement_id_timestamp_extraction() {
        let before = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let id = SettlementId::new();
        let after = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let ts = id.timestamp_ms();
        assert!(
            ts >= before && ts <= after,
            "ts={ts}, before={before}, after={after}"
        );
    }

    #[test]
    fn message_id_deterministic_for_transition() {
        let sid = SettlementId::from_bytes([7; 16]);
        let a = MessageId::for_transition(sid, "settlement_approved");
        let b = MessageId::for_transition(sid, "settlement_approved");
        assert_eq!(a, b);
        let c = MessageId::for_transition(sid, "settlement_rejection");
        assert_ne!(a, c);
    }

    #[test]
    fn message_id_differs_per_settlement() {
        let a = MessageId::for_transition(SettlementId::from_bytes([1; 16]), "x");
        let b = MessageId::for_transition(SettlementId::from_bytes([2; 16]), "x");
        assert_ne!(a, b);
    }

    #[test]
    fn idempotency_key_accepts_typical_tokens() {
        assert!(IdempotencyKey::parse("retry-2024-01-31-001").is_ok());
        assert!(IdempotencyKey::parse(Uuid::now_v7().to_string()).is_ok());
    }

    #[test]
    fn idempotency_key_rejects_empty() {
        let err = IdempotencyKey::parse("").unwrap_err();
        assert!(matches!(err, WellflowError::MalformedIdempotencyKey { .. }));
    }

    #[test]
    fn idempotency_key_rejects_overlong() {
        let long = "k".repeat(crate::constants::MAX_IDEMPOTENCY_KEY_LEN + 1);
        let err = IdempotencyKey::parse(long).unwrap_err();
        assert!(matches!(err, WellflowError::MalformedIdempotencyKey { .. }));
    }

    #[test]
    fn idempotency_key_rejects_whitespace_and_control() {
        assert!(IdempotencyKey::parse("has space").is_err());
        assert!(IdempotencyKey::parse("tab\there").is_err());
    }

    #[test]
    fn serde_roundtrips() {
        let wid = WellId::new();
        let json = serde_json::to_string(&wid).unwrap();
        let back: WellId = serde_json::from_str(&json).unwrap();
        assert_eq!(wid, back);

        let mid = MessageId::from_str("m1");
        let json = serde_json::to_string(&mid).unwrap();
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(mid, back);
    }
}
