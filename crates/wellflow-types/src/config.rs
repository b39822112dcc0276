//! Configuration for the WellFlow core.
//!
//! Collaborator-specific settings (network selector, operator credentials,
//! balance thresholds) belong to whichever `ConsensusLog` / `TokenLedger`
//! implementation is injected at construction and are not modeled here.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Configuration for the settlement core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Capacity of the event dedup buffer (oldest-first eviction).
    pub dedup_capacity: usize,
    /// Retention window for idempotency records, in seconds.
    pub idempotency_retention_secs: i64,
    /// Consensus-log topic settlement events are anchored on.
    pub event_topic: String,
    /// Maximum documents accepted into one bundle.
    pub max_bundle_documents: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: constants::DEDUP_BUFFER_CAPACITY,
            idempotency_retention_secs: constants::IDEMPOTENCY_RETENTION_SECS,
            event_topic: constants::DEFAULT_EVENT_TOPIC.to_string(),
            max_bundle_documents: constants::MAX_BUNDLE_DOCUMENTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_config_defaults() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.dedup_capacity, 1_000);
        assert_eq!(cfg.event_topic, "wellflow.settlements");
        assert!(cfg.idempotency_retention_secs >= 24 * 60 * 60);
    }

    #[test]
    fn core_config_serde_roundtrip() {
        let cfg = CoreConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.dedup_capacity, back.dedup_capacity);
        assert_eq!(cfg.event_topic, back.event_topic);
    }
}
