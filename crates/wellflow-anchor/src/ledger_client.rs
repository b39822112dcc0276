//! Event ledger client — dedup buffer in front of the consensus log.
//!
//! Duplicate submissions of the same `message_id` within the recent-history
//! window return the buffered receipt annotated `duplicate=true` and perform
//! **no** network call. The buffer is bounded: once capacity is reached the
//! oldest entry is evicted first.
//!
//! Submission failures are surfaced and **not** cached, so a retry with the
//! same `message_id` reaches the real log.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use wellflow_types::{
    AnchorReceipt, CoreConfig, EventEnvelope, MessageId, PublishOutcome, Result, WellflowError,
    constants,
};

use crate::remote::ConsensusLog;

/// Bounded recent-history cache keyed by `message_id`.
///
/// Internally a map plus an insertion-order queue for oldest-first eviction.
struct DedupBuffer {
    /// Receipts for recently published messages.
    receipts: HashMap<MessageId, AnchorReceipt>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<MessageId>,
    /// Maximum number of entries before eviction kicks in.
    capacity: usize,
}

impl DedupBuffer {
    fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "DedupBuffer capacity must be > 0");
        Self {
            receipts: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn get(&self, message_id: &MessageId) -> Option<AnchorReceipt> {
        self.receipts.get(message_id).cloned()
    }

    fn insert(&mut self, message_id: MessageId, receipt: AnchorReceipt) {
        if self.receipts.contains_key(&message_id) {
            // A racing publish won; keep the first recorded receipt.
            return;
        }
        if self.receipts.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.receipts.remove(&oldest);
            }
        }
        self.order.push_back(message_id.clone());
        self.receipts.insert(message_id, receipt);
    }

    fn len(&self) -> usize {
        self.receipts.len()
    }
}

/// Client for anchoring events on the external consensus log, with a bounded
/// dedup buffer keyed by `message_id`.
///
/// This buffer governs only duplicate submission to the log itself.
/// Whole-operation idempotency (including downstream side effects such as
/// payouts) is governed by the idempotency store one layer up.
pub struct EventLedgerClient {
    log: Arc<dyn ConsensusLog>,
    topic: String,
    buffer: Mutex<DedupBuffer>,
}

impl EventLedgerClient {
    /// Create a client publishing on `topic` with the default buffer capacity.
    #[must_use]
    pub fn new(log: Arc<dyn ConsensusLog>, topic: impl Into<String>) -> Self {
        Self::with_capacity(log, topic, constants::DEDUP_BUFFER_CAPACITY)
    }

    /// Create a client from a [`CoreConfig`]: topic and buffer capacity are
    /// both drawn from it.
    #[must_use]
    pub fn from_config(log: Arc<dyn ConsensusLog>, config: &CoreConfig) -> Self {
        Self::with_capacity(log, config.event_topic.clone(), config.dedup_capacity)
    }

    /// Create a client with a custom dedup buffer capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(
        log: Arc<dyn ConsensusLog>,
        topic: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            log,
            topic: topic.into(),
            buffer: Mutex::new(DedupBuffer::new(capacity)),
        }
    }

    /// Publish an event envelope.
    ///
    /// On a buffer hit, returns the buffered receipt with `duplicate=true`
    /// and makes no network call. On a miss, submits to the consensus log,
    /// blocks for the acknowledgement, and records the receipt in the buffer
    /// before returning.
    ///
    /// # Errors
    /// Returns [`WellflowError::EventSubmissionFailed`] if the log rejects
    /// the submission. The failure is not cached: a subsequent call with the
    /// same `message_id` retries the real submission.
    pub fn publish(&self, envelope: &EventEnvelope) -> Result<PublishOutcome> {
        if let Some(receipt) = self
            .buffer
            .lock()
            .expect("dedup buffer mutex poisoned")
            .get(&envelope.message_id)
        {
            tracing::debug!(
                message_id = %envelope.message_id,
                kind = %envelope.kind,
                sequence = receipt.sequence_number,
                "dedup buffer hit, suppressing resubmission"
            );
            return Ok(PublishOutcome {
                receipt,
                duplicate: true,
            });
        }

        let message = serde_json::to_vec(envelope)
            .map_err(|e| WellflowError::Serialization(e.to_string()))?;

        // The buffer lock is not held across the blocking submit.
        let receipt = self.log.submit(&self.topic, &message)?;

        tracing::info!(
            message_id = %envelope.message_id,
            kind = %envelope.kind,
            tx_id = %receipt.tx_id,
            sequence = receipt.sequence_number,
            "event anchored"
        );

        self.buffer
            .lock()
            .expect("dedup buffer mutex poisoned")
            .insert(envelope.message_id.clone(), receipt.clone());

        Ok(PublishOutcome {
            receipt,
            duplicate: false,
        })
    }

    /// Number of message ids currently held in the dedup buffer.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.lock().expect("dedup buffer mutex poisoned").len()
    }

    /// The topic this client anchors on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryLog;
    use wellflow_types::{EventPayload, SettlementId, WellId};

    fn envelope(id: &str) -> EventEnvelope {
        EventEnvelope::new(
            MessageId::from_str(id),
            EventPayload::SettlementApproved {
                settlement_id: SettlementId::new(),
                well_id: WellId::new(),
            },
        )
    }

    fn client(log: &Arc<InMemoryLog>) -> EventLedgerClient {
        EventLedgerClient::new(Arc::clone(log) as Arc<dyn ConsensusLog>, "test.topic")
    }

    #[test]
    fn first_publish_hits_the_log() {
        let log = Arc::new(InMemoryLog::new());
        let client = client(&log);
        let out = client.publish(&envelope("m1")).unwrap();
        assert!(!out.duplicate);
        assert_eq!(log.count_on("test.topic"), 1);
    }

    #[test]
    fn duplicate_returns_buffered_receipt_without_network_call() {
        let log = Arc::new(InMemoryLog::new());
        let client = client(&log);

        let first = client.publish(&envelope("m1")).unwrap();
        let second = client.publish(&envelope("m1")).unwrap();

        assert!(second.duplicate);
        assert_eq!(second.receipt.sequence_number, first.receipt.sequence_number);
        assert_eq!(second.receipt.tx_id, first.receipt.tx_id);
        // The external log shows exactly one message.
        assert_eq!(log.count_on("test.topic"), 1);
    }

    #[test]
    fn distinct_message_ids_publish_separately() {
        let log = Arc::new(InMemoryLog::new());
        let client = client(&log);
        client.publish(&envelope("m1")).unwrap();
        client.publish(&envelope("m2")).unwrap();
        assert_eq!(log.count_on("test.topic"), 2);
        assert_eq!(client.buffered(), 2);
    }

    #[test]
    fn failure_is_not_cached() {
        let log = Arc::new(InMemoryLog::new());
        let client = client(&log);

        log.set_failing(true);
        let err = client.publish(&envelope("m1")).unwrap_err();
        assert!(matches!(err, WellflowError::EventSubmissionFailed { .. }));
        assert_eq!(client.buffered(), 0);

        // Retry with the same message id reaches the real log.
        log.set_failing(false);
        let out = client.publish(&envelope("m1")).unwrap();
        assert!(!out.duplicate);
        assert_eq!(log.count_on("test.topic"), 1);
    }

    #[test]
    fn evicts_oldest_once_capacity_reached() {
        let log = Arc::new(InMemoryLog::new());
        let client = EventLedgerClient::with_capacity(
            Arc::clone(&log) as Arc<dyn ConsensusLog>,
            "test.topic",
            2,
        );

        client.publish(&envelope("m1")).unwrap();
        client.publish(&envelope("m2")).unwrap();
        client.publish(&envelope("m3")).unwrap();
        assert_eq!(client.buffered(), 2);

        // m1 was evicted: republishing it is a fresh submission.
        let out = client.publish(&envelope("m1")).unwrap();
        assert!(!out.duplicate);
        assert_eq!(log.count_on("test.topic"), 4);

        // m3 is still buffered.
        let out = client.publish(&envelope("m3")).unwrap();
        assert!(out.duplicate);
    }

    #[test]
    fn from_config_uses_configured_topic() {
        let log = Arc::new(InMemoryLog::new());
        let client = EventLedgerClient::from_config(
            Arc::clone(&log) as Arc<dyn ConsensusLog>,
            &CoreConfig::default(),
        );
        assert_eq!(client.topic(), "wellflow.settlements");
        client.publish(&envelope("m1")).unwrap();
        assert_eq!(log.count_on("wellflow.settlements"), 1);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_capacity_panics() {
        let log = Arc::new(InMemoryLog::new());
        let _ = EventLedgerClient::with_capacity(log as Arc<dyn ConsensusLog>, "t", 0);
    }
}
