//! Event envelope types for the anchored audit trail.
//!
//! Every settlement transition (and bundle anchoring) produces one
//! [`EventEnvelope`] submitted to the external consensus log. Payload shapes
//! form a **closed set**: one [`EventPayload`] variant per event kind,
//! validated at the boundary rather than spread as loose maps.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::ids::{AccountId, MessageId, SettlementId, WellId};
use crate::settlement::{SettlementPeriod, SettlementStatus};

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// The domain tag of an anchored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SettlementRequested,
    SettlementApproved,
    SettlementRejection,
    SettlementCancellation,
    SettlementProcessed,
    DocumentBundleAnchored,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EventKind {
    /// Stable wire label, used as the serde tag and in anchor references.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SettlementRequested => "settlement_requested",
            Self::SettlementApproved => "settlement_approved",
            Self::SettlementRejection => "settlement_rejection",
            Self::SettlementCancellation => "settlement_cancellation",
            Self::SettlementProcessed => "settlement_processed",
            Self::DocumentBundleAnchored => "document_bundle_anchored",
        }
    }
}

// ---------------------------------------------------------------------------
// EventPayload — closed per-kind payload set
// ---------------------------------------------------------------------------

/// Reference to one completed or attempted transfer inside a
/// `settlement_processed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRef {
    pub recipient: AccountId,
    pub amount: Decimal,
    /// Token-ledger tx id; `None` when the transfer failed.
    pub tx_id: Option<String>,
}

/// The closed set of event payload shapes, tagged by event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    SettlementRequested {
        settlement_id: SettlementId,
        well_id: WellId,
        period: SettlementPeriod,
        gross_revenue: Decimal,
        volume_total: Decimal,
    },
    SettlementApproved {
        settlement_id: SettlementId,
        well_id: WellId,
    },
    SettlementRejection {
        settlement_id: SettlementId,
        reason: String,
        prior_status: SettlementStatus,
    },
    SettlementCancellation {
        settlement_id: SettlementId,
        reason: String,
        prior_status: SettlementStatus,
        cancelled_payouts: usize,
    },
    SettlementProcessed {
        settlement_id: SettlementId,
        well_id: WellId,
        transfers: Vec<TransferRef>,
        success_count: usize,
        failure_count: usize,
    },
    DocumentBundleAnchored {
        well_id: WellId,
        bundle_hash: ContentHash,
        document_count: usize,
        file_id: String,
    },
}

impl EventPayload {
    /// The kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SettlementRequested { .. } => EventKind::SettlementRequested,
            Self::SettlementApproved { .. } => EventKind::SettlementApproved,
            Self::SettlementRejection { .. } => EventKind::SettlementRejection,
            Self::SettlementCancellation { .. } => EventKind::SettlementCancellation,
            Self::SettlementProcessed { .. } => EventKind::SettlementProcessed,
            Self::DocumentBundleAnchored { .. } => EventKind::DocumentBundleAnchored,
        }
    }
}

// ---------------------------------------------------------------------------
// EventEnvelope
// ---------------------------------------------------------------------------

/// One event as submitted to the consensus log.
///
/// The `message_id` is the dedup token: resubmitting the same id within the
/// recent-history window returns the buffered outcome instead of publishing
/// a second log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub message_id: MessageId,
    pub kind: EventKind,
    pub payload: EventPayload,
    pub recorded_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Build an envelope; the kind is derived from the payload so the two
    /// can never disagree.
    #[must_use]
    pub fn new(message_id: MessageId, payload: EventPayload) -> Self {
        Self {
            message_id,
            kind: payload.kind(),
            payload,
            recorded_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// AnchorReceipt / PublishOutcome
// ---------------------------------------------------------------------------

/// Acknowledgement returned by the consensus log for one submitted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    /// Log transaction id.
    pub tx_id: String,
    /// Total-order position assigned by the log.
    pub sequence_number: u64,
    /// Consensus timestamp assigned by the log.
    pub consensus_time: DateTime<Utc>,
}

/// Result of publishing through the dedup buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub receipt: AnchorReceipt,
    /// `true` when the buffer already held this `message_id` and no network
    /// call was made.
    pub duplicate: bool,
}
