//! Settlement lifecycle model.
//!
//! A settlement covers one revenue-collection period for a well and moves
//! through: **REQUESTED → APPROVED → EXECUTED**, with REQUESTED → REJECTED
//! and {REQUESTED, APPROVED} → CANCELLED as terminal negative exits.
//!
//! Transitions are checked against an explicit allowed-transition table
//! before any mutation. Settlements are never deleted; the audit trail lives
//! in the anchored events referenced by [`Settlement::anchors`].

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WellflowError};
use crate::ids::{AccountId, SettlementId, WellId};

// ---------------------------------------------------------------------------
// SettlementStatus
// ---------------------------------------------------------------------------

/// The lifecycle states of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementStatus {
    /// Created by an operator; awaiting approval.
    Requested,
    /// Approved; eligible for execution.
    Approved,
    /// Rejected from REQUESTED. Terminal.
    Rejected,
    /// Cancelled from REQUESTED or APPROVED. Terminal.
    Cancelled,
    /// Revenue distributed and payouts recorded. Terminal.
    Executed,
}

impl SettlementStatus {
    /// Whether this state admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Executed)
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "REQUESTED"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Executed => write!(f, "EXECUTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// SettlementAction — the allowed-transition table
// ---------------------------------------------------------------------------

/// A requested transition on a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementAction {
    Approve,
    Reject,
    Cancel,
    Execute,
}

impl SettlementAction {
    /// The states from which this action is permitted.
    #[must_use]
    pub fn allowed_from(self) -> &'static [SettlementStatus] {
        match self {
            Self::Approve | Self::Reject => &[SettlementStatus::Requested],
            Self::Cancel => &[SettlementStatus::Requested, SettlementStatus::Approved],
            Self::Execute => &[SettlementStatus::Approved],
        }
    }

    /// The state this action lands in.
    #[must_use]
    pub fn target(self) -> SettlementStatus {
        match self {
            Self::Approve => SettlementStatus::Approved,
            Self::Reject => SettlementStatus::Rejected,
            Self::Cancel => SettlementStatus::Cancelled,
            Self::Execute => SettlementStatus::Executed,
        }
    }

    /// Check the transition table.
    ///
    /// # Errors
    /// Returns [`WellflowError::InvalidTransition`] if `from` does not permit
    /// this action.
    pub fn check(self, from: SettlementStatus) -> Result<()> {
        if self.allowed_from().contains(&from) {
            Ok(())
        } else {
            Err(WellflowError::InvalidTransition {
                action: self,
                status: from,
            })
        }
    }
}

impl fmt::Display for SettlementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "APPROVE"),
            Self::Reject => write!(f, "REJECT"),
            Self::Cancel => write!(f, "CANCEL"),
            Self::Execute => write!(f, "EXECUTE"),
        }
    }
}

// ---------------------------------------------------------------------------
// SettlementPeriod
// ---------------------------------------------------------------------------

/// The revenue-collection period a settlement covers (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SettlementPeriod {
    /// Construct a validated period.
    ///
    /// # Errors
    /// Returns [`WellflowError::InvalidPeriod`] if `end` precedes `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(WellflowError::InvalidPeriod {
                reason: format!("period end {end} precedes start {start}"),
            });
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for SettlementPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

// ---------------------------------------------------------------------------
// RevenueShare
// ---------------------------------------------------------------------------

/// One holder's computed share of a settlement's gross revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueShare {
    pub account: AccountId,
    /// Fraction of total supply held, in `[0, 1]`.
    pub percentage: Decimal,
}

// ---------------------------------------------------------------------------
// AnchorRef
// ---------------------------------------------------------------------------

/// Reference to an event anchored on the consensus log for this settlement.
///
/// Transitions anchor **before** committing; the tx id stored here makes a
/// crash between anchor and commit detectable and replayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRef {
    /// Event kind label (e.g. `"settlement_approved"`).
    pub kind: String,
    /// Consensus-log transaction id.
    pub tx_id: String,
    /// Position assigned by the log.
    pub sequence_number: u64,
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// One revenue-collection settlement for a well.
///
/// Owned exclusively by the settlement engine; created on request, mutated
/// only through the transition table, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub well_id: WellId,
    pub status: SettlementStatus,
    pub period: SettlementPeriod,
    /// Total revenue collected for the period.
    pub gross_revenue: Decimal,
    /// Total water volume delivered in the period (informational).
    pub volume_total: Decimal,
    /// Computed at execution time; empty until then.
    pub revenue_shares: Vec<RevenueShare>,
    /// Set on approve; cleared by reject/cancel.
    pub approved_at: Option<DateTime<Utc>>,
    /// Set on execute; cleared by cancel.
    pub executed_at: Option<DateTime<Utc>>,
    /// Present only in the REJECTED state.
    pub rejection_reason: Option<String>,
    /// Present only in the CANCELLED state.
    pub cancellation_reason: Option<String>,
    /// Append-only history of anchored events, oldest first.
    pub anchors: Vec<AnchorRef>,
    pub requested_at: DateTime<Utc>,
}

impl Settlement {
    /// Create a fresh settlement in the REQUESTED state.
    #[must_use]
    pub fn new(
        well_id: WellId,
        period: SettlementPeriod,
        volume_total: Decimal,
        gross_revenue: Decimal,
    ) -> Self {
        Self {
            id: SettlementId::new(),
            well_id,
            status: SettlementStatus::Requested,
            period,
            gross_revenue,
            volume_total,
            revenue_shares: Vec::new(),
            approved_at: None,
            executed_at: None,
            rejection_reason: None,
            cancellation_reason: None,
            anchors: Vec::new(),
            requested_at: Utc::now(),
        }
    }
}
