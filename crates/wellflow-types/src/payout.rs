//! Payout model: one recipient's share of a settlement's distributed revenue.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, PayoutId, SettlementId};

/// The lifecycle states of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Created; transfer not yet attempted.
    Pending,
    /// Approved alongside the parent settlement.
    Approved,
    /// Bulk-cancelled with the parent settlement. Terminal.
    Cancelled,
    /// Transfer acknowledged by the token ledger. Terminal.
    Completed,
    /// Transfer rejected or unreachable. Terminal; retried via a new settlement run.
    Failed,
}

impl PayoutStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// One recipient's payout row, owned by its parent settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: PayoutId,
    pub settlement_id: SettlementId,
    pub recipient: AccountId,
    pub amount: Decimal,
    pub status: PayoutStatus,
    /// Transfer failure detail, present only when `status` is FAILED.
    pub error: Option<String>,
    /// Token-ledger transaction id, present once the transfer is acknowledged.
    pub transfer_tx: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payout {
    /// Create a pending payout for a recipient.
    #[must_use]
    pub fn pending(settlement_id: SettlementId, recipient: AccountId, amount: Decimal) -> Self {
        Self {
            id: PayoutId::new(),
            settlement_id,
            recipient,
            amount,
            status: PayoutStatus::Pending,
            error: None,
            transfer_tx: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the transfer as acknowledged.
    pub fn complete(&mut self, transfer_tx: impl Into<String>) {
        self.status = PayoutStatus::Completed;
        self.transfer_tx = Some(transfer_tx.into());
        self.error = None;
    }

    /// Mark the transfer as failed with detail.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = PayoutStatus::Failed;
        self.error = Some(error.into());
    }
}
