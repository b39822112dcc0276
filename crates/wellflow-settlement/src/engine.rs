//! Settlement state machine and execution.
//!
//! Each transition:
//! 1. Checks the allowed-transition table against the current state
//! 2. Performs any external work (share register read, transfers)
//! 3. Anchors the transition event on the consensus log
//! 4. Commits the settlement + payout mutation as one atomic unit under the
//!    store lock, re-checking the state and recording the anchor tx id
//!
//! Anchor-then-commit: the event's tx id is stored in the committed row, so
//! a crash between anchoring and committing is detectable and replayable.
//! No lock is held across external calls; an execution instead claims an
//! in-flight marker under the lock before its transfers, and no other
//! transition may pass the marker. Whole-operation idempotency is the
//! coordinator's responsibility via the idempotency store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wellflow_anchor::{EventLedgerClient, FileStore, MerkleAnchorBuilder, TokenLedger};
use wellflow_types::{
    AccountId, AnchorRef, DocumentBundle, DocumentRef, EventEnvelope, EventPayload, MessageId,
    Payout, PayoutStatus, RevenueShare, Result, Settlement, SettlementAction, SettlementId,
    SettlementPeriod, SettlementStatus, TransferRef, WellId, WellflowError,
};

use crate::distribution::compute_distribution;

/// Outcome of executing a settlement: the committed rows plus partial-success
/// counts. Partial distribution failure is reported here, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub settlement: Settlement,
    pub payouts: Vec<Payout>,
    pub success_count: usize,
    pub failure_count: usize,
}

/// In-process backing store for settlements and their payouts.
///
/// One mutex guards both maps so a settlement and its payout rows always
/// change as a single atomic unit. `executing` marks settlements with a
/// distribution in flight: transfers run outside the lock, and no other
/// transition may commit between a claimed execution's transfers and its
/// commit, or acknowledged transfers would be left without payout rows.
#[derive(Default)]
struct SettlementStore {
    settlements: HashMap<SettlementId, Settlement>,
    payouts: HashMap<SettlementId, Vec<Payout>>,
    executing: HashSet<SettlementId>,
}

/// Clears the execution marker when the claimed execution ends, on every
/// exit path.
struct ExecutionGuard<'a> {
    store: &'a Mutex<SettlementStore>,
    id: SettlementId,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut store) = self.store.lock() {
            store.executing.remove(&self.id);
        }
    }
}

/// The settlement engine: owns settlement/payout state and drives every
/// transition through the allowed-transition table.
pub struct SettlementEngine {
    store: Mutex<SettlementStore>,
    events: Arc<EventLedgerClient>,
    ledger: Arc<dyn TokenLedger>,
    bundles: MerkleAnchorBuilder,
    /// Currency asset payouts are denominated in.
    asset: String,
    /// Operator account transfers are drawn from.
    operator: AccountId,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(
        events: Arc<EventLedgerClient>,
        ledger: Arc<dyn TokenLedger>,
        files: Arc<dyn FileStore>,
        asset: impl Into<String>,
        operator: AccountId,
    ) -> Self {
        let bundles = MerkleAnchorBuilder::new(files, Arc::clone(&events));
        Self {
            store: Mutex::new(SettlementStore::default()),
            events,
            ledger,
            bundles,
            asset: asset.into(),
            operator,
        }
    }

    // =====================================================================
    // Transitions
    // =====================================================================

    /// Create a settlement in REQUESTED and anchor `settlement_requested`.
    pub fn request_settlement(
        &self,
        well_id: WellId,
        period: SettlementPeriod,
        volume_total: Decimal,
        gross_revenue: Decimal,
    ) -> Result<Settlement> {
        if gross_revenue < Decimal::ZERO {
            return Err(WellflowError::Validation {
                reason: format!("gross revenue {gross_revenue} is negative"),
            });
        }
        if volume_total < Decimal::ZERO {
            return Err(WellflowError::Validation {
                reason: format!("volume total {volume_total} is negative"),
            });
        }

        let mut settlement = Settlement::new(well_id, period, volume_total, gross_revenue);
        let outcome = self.anchor(
            settlement.id,
            EventPayload::SettlementRequested {
                settlement_id: settlement.id,
                well_id,
                period,
                gross_revenue,
                volume_total,
            },
        )?;
        settlement.anchors.push(outcome);

        tracing::info!(
            settlement_id = %settlement.id,
            well_id = %well_id,
            %gross_revenue,
            "settlement requested"
        );

        let mut store = self.store.lock().expect("settlement store mutex poisoned");
        store.settlements.insert(settlement.id, settlement.clone());
        Ok(settlement)
    }

    /// REQUESTED → APPROVED; anchors `settlement_approved`.
    pub fn approve(&self, id: SettlementId) -> Result<Settlement> {
        let (_, well_id) = self.check_allowed(id, SettlementAction::Approve)?;

        let anchor = self.anchor(
            id,
            EventPayload::SettlementApproved {
                settlement_id: id,
                well_id,
            },
        )?;

        self.commit(id, SettlementAction::Approve, anchor, |settlement, _| {
            settlement.status = SettlementStatus::Approved;
            settlement.approved_at = Some(Utc::now());
        })
    }

    /// REQUESTED → REJECTED; clears the approval marker and anchors
    /// `settlement_rejection` with the reason and prior status.
    pub fn reject(&self, id: SettlementId, reason: impl Into<String>) -> Result<Settlement> {
        let reason = reason.into();
        let (prior_status, _) = self.check_allowed(id, SettlementAction::Reject)?;

        let anchor = self.anchor(
            id,
            EventPayload::SettlementRejection {
                settlement_id: id,
                reason: reason.clone(),
                prior_status,
            },
        )?;

        self.commit(id, SettlementAction::Reject, anchor, |settlement, _| {
            settlement.status = SettlementStatus::Rejected;
            settlement.approved_at = None;
            settlement.rejection_reason = Some(reason);
        })
    }

    /// {REQUESTED, APPROVED} → CANCELLED; clears approval/execution markers,
    /// bulk-cancels all non-terminal payouts as one batch, and anchors
    /// `settlement_cancellation`.
    pub fn cancel(&self, id: SettlementId, reason: impl Into<String>) -> Result<Settlement> {
        let reason = reason.into();
        let (prior_status, _) = self.check_allowed(id, SettlementAction::Cancel)?;
        let cancellable = self.count_non_terminal_payouts(id);

        let anchor = self.anchor(
            id,
            EventPayload::SettlementCancellation {
                settlement_id: id,
                reason: reason.clone(),
                prior_status,
                cancelled_payouts: cancellable,
            },
        )?;

        self.commit(id, SettlementAction::Cancel, anchor, |settlement, payouts| {
            settlement.status = SettlementStatus::Cancelled;
            settlement.approved_at = None;
            settlement.executed_at = None;
            settlement.cancellation_reason = Some(reason);
            for payout in payouts.iter_mut().filter(|p| !p.status.is_terminal()) {
                payout.status = PayoutStatus::Cancelled;
            }
        })
    }

    /// APPROVED → EXECUTED: computes the distribution, attempts transfers,
    /// records payout rows, and anchors `settlement_processed` with every
    /// transfer reference.
    ///
    /// Transfer failures do not abort the remaining holders; they are
    /// recorded as FAILED payouts and reported via the counts.
    pub fn execute(&self, id: SettlementId) -> Result<ExecutionReport> {
        // Claim the execution under the lock: the marker keeps cancel (and a
        // second execute) from committing while transfers run outside it.
        let (gross, well_id) = {
            let mut store = self.store.lock().expect("settlement store mutex poisoned");
            let settlement = store
                .settlements
                .get(&id)
                .ok_or(WellflowError::SettlementNotFound(id))?;
            SettlementAction::Execute.check(settlement.status)?;
            let snapshot = (settlement.gross_revenue, settlement.well_id);
            if !store.executing.insert(id) {
                return Err(WellflowError::OperationInProgress {
                    scope: "settlements.execute".to_string(),
                    key: id.to_string(),
                });
            }
            snapshot
        };
        let _guard = ExecutionGuard {
            store: &self.store,
            id,
        };

        let register = self.ledger.share_register(well_id)?;
        let lines = compute_distribution(gross, &register)?;

        let mut payouts = Vec::with_capacity(lines.len());
        let mut transfers = Vec::with_capacity(lines.len());
        let mut shares = Vec::with_capacity(lines.len());
        let mut success_count = 0usize;
        let mut failure_count = 0usize;

        for line in &lines {
            shares.push(RevenueShare {
                account: line.account,
                percentage: line.percentage,
            });
            let mut payout = Payout::pending(id, line.account, line.amount);
            match self
                .ledger
                .transfer(&self.asset, &self.operator, &line.account, line.amount)
            {
                Ok(receipt) => {
                    payout.complete(receipt.tx_id.clone());
                    transfers.push(TransferRef {
                        recipient: line.account,
                        amount: line.amount,
                        tx_id: Some(receipt.tx_id),
                    });
                    success_count += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        settlement_id = %id,
                        recipient = %line.account,
                        amount = %line.amount,
                        error = %err,
                        "payout transfer failed"
                    );
                    payout.fail(err.to_string());
                    transfers.push(TransferRef {
                        recipient: line.account,
                        amount: line.amount,
                        tx_id: None,
                    });
                    failure_count += 1;
                }
            }
            payouts.push(payout);
        }

        let anchor = self.anchor(
            id,
            EventPayload::SettlementProcessed {
                settlement_id: id,
                well_id,
                transfers,
                success_count,
                failure_count,
            },
        )?;

        let settlement = self.commit(
            id,
            SettlementAction::Execute,
            anchor,
            |settlement, stored_payouts| {
                settlement.status = SettlementStatus::Executed;
                settlement.executed_at = Some(Utc::now());
                settlement.revenue_shares = shares;
                *stored_payouts = payouts.clone();
            },
        )?;

        tracing::info!(
            settlement_id = %id,
            success_count,
            failure_count,
            "settlement executed"
        );

        Ok(ExecutionReport {
            settlement,
            payouts,
            success_count,
            failure_count,
        })
    }

    /// Assemble and anchor an evidence bundle for a well.
    pub fn anchor_bundle(
        &self,
        well_id: WellId,
        documents: Vec<DocumentRef>,
    ) -> Result<DocumentBundle> {
        let mut bundle = self.bundles.bundle(well_id, documents)?;
        self.bundles.anchor(&mut bundle)?;
        Ok(bundle)
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    /// Fetch a settlement by id.
    pub fn settlement(&self, id: SettlementId) -> Result<Settlement> {
        self.store
            .lock()
            .expect("settlement store mutex poisoned")
            .settlements
            .get(&id)
            .cloned()
            .ok_or(WellflowError::SettlementNotFound(id))
    }

    /// Payout rows for a settlement (empty until execution).
    #[must_use]
    pub fn payouts(&self, id: SettlementId) -> Vec<Payout> {
        self.store
            .lock()
            .expect("settlement store mutex poisoned")
            .payouts
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Snapshot the current status and check the transition table against it.
    /// A settlement with an execution in flight admits no other transition.
    fn check_allowed(
        &self,
        id: SettlementId,
        action: SettlementAction,
    ) -> Result<(SettlementStatus, WellId)> {
        let store = self.store.lock().expect("settlement store mutex poisoned");
        if store.executing.contains(&id) {
            return Err(WellflowError::OperationInProgress {
                scope: "settlements.execute".to_string(),
                key: id.to_string(),
            });
        }
        let settlement = store
            .settlements
            .get(&id)
            .ok_or(WellflowError::SettlementNotFound(id))?;
        action.check(settlement.status)?;
        Ok((settlement.status, settlement.well_id))
    }

    fn count_non_terminal_payouts(&self, id: SettlementId) -> usize {
        self.store
            .lock()
            .expect("settlement store mutex poisoned")
            .payouts
            .get(&id)
            .map_or(0, |ps| ps.iter().filter(|p| !p.status.is_terminal()).count())
    }

    /// Publish the transition event. The message id is deterministic over
    /// `(settlement_id, kind)`, so an engine-level retry deduplicates at the
    /// ledger client.
    fn anchor(&self, id: SettlementId, payload: EventPayload) -> Result<AnchorRef> {
        let kind = payload.kind();
        let envelope =
            EventEnvelope::new(MessageId::for_transition(id, kind.as_str()), payload);
        let outcome = self.events.publish(&envelope)?;
        Ok(AnchorRef {
            kind: kind.as_str().to_string(),
            tx_id: outcome.receipt.tx_id,
            sequence_number: outcome.receipt.sequence_number,
        })
    }

    /// Commit a transition atomically: re-check the table under the lock
    /// (the state may have moved since the pre-check while external calls
    /// ran), apply the mutation to the settlement and its payouts, and
    /// record the anchor.
    fn commit(
        &self,
        id: SettlementId,
        action: SettlementAction,
        anchor: AnchorRef,
        apply: impl FnOnce(&mut Settlement, &mut Vec<Payout>),
    ) -> Result<Settlement> {
        let mut store = self.store.lock().expect("settlement store mutex poisoned");
        let store = &mut *store;
        // An execute that claimed the marker after this action's pre-check
        // must not be interleaved with; its own commit carries the marker.
        if action != SettlementAction::Execute && store.executing.contains(&id) {
            return Err(WellflowError::OperationInProgress {
                scope: "settlements.execute".to_string(),
                key: id.to_string(),
            });
        }
        let settlement = store
            .settlements
            .get_mut(&id)
            .ok_or(WellflowError::SettlementNotFound(id))?;
        action.check(settlement.status)?;

        let payouts = store.payouts.entry(id).or_default();
        apply(settlement, payouts);
        settlement.anchors.push(anchor);

        tracing::info!(
            settlement_id = %id,
            action = %action,
            status = %settlement.status,
            "settlement transition committed"
        );
        Ok(settlement.clone())
    }
}
