//! The request coordinator.
//!
//! Wraps every inbound mutating operation with idempotency enforcement:
//! key extraction and validation, scope resolution from the operation name,
//! request hashing over the canonical body, and dispatch through the
//! idempotency store into the settlement engine or the event ledger client.
//!
//! A missing idempotency key is fatal: the coordinator refuses to run any
//! mutating operation without one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use wellflow_anchor::EventLedgerClient;
use wellflow_settlement::{IdempotencyStore, SettlementEngine};
use wellflow_types::{
    DocumentRef, EventEnvelope, EventPayload, IdempotencyKey, MessageId, RequestHash, Result,
    SettlementId, SettlementPeriod, WellId, WellflowError,
};

use crate::response::ApiResponse;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The closed set of operations the coordinator dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateSettlement,
    ApproveSettlement,
    RejectSettlement,
    CancelSettlement,
    ExecuteSettlement,
    RecordEvent,
    AnchorBundle,
}

impl Operation {
    /// Resolve an operation from its wire name.
    ///
    /// # Errors
    /// Returns [`WellflowError::UnknownOperation`] for any other name.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "settlements.create" => Ok(Self::CreateSettlement),
            "settlements.approve" => Ok(Self::ApproveSettlement),
            "settlements.reject" => Ok(Self::RejectSettlement),
            "settlements.cancel" => Ok(Self::CancelSettlement),
            "settlements.execute" => Ok(Self::ExecuteSettlement),
            "events.record" => Ok(Self::RecordEvent),
            "bundles.anchor" => Ok(Self::AnchorBundle),
            other => Err(WellflowError::UnknownOperation(other.to_string())),
        }
    }

    /// The idempotency scope, which doubles as the wire name.
    #[must_use]
    pub fn scope(self) -> &'static str {
        match self {
            Self::CreateSettlement => "settlements.create",
            Self::ApproveSettlement => "settlements.approve",
            Self::RejectSettlement => "settlements.reject",
            Self::CancelSettlement => "settlements.cancel",
            Self::ExecuteSettlement => "settlements.execute",
            Self::RecordEvent => "events.record",
            Self::AnchorBundle => "bundles.anchor",
        }
    }
}

/// One inbound request: operation name, optional idempotency token, and the
/// JSON body as received.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationRequest {
    pub operation: String,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub body: Value,
}

// ---------------------------------------------------------------------------
// Request body shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateSettlementBody {
    well_id: WellId,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    volume_total: Decimal,
    gross_revenue: Decimal,
}

#[derive(Debug, Deserialize)]
struct SettlementTargetBody {
    settlement_id: SettlementId,
}

#[derive(Debug, Deserialize)]
struct SettlementReasonBody {
    settlement_id: SettlementId,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct RecordEventBody {
    message_id: String,
    payload: EventPayload,
}

#[derive(Debug, Deserialize)]
struct AnchorBundleBody {
    well_id: WellId,
    documents: Vec<DocumentRef>,
}

// ---------------------------------------------------------------------------
// RequestCoordinator
// ---------------------------------------------------------------------------

/// Applies idempotency to inbound operations and maps domain errors to
/// transport-level outcomes.
pub struct RequestCoordinator {
    engine: Arc<SettlementEngine>,
    events: Arc<EventLedgerClient>,
    idempotency: IdempotencyStore,
}

impl RequestCoordinator {
    #[must_use]
    pub fn new(engine: Arc<SettlementEngine>, events: Arc<EventLedgerClient>) -> Self {
        Self {
            engine,
            events,
            idempotency: IdempotencyStore::new(),
        }
    }

    /// Resolve one request to a response. Infallible at the signature: every
    /// domain error is mapped into the response envelope.
    pub fn handle(&self, request: &OperationRequest) -> ApiResponse {
        match self.process(request) {
            Ok((reused, data)) => ApiResponse::ok(data, reused),
            Err(err) => {
                tracing::warn!(
                    operation = %request.operation,
                    error = %err,
                    retryable = err.is_retryable(),
                    "operation failed"
                );
                ApiResponse::error(&err)
            }
        }
    }

    /// The idempotency store fronting this coordinator.
    #[must_use]
    pub fn idempotency(&self) -> &IdempotencyStore {
        &self.idempotency
    }

    /// Purge idempotency records older than the default retention window.
    /// Returns the number of records removed. Intended for a periodic
    /// maintenance task.
    pub fn purge_expired(&self) -> usize {
        let purged = self
            .idempotency
            .purge_older_than(chrono::TimeDelta::seconds(
                wellflow_types::constants::IDEMPOTENCY_RETENTION_SECS,
            ));
        if purged > 0 {
            tracing::info!(purged, "purged expired idempotency records");
        }
        purged
    }

    fn process(&self, request: &OperationRequest) -> Result<(bool, Value)> {
        let token = request
            .idempotency_key
            .as_deref()
            .ok_or(WellflowError::MissingIdempotencyKey)?;
        let key = IdempotencyKey::parse(token)?;
        let operation = Operation::parse(&request.operation)?;
        let request_hash = RequestHash::of(operation.scope(), &request.body)?;

        tracing::debug!(
            operation = operation.scope(),
            key = key.as_str(),
            "dispatching operation"
        );

        self.idempotency
            .execute(operation.scope(), &key, request_hash, || {
                self.dispatch(operation, &request.body)
            })
    }

    /// Validate the body shape for the operation and call into the core.
    fn dispatch(&self, operation: Operation, body: &Value) -> Result<Value> {
        match operation {
            Operation::CreateSettlement => {
                let b: CreateSettlementBody = parse_body(body)?;
                let period = SettlementPeriod::new(b.period_start, b.period_end)?;
                let settlement = self.engine.request_settlement(
                    b.well_id,
                    period,
                    b.volume_total,
                    b.gross_revenue,
                )?;
                to_value(&settlement)
            }
            Operation::ApproveSettlement => {
                let b: SettlementTargetBody = parse_body(body)?;
                to_value(&self.engine.approve(b.settlement_id)?)
            }
            Operation::RejectSettlement => {
                let b: SettlementReasonBody = parse_body(body)?;
                to_value(&self.engine.reject(b.settlement_id, b.reason)?)
            }
            Operation::CancelSettlement => {
                let b: SettlementReasonBody = parse_body(body)?;
                to_value(&self.engine.cancel(b.settlement_id, b.reason)?)
            }
            Operation::ExecuteSettlement => {
                let b: SettlementTargetBody = parse_body(body)?;
                to_value(&self.engine.execute(b.settlement_id)?)
            }
            Operation::RecordEvent => {
                let b: RecordEventBody = parse_body(body)?;
                let envelope = EventEnvelope::new(MessageId::from_str(b.message_id), b.payload);
                to_value(&self.events.publish(&envelope)?)
            }
            Operation::AnchorBundle => {
                let b: AnchorBundleBody = parse_body(body)?;
                to_value(&self.engine.anchor_bundle(b.well_id, b.documents)?)
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &Value) -> Result<T> {
    serde_json::from_value(body.clone()).map_err(|e| WellflowError::Validation {
        reason: format!("malformed request body: {e}"),
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| WellflowError::Serialization(e.to_string()))
}
