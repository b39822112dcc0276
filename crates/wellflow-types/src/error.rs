//! Error types for the WellFlow settlement core.
//!
//! All errors use the `WF_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Idempotency errors
//! - 3xx: Settlement state errors
//! - 4xx: Distribution errors
//! - 5xx: External collaborator errors
//! - 9xx: General / internal errors
//!
//! Partial distribution failure is deliberately **not** an error variant:
//! some transfers succeeded and must not be silently dropped, so it is
//! reported as data in the execution report.

use thiserror::Error;

use crate::ids::SettlementId;
use crate::settlement::{SettlementAction, SettlementStatus};

/// Central error enum for all WellFlow operations.
#[derive(Debug, Error)]
pub enum WellflowError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Malformed or semantically invalid input, resolved locally.
    #[error("WF_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// A mutating operation arrived without an idempotency token.
    #[error("WF_ERR_101: Missing idempotency key: mutating operations require one")]
    MissingIdempotencyKey,

    /// The idempotency token is present but not well-formed.
    #[error("WF_ERR_102: Malformed idempotency key: {reason}")]
    MalformedIdempotencyKey { reason: String },

    /// The request named an operation the coordinator does not dispatch.
    #[error("WF_ERR_103: Unknown operation: {0}")]
    UnknownOperation(String),

    // =================================================================
    // Idempotency Errors (2xx)
    // =================================================================
    /// The same key was reused for a semantically different request.
    /// Never auto-resolved.
    #[error("WF_ERR_200: Idempotency key conflict in scope '{scope}': key '{key}' \
             was recorded with a different request hash")]
    IdempotencyKeyConflict { scope: String, key: String },

    /// Another execution is in flight for the same key. Retryable after a
    /// short delay.
    #[error("WF_ERR_201: Operation in progress for scope '{scope}' key '{key}'")]
    OperationInProgress { scope: String, key: String },

    // =================================================================
    // Settlement State Errors (3xx)
    // =================================================================
    /// The requested settlement does not exist.
    #[error("WF_ERR_300: Settlement not found: {0}")]
    SettlementNotFound(SettlementId),

    /// The transition is not permitted from the current state.
    #[error("WF_ERR_301: Invalid transition: {action} not permitted from {status}")]
    InvalidTransition {
        action: SettlementAction,
        status: SettlementStatus,
    },

    /// The settlement period bounds are inconsistent.
    #[error("WF_ERR_302: Invalid settlement period: {reason}")]
    InvalidPeriod { reason: String },

    // =================================================================
    // Distribution Errors (4xx)
    // =================================================================
    /// Distribution attempted with no outstanding revenue shares.
    #[error("WF_ERR_400: Zero supply: distribution requires outstanding share tokens")]
    ZeroSupply,

    // =================================================================
    // External Collaborator Errors (5xx)
    // =================================================================
    /// The consensus log rejected or never acknowledged a submission.
    /// Not cached; safe to retry with the same message id.
    #[error("WF_ERR_500: Event submission failed: {reason}")]
    EventSubmissionFailed { reason: String },

    /// The token ledger rejected or never acknowledged a transfer.
    #[error("WF_ERR_501: Ledger transfer failed: {reason}")]
    TransferFailed { reason: String },

    /// The file/content store rejected a put.
    #[error("WF_ERR_502: File store operation failed: {reason}")]
    FileStoreFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error. Logged with full context; the message
    /// shown to callers carries no internals.
    #[error("WF_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("WF_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

impl WellflowError {
    /// The transport-level status the coordinator reports for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::MissingIdempotencyKey
            | Self::MalformedIdempotencyKey { .. }
            | Self::UnknownOperation(_)
            | Self::InvalidTransition { .. }
            | Self::InvalidPeriod { .. }
            | Self::ZeroSupply => 400,
            Self::SettlementNotFound(_) => 404,
            Self::IdempotencyKeyConflict { .. } | Self::OperationInProgress { .. } => 409,
            Self::EventSubmissionFailed { .. }
            | Self::TransferFailed { .. }
            | Self::FileStoreFailed { .. } => 502,
            Self::Internal(_) | Self::Serialization(_) => 500,
        }
    }

    /// Whether the caller may safely retry with the same idempotency key.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OperationInProgress { .. }
                | Self::EventSubmissionFailed { .. }
                | Self::TransferFailed { .. }
                | Self::FileStoreFailed { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, WellflowError>;

// Conversion from std::io::Error
impl From<std::io::Error> for WellflowError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
