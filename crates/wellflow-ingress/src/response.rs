//! Transport response envelope.
//!
//! Every operation resolves to an [`ApiResponse`]: `{success, data}` on
//! success, `{error, details}` on failure, with the transport status drawn
//! from [`WellflowError::http_status`]. The `replayed` marker distinguishes a
//! fresh execution from an idempotent replay served out of the store.

use serde::Serialize;
use serde_json::Value;

use wellflow_types::WellflowError;

/// The wire body of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success {
        success: bool,
        data: Value,
    },
    Error {
        /// Grep-able error code (e.g. `WF_ERR_301`).
        error: String,
        /// Human-readable detail, safe to expose to callers.
        details: String,
    },
}

/// One resolved operation outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// Transport-level status code.
    pub status: u16,
    /// `true` when the result was served from a recorded earlier execution.
    pub replayed: bool,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Successful outcome carrying the operation's serialized result.
    #[must_use]
    pub fn ok(data: Value, replayed: bool) -> Self {
        Self {
            status: 200,
            replayed,
            body: ResponseBody::Success {
                success: true,
                data,
            },
        }
    }

    /// Failure outcome mapped from the error taxonomy.
    #[must_use]
    pub fn error(err: &WellflowError) -> Self {
        let details = err.to_string();
        // The code is the WF_ERR_ token before the first colon.
        let code = details
            .split(':')
            .next()
            .unwrap_or("WF_ERR_900")
            .to_string();
        Self {
            status: err.http_status(),
            replayed: false,
            body: ResponseBody::Error {
                error: code,
                details,
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.body, ResponseBody::Success { .. })
    }
}
