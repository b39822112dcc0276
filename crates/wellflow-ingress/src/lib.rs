//! # wellflow-ingress
//!
//! **Ingress Plane**: the request coordinator that fronts every mutating
//! operation.
//!
//! ## Architecture
//!
//! The coordinator is transport-agnostic glue. For each inbound request it:
//! 1. Extracts and validates the idempotency key — a missing key is fatal,
//!    no mutating operation runs without one
//! 2. Resolves the idempotency scope from the operation name
//! 3. Computes the request hash over the operation and its canonical body
//! 4. Delegates to the idempotency store with a closure that validates the
//!    body and calls into the settlement engine or the event ledger client
//! 5. Maps the outcome to an [`ApiResponse`] envelope with the status drawn
//!    from the error taxonomy and a `replayed` marker for idempotent replays

pub mod coordinator;
pub mod response;

pub use coordinator::{Operation, OperationRequest, RequestCoordinator};
pub use response::{ApiResponse, ResponseBody};
