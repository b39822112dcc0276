//! # wellflow-settlement
//!
//! **Settlement Plane**: whole-operation idempotency, the settlement state
//! machine, and proportional revenue distribution.
//!
//! ## Architecture
//!
//! An inbound transition runs through:
//! 1. [`IdempotencyStore`]: atomic `(scope, key)` claim — at most one
//!    side-effecting execution per idempotency key, replays served from the
//!    recorded result
//! 2. [`SettlementEngine`]: allowed-transition check, external anchoring
//!    (anchor-then-commit), atomic settlement + payout commit
//! 3. Revenue distribution: pro-rata amounts at fixed currency precision
//!    with exact-sum reconciliation
//!
//! Partial distribution failure is reported via counts in the
//! [`ExecutionReport`], never thrown: successful transfers must not be
//! silently dropped.

pub mod distribution;
pub mod engine;
pub mod idempotency;

pub use distribution::{DistributionLine, compute_distribution};
pub use engine::{ExecutionReport, SettlementEngine};
pub use idempotency::{IdempotencyRecord, IdempotencyStatus, IdempotencyStore};
