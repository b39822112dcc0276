//! # wellflow-types
//!
//! Shared types, errors, and configuration for the **WellFlow** settlement core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`WellId`], [`SettlementId`], [`PayoutId`], [`AccountId`],
//!   [`DocumentId`], [`MessageId`], [`IdempotencyKey`]
//! - **Digests**: [`ContentHash`], [`RequestHash`]
//! - **Settlement model**: [`Settlement`], [`SettlementStatus`], [`SettlementPeriod`],
//!   [`RevenueShare`], [`SettlementAction`]
//! - **Payout model**: [`Payout`], [`PayoutStatus`]
//! - **Event model**: [`EventEnvelope`], [`EventKind`], [`EventPayload`],
//!   [`AnchorReceipt`], [`PublishOutcome`]
//! - **Evidence model**: [`DocumentRef`], [`DocumentBundle`]
//! - **Configuration**: [`CoreConfig`]
//! - **Errors**: [`WellflowError`] with `WF_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod bundle;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod hash;
pub mod ids;
pub mod payout;
pub mod settlement;

// Re-export all primary types at crate root for ergonomic imports:
//   use wellflow_types::{Settlement, SettlementStatus, Payout, EventEnvelope, ...};

pub use bundle::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use hash::*;
pub use ids::*;
pub use payout::*;
pub use settlement::*;

// Constants are accessed via `wellflow_types::constants::FOO`
// (not re-exported to avoid name collisions).
