//! # wellflow-anchor
//!
//! **Anchoring Plane**: external-collaborator capability traits, the event
//! dedup buffer, and Merkle evidence bundling.
//!
//! ## Architecture
//!
//! The anchoring plane sits between the settlement engine and the external
//! networks:
//! 1. **Capability traits** ([`ConsensusLog`], [`TokenLedger`], [`FileStore`]):
//!    one injected interface per collaborator, selected once at construction —
//!    never branched per call. In-memory implementations back tests and local
//!    runs.
//! 2. **`EventLedgerClient`**: bounded recent-history dedup buffer in front of
//!    the consensus log; duplicate `message_id`s return the buffered receipt
//!    without a network call.
//! 3. **`MerkleAnchorBuilder`**: folds ordered document hashes into a single
//!    verifiable root and anchors the bundle.
//!
//! The dedup buffer is a performance layer, not a substitute for the
//! idempotency store: whole-operation idempotency (including downstream side
//! effects) is governed one level up.

pub mod ledger_client;
pub mod merkle;
pub mod remote;

pub use ledger_client::EventLedgerClient;
pub use merkle::MerkleAnchorBuilder;
pub use remote::{
    ConsensusLog, FileStore, Holding, InMemoryFileStore, InMemoryLog, InMemoryTokenLedger,
    ShareRegister, TokenLedger, TransferReceipt,
};
