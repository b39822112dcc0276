//! Capability interfaces for the external collaborators.
//!
//! The core never talks to a network SDK directly: it holds one trait object
//! per collaborator, injected at construction. Production wires the real
//! clients; tests and local runs wire the in-memory implementations below,
//! which record every call so assertions like "exactly one log message" are
//! cheap.
//!
//! Failure semantics the core relies on:
//! - [`ConsensusLog::submit`] may fail transiently; retrying with the same
//!   message id is safe (the dedup buffer absorbs the duplicate).
//! - [`TokenLedger::transfer`] carries at-least-once delivery risk; the
//!   idempotency store, not this call, provides whole-operation idempotency.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use rust_decimal::Decimal;

use wellflow_types::{AccountId, AnchorReceipt, Result, WellId, WellflowError};

// ---------------------------------------------------------------------------
// Trait contracts
// ---------------------------------------------------------------------------

/// The external totally-ordered append-only message service.
pub trait ConsensusLog: Send + Sync {
    /// Submit a message and block until the log acknowledges it.
    ///
    /// # Errors
    /// Returns [`WellflowError::EventSubmissionFailed`] on network failure or
    /// external rejection. Failures are transient: the same message may be
    /// resubmitted.
    fn submit(&self, topic: &str, message: &[u8]) -> Result<AnchorReceipt>;
}

/// One account's revenue-share holding for a well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holding {
    pub account: AccountId,
    pub balance: Decimal,
}

/// The full share register for a well: holdings against a known total supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRegister {
    pub holdings: Vec<Holding>,
    pub total_supply: Decimal,
}

/// Acknowledgement for one token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_id: String,
}

/// The external token ledger: share registers and currency transfers.
pub trait TokenLedger: Send + Sync {
    /// Read the revenue-share register for a well.
    ///
    /// # Errors
    /// Returns [`WellflowError::TransferFailed`] if the ledger is unreachable.
    fn share_register(&self, well_id: WellId) -> Result<ShareRegister>;

    /// Transfer `amount` of `asset` between accounts.
    ///
    /// # Errors
    /// Returns [`WellflowError::TransferFailed`] on rejection or network
    /// failure. At-least-once risk: the caller must guard with idempotency.
    fn transfer(
        &self,
        asset: &str,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt>;
}

/// The external file/content store, used only for bundle metadata.
pub trait FileStore: Send + Sync {
    /// Persist bytes and return the store's file id.
    ///
    /// # Errors
    /// Returns [`WellflowError::FileStoreFailed`] on rejection.
    fn put(&self, bytes: &[u8]) -> Result<String>;
}

// ---------------------------------------------------------------------------
// InMemoryLog
// ---------------------------------------------------------------------------

/// A message as recorded by [`InMemoryLog`].
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub topic: String,
    pub message: Vec<u8>,
    pub sequence_number: u64,
}

/// In-memory consensus log. Assigns sequence numbers in submission order and
/// keeps every accepted message for inspection.
#[derive(Default)]
pub struct InMemoryLog {
    messages: Mutex<Vec<RecordedMessage>>,
    next_sequence: AtomicU64,
    failing: AtomicBool,
}

impl InMemoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle failure injection: while set, every submit fails and records
    /// nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All messages accepted so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.messages.lock().expect("log mutex poisoned").clone()
    }

    /// Number of messages accepted on a topic.
    #[must_use]
    pub fn count_on(&self, topic: &str) -> usize {
        self.messages
            .lock()
            .expect("log mutex poisoned")
            .iter()
            .filter(|m| m.topic == topic)
            .count()
    }
}

impl ConsensusLog for InMemoryLog {
    fn submit(&self, topic: &str, message: &[u8]) -> Result<AnchorReceipt> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WellflowError::EventSubmissionFailed {
                reason: "injected log failure".to_string(),
            });
        }
        let sequence_number = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let receipt = AnchorReceipt {
            tx_id: format!("log-tx-{sequence_number:08}"),
            sequence_number,
            consensus_time: Utc::now(),
        };
        self.messages
            .lock()
            .expect("log mutex poisoned")
            .push(RecordedMessage {
                topic: topic.to_string(),
                message: message.to_vec(),
                sequence_number,
            });
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// InMemoryTokenLedger
// ---------------------------------------------------------------------------

/// A transfer as recorded by [`InMemoryTokenLedger`].
#[derive(Debug, Clone)]
pub struct RecordedTransfer {
    pub asset: String,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub tx_id: String,
}

/// In-memory token ledger with per-well share registers and recorded
/// transfers. Individual recipients can be marked as rejecting, which makes
/// transfers to them fail — the hook behind partial-distribution tests.
#[derive(Default)]
pub struct InMemoryTokenLedger {
    registers: Mutex<HashMap<WellId, ShareRegister>>,
    transfers: Mutex<Vec<RecordedTransfer>>,
    rejecting: Mutex<Vec<AccountId>>,
    next_tx: AtomicU64,
}

impl InMemoryTokenLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the share register for a well.
    pub fn set_register(&self, well_id: WellId, register: ShareRegister) {
        self.registers
            .lock()
            .expect("ledger mutex poisoned")
            .insert(well_id, register);
    }

    /// Make future transfers to `account` fail.
    pub fn reject_transfers_to(&self, account: AccountId) {
        self.rejecting
            .lock()
            .expect("ledger mutex poisoned")
            .push(account);
    }

    /// All transfers acknowledged so far, in order.
    #[must_use]
    pub fn transfers(&self) -> Vec<RecordedTransfer> {
        self.transfers.lock().expect("ledger mutex poisoned").clone()
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn share_register(&self, well_id: WellId) -> Result<ShareRegister> {
        self.registers
            .lock()
            .expect("ledger mutex poisoned")
            .get(&well_id)
            .cloned()
            .ok_or_else(|| WellflowError::TransferFailed {
                reason: format!("no share register for {well_id}"),
            })
    }

    fn transfer(
        &self,
        asset: &str,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        if self
            .rejecting
            .lock()
            .expect("ledger mutex poisoned")
            .contains(to)
        {
            return Err(WellflowError::TransferFailed {
                reason: format!("transfer to {to} rejected"),
            });
        }
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_id = format!("ledger-tx-{n:08}");
        self.transfers
            .lock()
            .expect("ledger mutex poisoned")
            .push(RecordedTransfer {
                asset: asset.to_string(),
                from: *from,
                to: *to,
                amount,
                tx_id: tx_id.clone(),
            });
        Ok(TransferReceipt { tx_id })
    }
}

// ---------------------------------------------------------------------------
// InMemoryFileStore
// ---------------------------------------------------------------------------

/// In-memory content store. File ids are assigned in insertion order.
#[derive(Default)]
pub struct InMemoryFileStore {
    files: Mutex<Vec<Vec<u8>>>,
}

impl InMemoryFileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().expect("file store mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch stored bytes by the id returned from `put`.
    #[must_use]
    pub fn get(&self, file_id: &str) -> Option<Vec<u8>> {
        let index: usize = file_id.strip_prefix("file-")?.parse().ok()?;
        self.files
            .lock()
            .expect("file store mutex poisoned")
            .get(index)
            .cloned()
    }
}

impl FileStore for InMemoryFileStore {
    fn put(&self, bytes: &[u8]) -> Result<String> {
        let mut files = self.files.lock().expect("file store mutex poisoned");
        let id = format!("file-{}", files.len());
        files.push(bytes.to_vec());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_assigns_increasing_sequence_numbers() {
        let log = InMemoryLog::new();
        let r1 = log.submit("t", b"a").unwrap();
        let r2 = log.submit("t", b"b").unwrap();
        assert!(r2.sequence_number > r1.sequence_number);
        assert_eq!(log.count_on("t"), 2);
    }

    #[test]
    fn log_failure_injection_records_nothing() {
        let log = InMemoryLog::new();
        log.set_failing(true);
        let err = log.submit("t", b"a").unwrap_err();
        assert!(matches!(err, WellflowError::EventSubmissionFailed { .. }));
        assert_eq!(log.count_on("t"), 0);

        log.set_failing(false);
        assert!(log.submit("t", b"a").is_ok());
    }

    #[test]
    fn ledger_register_roundtrip() {
        let ledger = InMemoryTokenLedger::new();
        let well = WellId::new();
        let holder = AccountId::new();
        ledger.set_register(
            well,
            ShareRegister {
                holdings: vec![Holding {
                    account: holder,
                    balance: Decimal::new(1000, 0),
                }],
                total_supply: Decimal::new(1000, 0),
            },
        );
        let reg = ledger.share_register(well).unwrap();
        assert_eq!(reg.total_supply, Decimal::new(1000, 0));
        assert_eq!(reg.holdings.len(), 1);
    }

    #[test]
    fn ledger_missing_register_fails() {
        let ledger = InMemoryTokenLedger::new();
        let err = ledger.share_register(WellId::new()).unwrap_err();
        assert!(matches!(err, WellflowError::TransferFailed { .. }));
    }

    #[test]
    fn ledger_rejects_marked_recipient() {
        let ledger = InMemoryTokenLedger::new();
        let op = AccountId::new();
        let good = AccountId::new();
        let bad = AccountId::new();
        ledger.reject_transfers_to(bad);

        assert!(ledger.transfer("USD", &op, &good, Decimal::ONE).is_ok());
        let err = ledger.transfer("USD", &op, &bad, Decimal::ONE).unwrap_err();
        assert!(matches!(err, WellflowError::TransferFailed { .. }));
        assert_eq!(ledger.transfers().len(), 1);
    }

    #[test]
    fn file_store_put_get() {
        let store = InMemoryFileStore::new();
        let id = store.put(b"bundle metadata").unwrap();
        assert_eq!(store.get(&id).as_deref(), Some(b"bundle metadata".as_ref()));
        assert_eq!(store.len(), 1);
    }
}
