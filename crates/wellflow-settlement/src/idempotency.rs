//! Whole-operation idempotency store.
//!
//! Each caller-supplied `(scope, key)` pair maps to **at most one**
//! side-effecting execution, even under retries and concurrency. The
//! check-for-existing-record-else-insert-PENDING step is a single atomic
//! operation under the store mutex; the operation closure itself runs with
//! no lock held, so only the durable PENDING marker spans blocking I/O.
//!
//! Record lifecycle: created PENDING on first sight of a key, transitioned
//! to SUCCEEDED or FAILED exactly once. A SUCCEEDED record is immutable
//! except by explicit purge and serves replays; a FAILED record is
//! retryable (the next call resets it to PENDING and re-attempts).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use wellflow_types::{ContentHash, IdempotencyKey, RequestHash, Result, WellflowError};

/// The lifecycle states of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    /// An execution for this key is in flight.
    Pending,
    /// The operation completed; the stored result serves replays.
    Succeeded,
    /// The operation failed; the next call re-attempts.
    Failed,
}

/// One `(scope, key)` record.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub scope: String,
    pub key: IdempotencyKey,
    pub status: IdempotencyStatus,
    /// Digest of the normalized input the key was first seen with.
    pub request_hash: RequestHash,
    /// Digest of the serialized result, present once SUCCEEDED.
    pub result_hash: Option<ContentHash>,
    /// Serialized result for replay, present once SUCCEEDED.
    pub result_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Durable key→outcome cache with conflict detection.
///
/// Backed here by a mutex-guarded map with insert-or-fail semantics on
/// `(scope, key)` — the same contract a relational unique constraint plus a
/// status column would provide, kept behind this type so the storage tier
/// can be swapped without touching callers.
#[derive(Default)]
pub struct IdempotencyStore {
    records: Mutex<HashMap<(String, String), IdempotencyRecord>>,
}

impl IdempotencyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` at most once for `(scope, key)`.
    ///
    /// Returns `(reused, result)`: `reused` is `true` when the result came
    /// from a recorded earlier execution and `op` was not run.
    ///
    /// # Errors
    /// - [`WellflowError::OperationInProgress`] if another execution holds
    ///   the PENDING marker for this key
    /// - [`WellflowError::IdempotencyKeyConflict`] if the key succeeded
    ///   earlier with a different request hash
    /// - whatever `op` fails with, after the record is marked FAILED
    pub fn execute<T, F>(
        &self,
        scope: &str,
        key: &IdempotencyKey,
        request_hash: RequestHash,
        op: F,
    ) -> Result<(bool, T)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        self.claim(scope, key, request_hash)?.map_or_else(
            || self.run_claimed(scope, key, op),
            |replayed| Ok((true, replayed)),
        )
    }

    /// Atomically claim the key: insert PENDING, or resolve the existing
    /// record. Returns `Some(result)` when a recorded success replays.
    fn claim<T: DeserializeOwned>(
        &self,
        scope: &str,
        key: &IdempotencyKey,
        request_hash: RequestHash,
    ) -> Result<Option<T>> {
        let mut records = self.records.lock().expect("idempotency mutex poisoned");
        let map_key = (scope.to_string(), key.as_str().to_string());

        match records.get_mut(&map_key) {
            None => {
                records.insert(
                    map_key,
                    IdempotencyRecord {
                        scope: scope.to_string(),
                        key: key.clone(),
                        status: IdempotencyStatus::Pending,
                        request_hash,
                        result_hash: None,
                        result_payload: None,
                        created_at: Utc::now(),
                        completed_at: None,
                    },
                );
                Ok(None)
            }
            Some(record) => match record.status {
                IdempotencyStatus::Pending => Err(WellflowError::OperationInProgress {
                    scope: scope.to_string(),
                    key: key.as_str().to_string(),
                }),
                IdempotencyStatus::Succeeded => {
                    if record.request_hash != request_hash {
                        return Err(WellflowError::IdempotencyKeyConflict {
                            scope: scope.to_string(),
                            key: key.as_str().to_string(),
                        });
                    }
                    let payload = record.result_payload.clone().ok_or_else(|| {
                        WellflowError::Internal(
                            "succeeded idempotency record missing payload".to_string(),
                        )
                    })?;
                    let value: T = serde_json::from_value(payload)
                        .map_err(|e| WellflowError::Serialization(e.to_string()))?;
                    tracing::debug!(scope, key = key.as_str(), "idempotent replay");
                    Ok(Some(value))
                }
                IdempotencyStatus::Failed => {
                    // Retryable: reset to PENDING for this attempt.
                    record.status = IdempotencyStatus::Pending;
                    record.request_hash = request_hash;
                    record.result_hash = None;
                    record.result_payload = None;
                    record.completed_at = None;
                    Ok(None)
                }
            },
        }
    }

    /// Run the operation for a freshly claimed key and record the outcome.
    fn run_claimed<T, F>(&self, scope: &str, key: &IdempotencyKey, op: F) -> Result<(bool, T)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        // No lock held while the operation (and its blocking I/O) runs.
        let outcome = op().and_then(|result| {
            let payload = serde_json::to_value(&result)
                .map_err(|e| WellflowError::Serialization(e.to_string()))?;
            let encoded = serde_json::to_vec(&payload)
                .map_err(|e| WellflowError::Serialization(e.to_string()))?;
            Ok((result, payload, ContentHash::of_bytes(&encoded)))
        });
        match outcome {
            Ok((result, payload, result_hash)) => {
                let mut records = self.records.lock().expect("idempotency mutex poisoned");
                if let Some(record) =
                    records.get_mut(&(scope.to_string(), key.as_str().to_string()))
                {
                    // Pending → Succeeded exactly once; our claim guarantees
                    // no other writer raced us here.
                    record.status = IdempotencyStatus::Succeeded;
                    record.result_hash = Some(result_hash);
                    record.result_payload = Some(payload);
                    record.completed_at = Some(Utc::now());
                }
                Ok((false, result))
            }
            Err(err) => {
                let mut records = self.records.lock().expect("idempotency mutex poisoned");
                if let Some(record) =
                    records.get_mut(&(scope.to_string(), key.as_str().to_string()))
                {
                    record.status = IdempotencyStatus::Failed;
                    record.completed_at = Some(Utc::now());
                }
                tracing::warn!(scope, key = key.as_str(), error = %err, "operation failed, key retryable");
                Err(err)
            }
        }
    }

    /// Inspect a record.
    #[must_use]
    pub fn get(&self, scope: &str, key: &IdempotencyKey) -> Option<IdempotencyRecord> {
        self.records
            .lock()
            .expect("idempotency mutex poisoned")
            .get(&(scope.to_string(), key.as_str().to_string()))
            .cloned()
    }

    /// Number of records currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().expect("idempotency mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purge completed records older than the retention window.
    ///
    /// PENDING records are never purged. The window must exceed any
    /// plausible client retry window: purging a record whose effects are
    /// still externally visible would allow re-execution.
    pub fn purge_older_than(&self, retention: TimeDelta) -> usize {
        let cutoff = Utc::now() - retention;
        let mut records = self.records.lock().expect("idempotency mutex poisoned");
        let before = records.len();
        records.retain(|_, r| {
            r.status == IdempotencyStatus::Pending
                || r.completed_at.is_none_or(|done| done >= cutoff)
        });
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn hash(n: u32) -> RequestHash {
        RequestHash::of("test", &n).unwrap()
    }

    #[test]
    fn first_execution_runs_and_records() {
        let store = IdempotencyStore::new();
        let key = IdempotencyKey::parse("k1").unwrap();
        let (reused, value) = store
            .execute("settlements-approve", &key, hash(1), || Ok(41 + 1))
            .unwrap();
        assert!(!reused);
        assert_eq!(value, 42);

        let record = store.get("settlements-approve", &key).unwrap();
        assert_eq!(record.status, IdempotencyStatus::Succeeded);
        assert!(record.result_hash.is_some());
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn identical_replay_skips_execution() {
        let store = IdempotencyStore::new();
        let key = IdempotencyKey::parse("k1").unwrap();
        let calls = AtomicUsize::new(0);

        let run = || {
            store.execute("s", &key, hash(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("done".to_string())
            })
        };
        let (reused1, v1) = run().unwrap();
        let (reused2, v2) = run().unwrap();

        assert!(!reused1);
        assert!(reused2);
        assert_eq!(v1, v2);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "op must run exactly once");
    }

    #[test]
    fn different_request_hash_conflicts() {
        let store = IdempotencyStore::new();
        let key = IdempotencyKey::parse("k1").unwrap();
        store
            .execute("s", &key, hash(1), || Ok(1u32))
            .unwrap();

        let err = store
            .execute("s", &key, hash(2), || Ok(2u32))
            .unwrap_err();
        assert!(matches!(err, WellflowError::IdempotencyKeyConflict { .. }));

        // The original result is unchanged.
        let (reused, v) = store.execute("s", &key, hash(1), || Ok(99u32)).unwrap();
        assert!(reused);
        assert_eq!(v, 1);
    }

    #[test]
    fn same_key_different_scope_is_independent() {
        let store = IdempotencyStore::new();
        let key = IdempotencyKey::parse("k1").unwrap();
        let (_, a) = store
            .execute("settlements-approve", &key, hash(1), || Ok(1u32))
            .unwrap();
        let (reused, b) = store
            .execute("settlements-cancel", &key, hash(1), || Ok(2u32))
            .unwrap();
        assert!(!reused);
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn failed_record_is_retryable() {
        let store = IdempotencyStore::new();
        let key = IdempotencyKey::parse("k1").unwrap();

        let err = store
            .execute("s", &key, hash(1), || {
                Err::<u32, _>(WellflowError::TransferFailed {
                    reason: "ledger down".to_string(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, WellflowError::TransferFailed { .. }));
        assert_eq!(
            store.get("s", &key).unwrap().status,
            IdempotencyStatus::Failed
        );

        // Retry re-attempts the real operation.
        let (reused, v) = store.execute("s", &key, hash(1), || Ok(7u32)).unwrap();
        assert!(!reused);
        assert_eq!(v, 7);
    }

    #[test]
    fn in_flight_execution_blocks_second_caller() {
        let store = Arc::new(IdempotencyStore::new());
        let key = IdempotencyKey::parse("k1").unwrap();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let store_a = Arc::clone(&store);
        let key_a = key.clone();
        let worker = std::thread::spawn(move || {
            store_a.execute("s", &key_a, hash(1), move || {
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(1u32)
            })
        });

        // Wait until the first execution is provably in flight.
        entered_rx.recv().unwrap();
        let err = store.execute("s", &key, hash(1), || Ok(2u32)).unwrap_err();
        assert!(matches!(err, WellflowError::OperationInProgress { .. }));

        release_tx.send(()).unwrap();
        let (reused, v) = worker.join().unwrap().unwrap();
        assert!(!reused);
        assert_eq!(v, 1);

        // After completion, the same key replays.
        let (reused, v) = store.execute("s", &key, hash(1), || Ok(3u32)).unwrap();
        assert!(reused);
        assert_eq!(v, 1);
    }

    #[test]
    fn purge_respects_retention_and_pending() {
        let store = IdempotencyStore::new();
        let done = IdempotencyKey::parse("done").unwrap();
        store.execute("s", &done, hash(1), || Ok(1u32)).unwrap();
        assert_eq!(store.len(), 1);

        // Nothing is old enough yet.
        assert_eq!(store.purge_older_than(TimeDelta::hours(1)), 0);
        assert_eq!(store.len(), 1);

        // With a zero-width window the completed record goes; replay is gone
        // and the key executes fresh.
        assert_eq!(store.purge_older_than(TimeDelta::seconds(-1)), 1);
        assert!(store.is_empty());
        let (reused, _) = store.execute("s", &done, hash(1), || Ok(2u32)).unwrap();
        assert!(!reused);
    }
}
