//! Merkle evidence anchoring.
//!
//! Folds an ordered list of content digests into a single root hash:
//! pair adjacent elements left-to-right, duplicate an odd tail to pair with
//! itself, hash each concatenated pair, repeat until one hash remains.
//!
//! Order is significant: the same ordered input always yields the same root,
//! and reordered inputs are **not** equivalent. Callers are responsible for
//! a stable ordering (by `document_id`).

use std::sync::Arc;

use sha2::{Digest, Sha256};

use wellflow_types::{
    ContentHash, CoreConfig, DocumentBundle, DocumentRef, EventEnvelope, EventPayload, MessageId,
    PublishOutcome, Result, WellId, WellflowError, constants,
};

use crate::ledger_client::EventLedgerClient;
use crate::remote::FileStore;

/// Builds and anchors document bundles summarized by one Merkle root.
pub struct MerkleAnchorBuilder {
    files: Arc<dyn FileStore>,
    events: Arc<EventLedgerClient>,
    max_documents: usize,
}

impl MerkleAnchorBuilder {
    #[must_use]
    pub fn new(files: Arc<dyn FileStore>, events: Arc<EventLedgerClient>) -> Self {
        Self {
            files,
            events,
            max_documents: constants::MAX_BUNDLE_DOCUMENTS,
        }
    }

    /// Create a builder with the document limit drawn from a [`CoreConfig`].
    #[must_use]
    pub fn from_config(
        files: Arc<dyn FileStore>,
        events: Arc<EventLedgerClient>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            files,
            events,
            max_documents: config.max_bundle_documents,
        }
    }

    /// Fold ordered content hashes into one root.
    ///
    /// Base cases: empty list → the zero sentinel (never anchored); single
    /// element → that element itself.
    #[must_use]
    pub fn compute_root(hashes: &[ContentHash]) -> ContentHash {
        if hashes.is_empty() {
            return ContentHash::ZERO;
        }
        let mut level: Vec<ContentHash> = hashes.to_vec();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                let left = pair[0];
                // Odd tail pairs with itself.
                let right = if pair.len() == 2 { pair[1] } else { pair[0] };
                next.push(combine(&left, &right));
            }
            level = next;
        }
        level[0]
    }

    /// Assemble a bundle from ordered document references, computing the root.
    ///
    /// # Errors
    /// Returns [`WellflowError::Validation`] if the document count exceeds
    /// the configured maximum.
    pub fn bundle(&self, well_id: WellId, documents: Vec<DocumentRef>) -> Result<DocumentBundle> {
        if documents.len() > self.max_documents {
            return Err(WellflowError::Validation {
                reason: format!(
                    "bundle of {} documents exceeds maximum {}",
                    documents.len(),
                    self.max_documents
                ),
            });
        }
        let hashes: Vec<ContentHash> = documents.iter().map(|d| d.content_hash).collect();
        let bundle_hash = Self::compute_root(&hashes);
        Ok(DocumentBundle {
            well_id,
            documents,
            bundle_hash,
            file_id: None,
        })
    }

    /// Anchor a bundle: persist its serialized metadata to the file store and
    /// publish a `document_bundle_anchored` event.
    ///
    /// The message id derives from the bundle hash, so re-anchoring the same
    /// bundle deduplicates at the ledger client.
    ///
    /// # Errors
    /// Returns [`WellflowError::Validation`] for an empty bundle (the zero
    /// sentinel is never anchored), [`WellflowError::FileStoreFailed`] or
    /// [`WellflowError::EventSubmissionFailed`] on collaborator failure.
    pub fn anchor(&self, bundle: &mut DocumentBundle) -> Result<PublishOutcome> {
        if bundle.bundle_hash.is_zero() {
            return Err(WellflowError::Validation {
                reason: "empty bundle cannot be anchored".to_string(),
            });
        }

        let metadata = serde_json::to_vec(&*bundle)
            .map_err(|e| WellflowError::Serialization(e.to_string()))?;
        let file_id = self.files.put(&metadata)?;
        bundle.file_id = Some(file_id.clone());

        let envelope = EventEnvelope::new(
            MessageId::from_str(bundle.bundle_hash.to_hex()),
            EventPayload::DocumentBundleAnchored {
                well_id: bundle.well_id,
                bundle_hash: bundle.bundle_hash,
                document_count: bundle.documents.len(),
                file_id,
            },
        );
        let outcome = self.events.publish(&envelope)?;

        tracing::info!(
            well_id = %bundle.well_id,
            bundle_hash = %bundle.bundle_hash,
            documents = bundle.documents.len(),
            duplicate = outcome.duplicate,
            "document bundle anchored"
        );
        Ok(outcome)
    }
}

/// Hash one pair of child nodes into their parent.
fn combine(left: &ContentHash, right: &ContentHash) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(b"wellflow:merkle:node:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    ContentHash(hasher.finalize().into())
}
