//! Document bundle model for Merkle-anchored evidence.
//!
//! A bundle is an **ordered** list of document references plus the derived
//! Merkle root. Order is significant: callers are responsible for a stable
//! ordering (by `document_id`) before the root is computed. Once anchored,
//! a bundle is immutable.

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::ids::{DocumentId, WellId};

/// One document's entry in a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: DocumentId,
    pub content_hash: ContentHash,
}

/// An ordered set of evidence documents summarized by one Merkle root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBundle {
    /// The well context this bundle belongs to (informational only).
    pub well_id: WellId,
    /// Documents in the caller's stable order.
    pub documents: Vec<DocumentRef>,
    /// Merkle root over the document content hashes, in order.
    pub bundle_hash: ContentHash,
    /// Content-store id of the serialized bundle metadata, set on anchoring.
    pub file_id: Option<String>,
}

impl DocumentBundle {
    /// Number of documents in the bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_serde_roundtrip() {
        let bundle = DocumentBundle {
            well_id: WellId::new(),
            documents: vec![DocumentRef {
                document_id: DocumentId::new(),
                content_hash: ContentHash::of_bytes(b"maintenance report"),
            }],
            bundle_hash: ContentHash::of_bytes(b"root"),
            file_id: Some("file-17".to_string()),
        };
        let json = serde_json::to_string(&bundle).unwrap();
        let back: DocumentBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(bundle, back);
        assert_eq!(back.len(), 1);
        assert!(!back.is_empty());
    }
}
