//! Display-metadata lookup for retrieval provenance.
//!
//! Enrichment only: a missing or failed lookup never degrades retrieval
//! itself, it just leaves provenance at the stored document name.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Display metadata attached to retrieval provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: String,
    pub summary: Option<String>,
    pub categories: Vec<String>,
}

impl DocumentMeta {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: None,
            categories: Vec::new(),
        }
    }
}

/// Looks up display metadata for a remote document id.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Returns metadata when known; `None` on miss or lookup failure.
    async fn lookup(&self, remote_id: &str) -> Option<DocumentMeta>;
}

/// In-memory metadata table for tests and demos.
#[derive(Debug, Default)]
pub struct StaticMetadataLookup {
    entries: RwLock<FxHashMap<String, DocumentMeta>>,
}

impl StaticMetadataLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, remote_id: impl Into<String>, meta: DocumentMeta) {
        self.entries.write().insert(remote_id.into(), meta);
    }
}

#[async_trait]
impl MetadataLookup for StaticMetadataLookup {
    async fn lookup(&self, remote_id: &str) -> Option<DocumentMeta> {
        self.entries.read().get(remote_id).cloned()
    }
}
