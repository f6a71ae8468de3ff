//! Query-time retrieval over a session's index.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio::time::timeout;
use tracing::instrument;

use crate::config::RetrievalConfig;
use crate::providers::{EmbedError, EmbeddingProvider, MetadataLookup};
use crate::registry::{RegistryError, SessionRegistry};
use crate::types::{DocumentOrigin, DocumentRef};

/// Errors raised while retrieving context for a query.
///
/// Only `Registry` failures are hard errors for callers; the chat
/// orchestrator degrades every other variant to a contextless turn.
#[derive(Debug, Error, Diagnostic)]
pub enum RetrievalError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error("query embedding timed out")]
    #[diagnostic(
        code(paperchat::retrieval::timeout),
        help("The turn proceeds without context; no action needed unless this persists.")
    )]
    Timeout,

    #[error("query embedding failed: {0}")]
    #[diagnostic(code(paperchat::retrieval::embedding))]
    Embedding(#[from] EmbedError),

    #[error("index was built with embedding model '{indexed}', query offered '{offered}'")]
    #[diagnostic(
        code(paperchat::retrieval::model_mismatch),
        help("Never mix embedding models within one session's index.")
    )]
    ModelMismatch { indexed: String, offered: String },
}

/// One retrieved chunk with provenance for prompt construction and display.
#[derive(Clone, Debug)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
    pub chunk_index: usize,
    pub document: DocumentRef,
    /// Display title from the metadata lookup, when known.
    pub title: Option<String>,
}

/// Embeds queries and ranks a session's indexed chunks by similarity.
pub struct RetrievalEngine {
    registry: Arc<SessionRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    metadata: Option<Arc<dyn MetadataLookup>>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            registry,
            embedder,
            metadata: None,
            config,
        }
    }

    /// Enables provenance enrichment through a metadata lookup.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn default_top_k(&self) -> usize {
        self.config.top_k
    }

    /// Returns the top `k` chunks for `query`, best first.
    ///
    /// The query is embedded with the same provider that indexed the session;
    /// an index built by a different model is refused outright. An empty
    /// index yields an empty result, not an error.
    #[instrument(skip(self, query), fields(session = %session_id), err)]
    pub async fn retrieve(
        &self,
        session_id: &crate::types::SessionId,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if let Some(indexed) = self.registry.index_model(session_id)?
            && indexed != self.embedder.model_id()
        {
            return Err(RetrievalError::ModelMismatch {
                indexed,
                offered: self.embedder.model_id().to_string(),
            });
        }
        if self.registry.index_is_empty(session_id)? {
            return Ok(Vec::new());
        }

        let inputs = [query.to_string()];
        let vectors = match timeout(self.config.timeout, self.embedder.embed_batch(&inputs)).await {
            Ok(Ok(vectors)) => vectors,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(RetrievalError::Timeout),
        };
        let query_vector = vectors.into_iter().next().ok_or(EmbedError::ShapeMismatch {
            expected: 1,
            actual: 0,
        })?;

        let hits = self.registry.search_index(session_id, &query_vector, k)?;
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            // The document may have been deleted between scoring and here;
            // skip hits whose provenance is gone.
            let Some(document) = self.registry.document(session_id, &hit.document_id)? else {
                continue;
            };
            let title = self.lookup_title(&document).await;
            results.push(RetrievedChunk {
                text: hit.text,
                score: hit.score,
                chunk_index: hit.chunk_index,
                document,
                title,
            });
        }
        tracing::debug!(
            session = %session_id,
            hits = results.len(),
            "retrieval complete"
        );
        Ok(results)
    }

    async fn lookup_title(&self, document: &DocumentRef) -> Option<String> {
        let lookup = self.metadata.as_ref()?;
        let DocumentOrigin::Fetched { remote_id } = &document.origin else {
            return None;
        };
        lookup.lookup(remote_id).await.map(|meta| meta.title)
    }
}
