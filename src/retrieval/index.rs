//! Per-session vector index over ready document chunks.
//!
//! The index is owned by its session and dies with it. Chunks are committed
//! per document in one shot (all-or-nothing), so anything present here
//! belongs to a document that finished embedding. Insertion order of
//! documents is the retrieval tie-break key and is therefore preserved.

use serde::Serialize;

use crate::types::{Chunk, DocumentId};

/// The embedding model recorded on the index differs from the one offered.
///
/// Mixing embedding spaces within one session index is never allowed; this
/// error is raised instead of silently producing garbage similarities.
#[derive(Debug, thiserror::Error)]
#[error("session index uses embedding model '{indexed}', got '{offered}'")]
pub struct EmbeddingSpaceMismatch {
    pub indexed: String,
    pub offered: String,
}

/// One scored chunk returned from an index search.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredHit {
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

struct IndexedDocument {
    document_id: DocumentId,
    chunks: Vec<Chunk>,
}

/// Vector index for one session.
#[derive(Default)]
pub struct SessionIndex {
    /// Documents in insertion order; the position doubles as the tie-break.
    documents: Vec<IndexedDocument>,
    embedding_model: Option<String>,
}

impl SessionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.iter().all(|doc| doc.chunks.is_empty())
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|doc| doc.chunks.len()).sum()
    }

    /// Embedding model the index was built with, if anything is indexed.
    #[must_use]
    pub fn model_id(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    /// Adds a finished document's chunks.
    ///
    /// The first insert pins the embedding model for the session; later
    /// inserts must match it.
    pub fn insert_document(
        &mut self,
        document_id: DocumentId,
        chunks: Vec<Chunk>,
        model_id: &str,
    ) -> Result<(), EmbeddingSpaceMismatch> {
        match &self.embedding_model {
            Some(indexed) if indexed != model_id => {
                return Err(EmbeddingSpaceMismatch {
                    indexed: indexed.clone(),
                    offered: model_id.to_string(),
                });
            }
            Some(_) => {}
            None => self.embedding_model = Some(model_id.to_string()),
        }
        self.documents.push(IndexedDocument {
            document_id,
            chunks,
        });
        Ok(())
    }

    /// Drops a document's chunks; returns whether anything was removed.
    pub fn remove_document(&mut self, document_id: &DocumentId) -> bool {
        let before = self.documents.len();
        self.documents.retain(|doc| doc.document_id != *document_id);
        self.documents.len() != before
    }

    /// Scores every chunk against `query` and returns the top `k`.
    ///
    /// Results are ordered by descending similarity; equal scores fall back
    /// to (document insertion order, chunk index) so repeated identical
    /// queries return identical orderings.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredHit> {
        let mut scored: Vec<(f32, usize, usize)> = Vec::with_capacity(self.chunk_count());
        for (order, doc) in self.documents.iter().enumerate() {
            for chunk in &doc.chunks {
                scored.push((cosine_similarity(query, &chunk.embedding), order, chunk.index));
            }
        }
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, order, chunk_index)| {
                let doc = &self.documents[order];
                let chunk = doc
                    .chunks
                    .iter()
                    .find(|c| c.index == chunk_index)
                    .expect("scored chunk exists in its document");
                ScoredHit {
                    document_id: doc.document_id.clone(),
                    chunk_index,
                    text: chunk.text.clone(),
                    score,
                }
            })
            .collect()
    }
}

/// Cosine similarity with a zero-vector guard.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..len {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
