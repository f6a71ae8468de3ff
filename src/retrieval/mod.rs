//! Similarity retrieval: the per-session vector index and the query engine.

mod engine;
mod index;

pub use engine::{RetrievalEngine, RetrievalError, RetrievedChunk};
pub use index::{EmbeddingSpaceMismatch, ScoredHit, SessionIndex, cosine_similarity};
