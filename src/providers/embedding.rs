//! Embedding provider contract and implementations.
//!
//! The provider is a black box that maps a batch of texts to fixed-length
//! vectors. The `model_id` it reports is recorded on every session index so
//! vectors from different embedding spaces are never mixed within a session.

use std::hash::Hasher;

use async_trait::async_trait;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

/// Errors surfaced by an embedding provider.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The request could not be sent or the response could not be read.
    #[error("embedding request failed: {message}")]
    Request { message: String },

    /// The provider answered with a non-success status.
    #[error("embedding provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// The provider returned a different number of vectors than inputs.
    #[error("embedding batch shape mismatch: sent {expected} inputs, got {actual} vectors")]
    ShapeMismatch { expected: usize, actual: usize },
}

impl From<reqwest::Error> for EmbedError {
    fn from(err: reqwest::Error) -> Self {
        EmbedError::Request {
            message: err.to_string(),
        }
    }
}

/// Batch text-to-vector provider.
///
/// Implementations must be deterministic per input within a model id: the
/// retrieval engine embeds queries with the same provider that indexed the
/// chunks and relies on the shared embedding space.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model; recorded on the session index.
    fn model_id(&self) -> &str;

    /// Embeds `inputs` in order, one vector per input.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-style `/embeddings` endpoint.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingProvider {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: inputs,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response.json().await?;
        if body.data.len() != inputs.len() {
            return Err(EmbedError::ShapeMismatch {
                expected: inputs.len(),
                actual: body.data.len(),
            });
        }
        Ok(body.data.into_iter().map(|row| row.embedding).collect())
    }
}

/// Deterministic in-memory embedder for tests and demos.
///
/// Each text is hashed into a fixed-dimension bag-of-words vector, so
/// identical texts always share a vector (self-similarity is maximal) while
/// texts with disjoint vocabulary land far apart.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self { dims: 16 }
    }
}

impl MockEmbeddingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dims(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let mut hasher = FxHasher::default();
            hasher.write(word.to_lowercase().as_bytes());
            let bucket = (hasher.finish() as usize) % self.dims;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn model_id(&self) -> &str {
        "mock-bag-of-words"
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(inputs.iter().map(|text| self.embed_one(text)).collect())
    }
}
