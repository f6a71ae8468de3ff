//! Document store contract: raw bytes by remote identifier.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Errors surfaced when acquiring document bytes.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("document fetch failed: {message}")]
    Request { message: String },

    /// The store has no document under this identifier.
    #[error("document '{remote_id}' not found in store")]
    NotFound { remote_id: String },

    /// The store answered with a non-success status.
    #[error("document store returned status {status}")]
    Status { status: u16 },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request {
            message: err.to_string(),
        }
    }
}

/// Read side of the remote document store.
///
/// Uploads do not pass through here; the ingestion pipeline accepts uploaded
/// byte buffers directly and only consults the store for fetch-by-id inputs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the raw bytes stored under `remote_id`.
    async fn fetch(&self, remote_id: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP client fetching `{base_url}/{remote_id}` as a byte blob.
#[derive(Clone, Debug)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentStore {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch(&self, remote_id: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/{remote_id}", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(FetchError::NotFound {
                remote_id: remote_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// In-memory store for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, remote_id: impl Into<String>, bytes: Vec<u8>) {
        self.documents.write().insert(remote_id.into(), bytes);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn fetch(&self, remote_id: &str) -> Result<Vec<u8>, FetchError> {
        self.documents
            .read()
            .get(remote_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                remote_id: remote_id.to_string(),
            })
    }
}
