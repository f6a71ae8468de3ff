//! Shared fixtures for integration tests: a fully wired in-memory stack plus
//! gated/failing collaborators for exercising specific pipeline states.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use paperchat::chat::{ChatFragment, ChatOrchestrator};
use paperchat::config::{
    ChatConfig, ChunkingConfig, EmbeddingConfig, IngestConfig, IngestTimeouts, RetrievalConfig,
    SessionConfig,
};
use paperchat::ingest::{EmbedWorker, IngestionPipeline};
use paperchat::providers::{
    CompletionProvider, DocumentStore, EmbedError, EmbeddingProvider, ExtractError,
    InMemoryDocumentStore, MockEmbeddingProvider, TextExtractor, Utf8Extractor,
};
use paperchat::registry::SessionRegistry;
use paperchat::retrieval::RetrievalEngine;
use paperchat::status::StatusTracker;
use paperchat::types::{DocumentId, DocumentStatus, SessionId};

pub struct TestStack {
    pub registry: Arc<SessionRegistry>,
    pub pipeline: Arc<IngestionPipeline>,
    pub tracker: StatusTracker,
    pub retrieval: Arc<RetrievalEngine>,
    pub store: Arc<InMemoryDocumentStore>,
}

/// Small windows and short timeouts so tests run quickly.
pub fn fast_ingest_config() -> IngestConfig {
    IngestConfig {
        chunking: ChunkingConfig {
            target_chars: 120,
            overlap_chars: 20,
            max_document_chars: 10_000,
        },
        embedding: EmbeddingConfig {
            batch_size: 4,
            max_attempts: 2,
            backoff_base: Duration::from_millis(2),
            request_timeout: Duration::from_secs(2),
        },
        timeouts: IngestTimeouts {
            fetch: Duration::from_secs(2),
            extract: Duration::from_secs(2),
        },
    }
}

pub fn build_stack(
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> TestStack {
    paperchat::telemetry::init();
    let registry = Arc::new(SessionRegistry::new(SessionConfig::default()));
    let store = Arc::new(InMemoryDocumentStore::new());
    let config = fast_ingest_config();
    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        extractor,
        EmbedWorker::new(Arc::clone(&embedder), config.embedding.clone()),
        config,
    ));
    let tracker = StatusTracker::new(
        Arc::clone(&registry),
        Arc::clone(&pipeline),
        Duration::from_secs(60),
    );
    let retrieval = Arc::new(RetrievalEngine::new(
        Arc::clone(&registry),
        embedder,
        RetrievalConfig::default(),
    ));
    TestStack {
        registry,
        pipeline,
        tracker,
        retrieval,
        store,
    }
}

/// Stack with pass-through extraction and deterministic mock embeddings.
pub fn stack() -> TestStack {
    build_stack(Arc::new(Utf8Extractor), Arc::new(MockEmbeddingProvider::new()))
}

pub fn orchestrator_with(
    stack: &TestStack,
    completions: Arc<dyn CompletionProvider>,
    config: ChatConfig,
) -> ChatOrchestrator {
    ChatOrchestrator::new(
        Arc::clone(&stack.registry),
        Arc::clone(&stack.retrieval),
        completions,
        config,
    )
}

/// Extractor that parks until the test grants a permit.
pub struct GatedExtractor {
    gate: Arc<Semaphore>,
}

impl GatedExtractor {
    pub fn closed() -> (Arc<Semaphore>, Arc<Self>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Arc::clone(&gate),
            Arc::new(Self { gate }),
        )
    }
}

#[async_trait]
impl TextExtractor for GatedExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let permit = self.gate.acquire().await.expect("gate never closes");
        permit.forget();
        Utf8Extractor.extract(bytes).await
    }
}

/// Embedder that parks until the test grants a permit, then answers like the
/// mock provider.
pub struct GatedEmbedder {
    gate: Arc<Semaphore>,
    inner: MockEmbeddingProvider,
}

impl GatedEmbedder {
    pub fn closed() -> (Arc<Semaphore>, Arc<Self>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Arc::clone(&gate),
            Arc::new(Self {
                gate,
                inner: MockEmbeddingProvider::new(),
            }),
        )
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let permit = self.gate.acquire().await.expect("gate never closes");
        permit.forget();
        self.inner.embed_batch(inputs).await
    }
}

/// Embedder whose every request fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        "mock-bag-of-words"
    }

    async fn embed_batch(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Request {
            message: "provider unavailable".to_string(),
        })
    }
}

/// Polls a document until `pred` holds; panics after five seconds.
pub async fn wait_for_status<F>(
    registry: &SessionRegistry,
    session: &SessionId,
    document: &DocumentId,
    pred: F,
) -> DocumentStatus
where
    F: Fn(&DocumentStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let doc = registry
            .document(session, document)
            .expect("session alive")
            .expect("document attached");
        if pred(&doc.status) {
            return doc.status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for document status; last was {}",
            doc.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_until_terminal(
    registry: &SessionRegistry,
    session: &SessionId,
    document: &DocumentId,
) -> DocumentStatus {
    wait_for_status(registry, session, document, DocumentStatus::is_terminal).await
}

/// Drains a fragment stream until the terminal fragment, inclusive.
pub async fn drain_fragments(rx: &flume::Receiver<ChatFragment>) -> Vec<ChatFragment> {
    let mut fragments = Vec::new();
    loop {
        let fragment = tokio::time::timeout(Duration::from_secs(5), rx.recv_async())
            .await
            .expect("fragment stream stalled")
            .expect("fragment stream closed before terminal fragment");
        let terminal = fragment.is_terminal();
        fragments.push(fragment);
        if terminal {
            return fragments;
        }
    }
}

/// Concatenated visible text from a drained fragment list.
pub fn visible_text(fragments: &[ChatFragment]) -> String {
    fragments
        .iter()
        .filter_map(|fragment| match fragment {
            ChatFragment::Content { content, .. } => Some(content.as_str()),
            ChatFragment::Related { .. } => None,
        })
        .collect()
}
