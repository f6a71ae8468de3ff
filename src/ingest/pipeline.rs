//! Asynchronous, per-session serialized document ingestion.
//!
//! `ingest` records a queued document and returns immediately; a dedicated
//! lane task per session drains jobs one at a time, so provider concurrency
//! stays bounded and status reporting stays deterministic. Step failures are
//! recorded on the document and never crash the session. Ending a session
//! flips its cancellation signal, which the lane observes at every await
//! point.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::instrument;

use crate::config::IngestConfig;
use crate::providers::{DocumentStore, TextExtractor};
use crate::registry::{ProcessingState, RegistryError, SessionRegistry};
use crate::types::{
    Chunk, DocumentId, DocumentOrigin, DocumentRef, DocumentStatus, FailureReason, SessionId,
};

use super::chunker::{Chunker, cap_text};
use super::embed_worker::EmbedWorker;

/// One document entering the pipeline, normalized across origins.
#[derive(Clone, Debug)]
pub enum DocumentInput {
    /// Bytes supplied directly by the caller.
    Upload { name: String, bytes: Vec<u8> },
    /// Bytes to fetch from the document store by identifier.
    Remote { remote_id: String },
}

impl DocumentInput {
    fn display_name(&self) -> String {
        match self {
            DocumentInput::Upload { name, .. } => name.clone(),
            DocumentInput::Remote { remote_id } => remote_id.clone(),
        }
    }

    fn origin(&self) -> DocumentOrigin {
        match self {
            DocumentInput::Upload { .. } => DocumentOrigin::Uploaded,
            DocumentInput::Remote { remote_id } => DocumentOrigin::Fetched {
                remote_id: remote_id.clone(),
            },
        }
    }

    fn byte_size_hint(&self) -> usize {
        match self {
            DocumentInput::Upload { bytes, .. } => bytes.len(),
            DocumentInput::Remote { .. } => 0,
        }
    }
}

struct IngestJob {
    document_id: DocumentId,
    input: DocumentInput,
}

struct Lane {
    jobs: flume::Sender<IngestJob>,
    /// Jobs enqueued but not yet started; the one being processed is visible
    /// through the registry's processing indicator instead.
    queued: Arc<AtomicUsize>,
}

/// Why one document's ingestion stopped.
#[derive(Debug, Error)]
enum IngestFailure {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("extraction failed: {0}")]
    Extract(String),

    #[error("embedding failed: {0}")]
    Embed(String),

    /// The session vanished mid-job; there is no document left to mark.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl IngestFailure {
    fn reason(&self) -> Option<FailureReason> {
        match self {
            IngestFailure::Fetch(_) => Some(FailureReason::FetchError),
            IngestFailure::Extract(_) => Some(FailureReason::ExtractError),
            IngestFailure::Embed(_) => Some(FailureReason::EmbedError),
            IngestFailure::Registry(RegistryError::EmbeddingModelMismatch { .. }) => {
                Some(FailureReason::EmbedError)
            }
            IngestFailure::Registry(_) => None,
        }
    }
}

/// Orchestrates acquire → extract → chunk & embed → index → ready.
pub struct IngestionPipeline {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    embed_worker: EmbedWorker,
    chunker: Chunker,
    config: IngestConfig,
    lanes: Mutex<FxHashMap<SessionId, Lane>>,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn TextExtractor>,
        embed_worker: EmbedWorker,
        config: IngestConfig,
    ) -> Self {
        Self {
            registry,
            store,
            extractor,
            chunker: Chunker::new(config.chunking.clone()),
            embed_worker,
            config,
            lanes: Mutex::new(FxHashMap::default()),
        }
    }

    /// Starts ingesting a document and returns its queued record immediately.
    ///
    /// Jobs for the same session run one at a time in submission order;
    /// additional calls queue behind the current job and show up in
    /// [`queue_depth`](Self::queue_depth). Must be called from within a tokio
    /// runtime.
    #[instrument(skip(self, input), fields(session = %session_id), err)]
    pub fn ingest(
        self: &Arc<Self>,
        session_id: &SessionId,
        input: DocumentInput,
    ) -> Result<DocumentRef, RegistryError> {
        let document = DocumentRef::queued(
            session_id.clone(),
            input.origin(),
            input.display_name(),
            input.byte_size_hint(),
        );
        self.registry.attach_document(session_id, document.clone())?;

        let mut lanes = self.lanes.lock();
        if !lanes.contains_key(session_id) {
            let cancel = self.registry.cancel_receiver(session_id)?;
            let (jobs_tx, jobs_rx) = flume::unbounded();
            let queued = Arc::new(AtomicUsize::new(0));
            tokio::spawn(Arc::clone(self).run_lane(
                session_id.clone(),
                jobs_rx,
                Arc::clone(&queued),
                cancel,
            ));
            lanes.insert(
                session_id.clone(),
                Lane {
                    jobs: jobs_tx,
                    queued,
                },
            );
        }
        let lane = lanes.get(session_id).expect("lane ensured above");
        lane.queued.fetch_add(1, Ordering::SeqCst);
        let job = IngestJob {
            document_id: document.id.clone(),
            input,
        };
        if lane.jobs.send(job).is_err() {
            // The lane already shut down; the session is on its way out.
            lane.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(RegistryError::Gone {
                session_id: session_id.clone(),
            });
        }
        tracing::info!(
            session = %session_id,
            document = %document.id,
            name = %document.name,
            "document queued for ingestion"
        );
        Ok(document)
    }

    /// Jobs waiting behind the one currently processing.
    #[must_use]
    pub fn queue_depth(&self, session_id: &SessionId) -> usize {
        self.lanes
            .lock()
            .get(session_id)
            .map(|lane| lane.queued.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    async fn run_lane(
        self: Arc<Self>,
        session_id: SessionId,
        jobs: flume::Receiver<IngestJob>,
        queued: Arc<AtomicUsize>,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            let job = tokio::select! {
                // Any change (or a dropped sender) means the session is over.
                _ = cancel.changed() => break,
                job = jobs.recv_async() => match job {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };
            queued.fetch_sub(1, Ordering::SeqCst);

            tokio::select! {
                _ = cancel.changed() => {
                    tracing::info!(
                        session = %session_id,
                        document = %job.document_id,
                        "ingestion cancelled mid-job"
                    );
                    break;
                }
                () = self.run_job(&session_id, &job) => {}
            }
        }
        self.lanes.lock().remove(&session_id);
        tracing::debug!(session = %session_id, "ingestion lane closed");
    }

    #[instrument(skip(self, job), fields(session = %session_id, document = %job.document_id))]
    async fn run_job(&self, session_id: &SessionId, job: &IngestJob) {
        let name = job.input.display_name();
        if self
            .registry
            .set_processing(session_id, Some(ProcessingState::started_now(name.as_str())))
            .is_err()
        {
            return;
        }

        if let Err(failure) = self.execute(session_id, job).await {
            match failure.reason() {
                Some(reason) => {
                    tracing::warn!(
                        session = %session_id,
                        document = %job.document_id,
                        reason = %reason,
                        error = %failure,
                        "document ingestion failed"
                    );
                    let _ = self.registry.transition_document(
                        session_id,
                        &job.document_id,
                        DocumentStatus::Failed { reason },
                    );
                }
                None => {
                    tracing::debug!(
                        session = %session_id,
                        document = %job.document_id,
                        error = %failure,
                        "session disappeared during ingestion"
                    );
                }
            }
        }

        let _ = self.registry.set_processing(session_id, None);
    }

    async fn execute(&self, session_id: &SessionId, job: &IngestJob) -> Result<(), IngestFailure> {
        self.registry.transition_document(
            session_id,
            &job.document_id,
            DocumentStatus::Extracting,
        )?;

        // 1. Acquire bytes.
        let bytes = match &job.input {
            DocumentInput::Upload { bytes, .. } => bytes.clone(),
            DocumentInput::Remote { remote_id } => {
                match timeout(self.config.timeouts.fetch, self.store.fetch(remote_id)).await {
                    Ok(Ok(bytes)) => bytes,
                    Ok(Err(err)) => return Err(IngestFailure::Fetch(err.to_string())),
                    Err(_) => return Err(IngestFailure::Fetch("fetch timed out".to_string())),
                }
            }
        };
        self.registry
            .set_document_byte_size(session_id, &job.document_id, bytes.len())?;

        // 2. Extract text.
        let text = match timeout(self.config.timeouts.extract, self.extractor.extract(&bytes)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => return Err(IngestFailure::Extract(err.to_string())),
            Err(_) => return Err(IngestFailure::Extract("extraction timed out".to_string())),
        };
        if text.trim().is_empty() {
            return Err(IngestFailure::Extract("no text extracted".to_string()));
        }

        // 3. Cap to the leading prefix; a lossy cost bound, not an error.
        let capped = cap_text(&text, self.config.chunking.max_document_chars);
        if capped.len() < text.len() {
            tracing::debug!(
                session = %session_id,
                document = %job.document_id,
                kept_chars = capped.chars().count(),
                "document text capped before chunking"
            );
        }

        // 4. Chunk and embed.
        self.registry.transition_document(
            session_id,
            &job.document_id,
            DocumentStatus::Embedding,
        )?;
        let windows = self.chunker.split(capped);
        let embeddings = self
            .embed_worker
            .embed_all(&windows)
            .await
            .map_err(|err| IngestFailure::Embed(err.to_string()))?;
        let chunks: Vec<Chunk> = windows
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| Chunk {
                document_id: job.document_id.clone(),
                index,
                text,
                embedding,
            })
            .collect();

        // 5. Commit: chunks land and the status flips to ready atomically.
        self.registry.commit_document(
            session_id,
            &job.document_id,
            chunks,
            self.embed_worker.model_id(),
        )?;
        Ok(())
    }
}
