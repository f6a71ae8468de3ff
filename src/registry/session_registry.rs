//! The session registry: single source of truth for session lifecycle.
//!
//! All session state lives behind one lock here. Components hold an
//! `Arc<SessionRegistry>` and operate through typed methods; none of them can
//! create or destroy sessions themselves. Document status changes funnel
//! through [`SessionRegistry::transition_document`], which enforces the
//! monotonic status order, and chunk commits are atomic with the flip to
//! `Ready` so retrieval can never observe a half-indexed document.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;

use crate::config::SessionConfig;
use crate::message::ChatMessage;
use crate::retrieval::ScoredHit;
use crate::types::{Chunk, DocumentId, DocumentRef, DocumentStatus, SessionId};

use super::session::{ProcessingState, Session, SessionInfo};

/// Errors raised by session lifecycle operations.
///
/// `NotFound` and `Gone` are the only errors surfaced to callers as hard
/// failures; they indicate a caller-side identifier problem.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("session not found: {session_id}")]
    #[diagnostic(
        code(paperchat::registry::not_found),
        help("Create a session before referencing it.")
    )]
    NotFound { session_id: SessionId },

    #[error("session is gone: {session_id}")]
    #[diagnostic(
        code(paperchat::registry::gone),
        help("The session was ended or evicted for inactivity; create a new one.")
    )]
    Gone { session_id: SessionId },

    #[error("document not found: {document_id}")]
    #[diagnostic(code(paperchat::registry::document_not_found))]
    DocumentNotFound { document_id: DocumentId },

    #[error("document {document_id} cannot move from {from} to {to}")]
    #[diagnostic(code(paperchat::registry::status_regression))]
    InvalidTransition {
        document_id: DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("session index uses embedding model '{indexed}', got '{offered}'")]
    #[diagnostic(code(paperchat::registry::embedding_space_mismatch))]
    EmbeddingModelMismatch { indexed: String, offered: String },
}

struct Inner {
    sessions: FxHashMap<SessionId, Session>,
    /// Ids of sessions that were ended or evicted, so later references can be
    /// answered with `Gone` instead of `NotFound`.
    departed: FxHashSet<SessionId>,
}

/// Tracks sessions, their documents, their chat history, and their indices.
pub struct SessionRegistry {
    inner: RwLock<Inner>,
    config: SessionConfig,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                sessions: FxHashMap::default(),
                departed: FxHashSet::default(),
            }),
            config,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(SessionConfig::default())
    }

    fn missing(inner: &Inner, session_id: &SessionId) -> RegistryError {
        if inner.departed.contains(session_id) {
            RegistryError::Gone {
                session_id: session_id.clone(),
            }
        } else {
            RegistryError::NotFound {
                session_id: session_id.clone(),
            }
        }
    }

    fn read_session<R>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&Session) -> R,
    ) -> Result<R, RegistryError> {
        let inner = self.inner.read();
        inner
            .sessions
            .get(session_id)
            .map(f)
            .ok_or_else(|| Self::missing(&inner, session_id))
    }

    /// Mutating access; refreshes the idle clock as a side effect.
    fn write_session<R>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, RegistryError> {
        let mut inner = self.inner.write();
        match inner.sessions.get_mut(session_id) {
            Some(session) => {
                session.touch();
                Ok(f(session))
            }
            None => Err(Self::missing(&inner, session_id)),
        }
    }

    /// Creates a fresh session and returns its id.
    #[instrument(skip(self))]
    pub fn create(&self) -> SessionId {
        let id = SessionId::generate();
        let session = Session::new(id.clone());
        self.inner.write().sessions.insert(id.clone(), session);
        tracing::info!(session = %id, "session created");
        id
    }

    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.inner.read().sessions.contains_key(session_id)
    }

    /// Bookkeeping snapshot for one session.
    pub fn info(&self, session_id: &SessionId) -> Result<SessionInfo, RegistryError> {
        self.read_session(session_id, |s| SessionInfo {
            id: s.id.clone(),
            created_at: s.created_at,
            last_active: s.last_active,
            message_count: s.messages.len(),
            document_count: s.documents.len(),
            indexed_chunks: s.index.chunk_count(),
        })
    }

    /// Appends a message to the session's conversation history.
    pub fn append_message(
        &self,
        session_id: &SessionId,
        message: ChatMessage,
    ) -> Result<(), RegistryError> {
        self.write_session(session_id, |s| s.messages.push(message))
    }

    /// The most recent `limit` messages in append order.
    pub fn message_tail(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RegistryError> {
        self.read_session(session_id, |s| {
            let start = s.messages.len().saturating_sub(limit);
            s.messages[start..].to_vec()
        })
    }

    /// Full conversation history in append order.
    pub fn messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>, RegistryError> {
        self.read_session(session_id, |s| s.messages.clone())
    }

    /// Attaches a new document record to the session.
    pub fn attach_document(
        &self,
        session_id: &SessionId,
        document: DocumentRef,
    ) -> Result<(), RegistryError> {
        self.write_session(session_id, |s| s.documents.push(document))
    }

    /// All attached documents in insertion order.
    pub fn list_documents(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<DocumentRef>, RegistryError> {
        self.read_session(session_id, |s| s.documents.clone())
    }

    /// One document by id, if still attached.
    pub fn document(
        &self,
        session_id: &SessionId,
        document_id: &DocumentId,
    ) -> Result<Option<DocumentRef>, RegistryError> {
        self.read_session(session_id, |s| s.document(document_id).cloned())
    }

    /// Detaches a document and drops its chunks from the index in the same
    /// critical section, so a concurrent retrieval cannot hit stale chunks.
    pub fn delete_document(
        &self,
        session_id: &SessionId,
        document_id: &DocumentId,
    ) -> Result<bool, RegistryError> {
        self.write_session(session_id, |s| {
            let before = s.documents.len();
            s.documents.retain(|doc| doc.id != *document_id);
            let removed = s.documents.len() != before;
            if removed {
                s.index.remove_document(document_id);
            }
            removed
        })
    }

    /// Moves a document along its status chain.
    ///
    /// Rejects anything that is not a forward move (or a divert to `Failed`
    /// from a non-terminal state), which keeps externally observed statuses
    /// monotonic no matter how the pipeline misbehaves.
    pub fn transition_document(
        &self,
        session_id: &SessionId,
        document_id: &DocumentId,
        next: DocumentStatus,
    ) -> Result<(), RegistryError> {
        self.write_session(session_id, |s| {
            let Some(doc) = s.document_mut(document_id) else {
                return Err(RegistryError::DocumentNotFound {
                    document_id: document_id.clone(),
                });
            };
            if !doc.status.can_transition(&next) {
                return Err(RegistryError::InvalidTransition {
                    document_id: document_id.clone(),
                    from: doc.status.clone(),
                    to: next,
                });
            }
            tracing::debug!(
                session = %session_id,
                document = %document_id,
                from = %doc.status,
                to = %next,
                "document status transition"
            );
            doc.status = next;
            Ok(())
        })?
    }

    /// Records the byte size learned after acquiring a document's content.
    pub fn set_document_byte_size(
        &self,
        session_id: &SessionId,
        document_id: &DocumentId,
        byte_size: usize,
    ) -> Result<(), RegistryError> {
        self.write_session(session_id, |s| {
            if let Some(doc) = s.document_mut(document_id) {
                doc.byte_size = byte_size;
            }
        })
    }

    /// Commits a finished document: chunks land in the index, the chunk count
    /// is recorded, and the status flips to `Ready`, all atomically.
    pub fn commit_document(
        &self,
        session_id: &SessionId,
        document_id: &DocumentId,
        chunks: Vec<Chunk>,
        model_id: &str,
    ) -> Result<(), RegistryError> {
        self.write_session(session_id, |s| {
            let Some(doc) = s.document_mut(document_id) else {
                return Err(RegistryError::DocumentNotFound {
                    document_id: document_id.clone(),
                });
            };
            if !doc.status.can_transition(&DocumentStatus::Ready) {
                return Err(RegistryError::InvalidTransition {
                    document_id: document_id.clone(),
                    from: doc.status.clone(),
                    to: DocumentStatus::Ready,
                });
            }
            let chunk_count = chunks.len();
            s.index
                .insert_document(document_id.clone(), chunks, model_id)
                .map_err(|err| RegistryError::EmbeddingModelMismatch {
                    indexed: err.indexed,
                    offered: err.offered,
                })?;
            let doc = s
                .document_mut(document_id)
                .expect("document still attached within the same critical section");
            doc.chunk_count = chunk_count;
            doc.status = DocumentStatus::Ready;
            tracing::info!(
                session = %session_id,
                document = %document_id,
                chunks = chunk_count,
                "document ready"
            );
            Ok(())
        })?
    }

    /// Sets or clears the "currently processing" indicator.
    pub fn set_processing(
        &self,
        session_id: &SessionId,
        state: Option<ProcessingState>,
    ) -> Result<(), RegistryError> {
        self.write_session(session_id, |s| s.processing = state)
    }

    /// The "currently processing" indicator, read without refreshing the idle
    /// clock (status polls must not keep a session alive forever).
    pub fn processing_state(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ProcessingState>, RegistryError> {
        self.read_session(session_id, |s| s.processing.clone())
    }

    /// Embedding model the session's index was built with.
    pub fn index_model(&self, session_id: &SessionId) -> Result<Option<String>, RegistryError> {
        self.read_session(session_id, |s| s.index.model_id().map(str::to_string))
    }

    pub fn index_is_empty(&self, session_id: &SessionId) -> Result<bool, RegistryError> {
        self.read_session(session_id, |s| s.index.is_empty())
    }

    /// Scores the session index against a query vector.
    pub fn search_index(
        &self,
        session_id: &SessionId,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredHit>, RegistryError> {
        self.write_session(session_id, |s| s.index.search(query, k))
    }

    /// Cancellation signal observed by the session's ingestion lane.
    pub fn cancel_receiver(
        &self,
        session_id: &SessionId,
    ) -> Result<watch::Receiver<bool>, RegistryError> {
        self.read_session(session_id, |s| s.cancel.subscribe())
    }

    /// Ends a session: cancels in-flight ingestion and releases the index.
    #[instrument(skip(self), fields(session = %session_id))]
    pub fn end(&self, session_id: &SessionId) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        match inner.sessions.remove(session_id) {
            Some(session) => {
                let _ = session.cancel.send(true);
                inner.departed.insert(session_id.clone());
                tracing::info!(session = %session_id, "session ended");
                Ok(())
            }
            None => Err(Self::missing(&inner, session_id)),
        }
    }

    /// Removes sessions idle past the configured window. Returns evicted ids.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> Vec<SessionId> {
        let idle_cutoff = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let mut inner = self.inner.write();
        let expired: Vec<SessionId> = inner
            .sessions
            .values()
            .filter(|s| now - s.last_active > idle_cutoff)
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            if let Some(session) = inner.sessions.remove(id) {
                let _ = session.cancel.send(true);
                inner.departed.insert(id.clone());
                tracing::info!(session = %id, "session evicted after inactivity");
            }
        }
        expired
    }

    /// Periodic idle eviction. Spawn this on the runtime; it wakes once per
    /// configured sweep interval for the lifetime of the process.
    pub async fn run_eviction_sweeper(self: std::sync::Arc<Self>) {
        let interval = self.config.sweep_interval;
        loop {
            tokio::time::sleep(interval).await;
            let evicted = self.evict_idle(Utc::now());
            if !evicted.is_empty() {
                tracing::debug!(count = evicted.len(), "idle sweep evicted sessions");
            }
        }
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.read().sessions.len()
    }
}
