//! In-memory session state.
//!
//! A [`Session`] bundles everything tied to one interaction stream: the
//! conversation, the attached documents, the vector index, and the ingestion
//! cancellation signal. Sessions are created and destroyed only by the
//! [`SessionRegistry`](super::SessionRegistry); every other component works
//! through the registry's typed operations.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::message::ChatMessage;
use crate::retrieval::SessionIndex;
use crate::types::{DocumentRef, SessionId};

/// The document currently being ingested for a session.
#[derive(Clone, Debug)]
pub struct ProcessingState {
    pub document_name: String,
    pub started_at: DateTime<Utc>,
}

impl ProcessingState {
    #[must_use]
    pub fn started_now(document_name: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            started_at: Utc::now(),
        }
    }
}

/// One conversational session and everything it owns.
pub(crate) struct Session {
    pub(crate) id: SessionId,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_active: DateTime<Utc>,
    /// Strictly append-ordered conversation history.
    pub(crate) messages: Vec<ChatMessage>,
    /// Attached documents in insertion order (the retrieval tie-break).
    pub(crate) documents: Vec<DocumentRef>,
    pub(crate) index: SessionIndex,
    pub(crate) processing: Option<ProcessingState>,
    /// Flipped to `true` exactly once, when the session ends or is evicted.
    pub(crate) cancel: watch::Sender<bool>,
}

impl Session {
    pub(crate) fn new(id: SessionId) -> Self {
        let (cancel, _) = watch::channel(false);
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_active: now,
            messages: Vec::new(),
            documents: Vec::new(),
            index: SessionIndex::new(),
            processing: None,
            cancel,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub(crate) fn document_mut(&mut self, id: &crate::types::DocumentId) -> Option<&mut DocumentRef> {
        self.documents.iter_mut().find(|doc| doc.id == *id)
    }

    pub(crate) fn document(&self, id: &crate::types::DocumentId) -> Option<&DocumentRef> {
        self.documents.iter().find(|doc| doc.id == *id)
    }
}

/// Read-only snapshot of a session's bookkeeping fields.
#[derive(Clone, Debug)]
pub struct SessionInfo {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub message_count: usize,
    pub document_count: usize,
    pub indexed_chunks: usize,
}
