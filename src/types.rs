//! Core identifiers and document types shared across the pipeline.
//!
//! Everything in this module is plain data: identifiers are opaque UUID-backed
//! newtypes, and [`DocumentRef`] is the externally visible record of one
//! attached document. Mutation of a [`DocumentRef`] goes through the session
//! registry, which uses [`DocumentStatus::can_transition`] to keep status
//! changes monotonic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identifier handed to callers on session creation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque identifier for one attached document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generates a fresh random document id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where a document's bytes came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    /// Bytes supplied directly by the caller.
    Uploaded,
    /// Bytes fetched from the remote document store by identifier.
    Fetched { remote_id: String },
}

/// Reason a document ended in the failed state.
///
/// The string forms are part of the external status contract, so they stay
/// stable even if the internal error types change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    FetchError,
    ExtractError,
    EmbedError,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::FetchError => "fetch-error",
            FailureReason::ExtractError => "extract-error",
            FailureReason::EmbedError => "embed-error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one document inside a session.
///
/// Transitions follow `Queued → Extracting → Embedding → Ready`, with a single
/// divert to `Failed` allowed from any non-terminal state. `Ready` and
/// `Failed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Queued,
    Extracting,
    Embedding,
    Ready,
    Failed { reason: FailureReason },
}

impl DocumentStatus {
    /// Position along the forward chain; terminal states share the top rank.
    fn stage(&self) -> u8 {
        match self {
            DocumentStatus::Queued => 0,
            DocumentStatus::Extracting => 1,
            DocumentStatus::Embedding => 2,
            DocumentStatus::Ready | DocumentStatus::Failed { .. } => 3,
        }
    }

    /// Returns `true` when this status can never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Ready | DocumentStatus::Failed { .. })
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, DocumentStatus::Ready)
    }

    /// Whether moving from `self` to `next` respects the monotonic order.
    ///
    /// Forward moves along the chain are allowed, as is a divert to `Failed`
    /// from any non-terminal state. Everything else, including any move out of
    /// a terminal state, is rejected.
    #[must_use]
    pub fn can_transition(&self, next: &DocumentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, DocumentStatus::Failed { .. }) {
            return true;
        }
        next.stage() > self.stage()
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Queued => f.write_str("queued"),
            DocumentStatus::Extracting => f.write_str("extracting"),
            DocumentStatus::Embedding => f.write_str("embedding"),
            DocumentStatus::Ready => f.write_str("ready"),
            DocumentStatus::Failed { reason } => write!(f, "failed({reason})"),
        }
    }
}

/// Externally visible record of one document attached to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: DocumentId,
    /// Back-reference only; the session owns the document, not the reverse.
    pub session_id: SessionId,
    pub origin: DocumentOrigin,
    pub name: String,
    pub byte_size: usize,
    pub status: DocumentStatus,
    pub chunk_count: usize,
}

impl DocumentRef {
    /// Creates a queued document record for a session.
    #[must_use]
    pub fn queued(
        session_id: SessionId,
        origin: DocumentOrigin,
        name: impl Into<String>,
        byte_size: usize,
    ) -> Self {
        Self {
            id: DocumentId::generate(),
            session_id,
            origin,
            name: name.into(),
            byte_size,
            status: DocumentStatus::Queued,
            chunk_count: 0,
        }
    }
}

/// A bounded span of extracted text paired with its embedding vector.
///
/// Immutable once created; owned by the session index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: DocumentId,
    /// Position of this chunk within the document's original text order.
    pub index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_round_trip() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(a, parsed);
    }

    #[test]
    fn forward_transitions_are_allowed() {
        use DocumentStatus::*;
        assert!(Queued.can_transition(&Extracting));
        assert!(Extracting.can_transition(&Embedding));
        assert!(Embedding.can_transition(&Ready));
        // Skipping intermediate stages still moves forward.
        assert!(Queued.can_transition(&Ready));
    }

    #[test]
    fn failure_divert_is_allowed_from_non_terminal_states() {
        use DocumentStatus::*;
        let failed = Failed {
            reason: FailureReason::ExtractError,
        };
        assert!(Queued.can_transition(&failed));
        assert!(Extracting.can_transition(&failed));
        assert!(Embedding.can_transition(&failed));
    }

    #[test]
    fn regressions_and_terminal_exits_are_rejected() {
        use DocumentStatus::*;
        let failed = Failed {
            reason: FailureReason::EmbedError,
        };
        assert!(!Extracting.can_transition(&Queued));
        assert!(!Embedding.can_transition(&Extracting));
        assert!(!Ready.can_transition(&Extracting));
        assert!(!Ready.can_transition(&failed));
        assert!(!failed.can_transition(&Ready));
        assert!(!failed.can_transition(&Queued));
    }

    #[test]
    fn failure_reason_strings_are_stable() {
        assert_eq!(FailureReason::FetchError.as_str(), "fetch-error");
        assert_eq!(FailureReason::ExtractError.as_str(), "extract-error");
        assert_eq!(FailureReason::EmbedError.as_str(), "embed-error");
    }

    #[test]
    fn queued_document_starts_empty() {
        let session = SessionId::generate();
        let doc = DocumentRef::queued(session.clone(), DocumentOrigin::Uploaded, "paper.pdf", 42);
        assert_eq!(doc.session_id, session);
        assert_eq!(doc.status, DocumentStatus::Queued);
        assert_eq!(doc.chunk_count, 0);
        assert_eq!(doc.byte_size, 42);
    }
}
