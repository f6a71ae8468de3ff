//! # Paperchat: Session-Scoped Grounded Chat
//!
//! Paperchat attaches documents to a conversational session, ingests them
//! asynchronously into a per-session vector index, and streams grounded
//! (retrieval-augmented) answers back token by token.
//!
//! ## Core Concepts
//!
//! - **Sessions**: the unit of conversational and ingestion state, owned by
//!   the [`registry::SessionRegistry`]
//! - **Ingestion**: acquire bytes → extract text → chunk & embed → index,
//!   serialized per session by the [`ingest::IngestionPipeline`]
//! - **Retrieval**: similarity search over ready chunks via the
//!   [`retrieval::RetrievalEngine`]
//! - **Chat turns**: grounded prompt, streamed tokens, and side-payload
//!   extraction in the [`chat::ChatOrchestrator`]
//! - **Status**: pollable ingestion progress from the
//!   [`status::StatusTracker`]
//!
//! External collaborators (document store, text extractor, embedding and
//! completion providers, metadata lookup) are traits under [`providers`],
//! each with an HTTP-backed client and a deterministic in-memory
//! implementation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use paperchat::chat::ChatOrchestrator;
//! use paperchat::config::{ChatConfig, IngestConfig, RetrievalConfig, SessionConfig};
//! use paperchat::ingest::{DocumentInput, EmbedWorker, IngestionPipeline};
//! use paperchat::providers::{
//!     InMemoryDocumentStore, MockEmbeddingProvider, ScriptedCompletionProvider, Utf8Extractor,
//! };
//! use paperchat::registry::SessionRegistry;
//! use paperchat::retrieval::RetrievalEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(SessionRegistry::new(SessionConfig::default()));
//! let embedder = Arc::new(MockEmbeddingProvider::new());
//!
//! let pipeline = Arc::new(IngestionPipeline::new(
//!     Arc::clone(&registry),
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(Utf8Extractor),
//!     EmbedWorker::new(embedder.clone(), Default::default()),
//!     IngestConfig::default(),
//! ));
//! let retrieval = Arc::new(RetrievalEngine::new(
//!     Arc::clone(&registry),
//!     embedder,
//!     RetrievalConfig::default(),
//! ));
//! let orchestrator = ChatOrchestrator::new(
//!     Arc::clone(&registry),
//!     retrieval,
//!     Arc::new(ScriptedCompletionProvider::from_tokens(["Hello!"])),
//!     ChatConfig::default(),
//! );
//!
//! let session = registry.create();
//! pipeline.ingest(
//!     &session,
//!     DocumentInput::Upload {
//!         name: "notes.txt".to_string(),
//!         bytes: b"The sky is blue because of Rayleigh scattering.".to_vec(),
//!     },
//! )?;
//!
//! let mut turn = orchestrator.send_message(&session, "Why is the sky blue?")?;
//! let fragments = turn.fragments().expect("stream not yet taken");
//! while let Ok(fragment) = fragments.recv_async().await {
//!     if fragment.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`registry`] - Session lifecycle, history, documents, idle eviction
//! - [`ingest`] - Chunking, batched embedding, and the async pipeline
//! - [`retrieval`] - Per-session vector index and query engine
//! - [`chat`] - Turn state machine, fragment stream, side-payload parser
//! - [`status`] - Pollable ingestion status
//! - [`providers`] - External collaborator traits and clients
//! - [`config`] - Component configuration with env overrides
//! - [`telemetry`] - Tracing bootstrap

pub mod chat;
pub mod config;
pub mod ingest;
pub mod message;
pub mod providers;
pub mod registry;
pub mod retrieval;
pub mod status;
pub mod telemetry;
pub mod types;
