//! External collaborator interfaces and their default implementations.
//!
//! The pipeline never reimplements a model, a PDF parser, or a blob store; it
//! talks to each through a narrow async trait. Every trait ships with an
//! HTTP-backed client for production wiring and a deterministic in-memory
//! implementation used by tests and demos.
//!
//! * [`embedding`]: batch text-to-vector provider.
//! * [`completion`]: streaming chat-completion provider.
//! * [`store`]: raw document bytes, fetched by remote identifier.
//! * [`extract`]: PDF/bytes to plain text.
//! * [`metadata`]: display metadata for retrieval provenance.

pub mod completion;
pub mod embedding;
pub mod extract;
pub mod metadata;
pub mod store;

pub use completion::{
    CompletionError, CompletionProvider, HttpCompletionProvider, ScriptStep,
    ScriptedCompletionProvider, TokenStream,
};
pub use embedding::{EmbedError, EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
pub use extract::{ExtractError, HttpTextExtractor, TextExtractor, Utf8Extractor};
pub use metadata::{DocumentMeta, MetadataLookup, StaticMetadataLookup};
pub use store::{DocumentStore, FetchError, HttpDocumentStore, InMemoryDocumentStore};
