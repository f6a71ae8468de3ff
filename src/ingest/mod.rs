//! Document ingestion: chunking, batched embedding, and the async pipeline.

mod chunker;
mod embed_worker;
mod pipeline;

pub use chunker::{Chunker, cap_text};
pub use embed_worker::EmbedWorker;
pub use pipeline::{DocumentInput, IngestionPipeline};
