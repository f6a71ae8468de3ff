//! # Chat Session Demo
//!
//! End-to-end walkthrough of the pipeline against in-memory collaborators:
//!
//! 1. **Create a session** and attach one uploaded document
//! 2. **Poll status** while the ingestion lane processes it
//! 3. **Send a chat message** and print fragments as they stream
//! 4. **Extract the side-payload** of related-document tags
//!
//! The completion provider is scripted, so the demo runs offline; swap in
//! `HttpEmbeddingProvider` / `HttpCompletionProvider` (plus API keys from the
//! environment) for a live deployment.
//!
//! ## Run This Demo
//!
//! ```bash
//! cargo run --example chat_session
//! ```

use std::sync::Arc;
use std::time::Duration;

use paperchat::chat::ChatOrchestrator;
use paperchat::config::{ChatConfig, IngestConfig, RetrievalConfig, SessionConfig};
use paperchat::ingest::{DocumentInput, EmbedWorker, IngestionPipeline};
use paperchat::providers::{
    InMemoryDocumentStore, MockEmbeddingProvider, ScriptedCompletionProvider, Utf8Extractor,
};
use paperchat::registry::SessionRegistry;
use paperchat::retrieval::RetrievalEngine;
use paperchat::status::StatusTracker;
use paperchat::telemetry;

const DOCUMENT: &str = "Rayleigh scattering disperses short wavelengths of sunlight far more \
strongly than long ones, which is why the clear daytime sky appears blue. Near sunrise and \
sunset the light path through the atmosphere lengthens, scattering away the blue and leaving \
the reds and oranges.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let session_config = SessionConfig::from_env();
    let registry = Arc::new(SessionRegistry::new(session_config.clone()));
    tokio::spawn(Arc::clone(&registry).run_eviction_sweeper());
    let embedder = Arc::new(MockEmbeddingProvider::new());

    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&registry),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(Utf8Extractor),
        EmbedWorker::new(embedder.clone(), Default::default()),
        IngestConfig::from_env(),
    ));
    let tracker = StatusTracker::new(
        Arc::clone(&registry),
        Arc::clone(&pipeline),
        session_config.stuck_threshold,
    );
    let retrieval = Arc::new(RetrievalEngine::new(
        Arc::clone(&registry),
        embedder,
        RetrievalConfig::from_env(),
    ));

    // Scripted answer with an embedded related-documents payload, split so the
    // marker crosses a fragment boundary the way a live stream would split it.
    let completions = Arc::new(ScriptedCompletionProvider::from_tokens([
        "The sky looks blue because Rayleigh ",
        "scattering favors short wavelengths. ",
        "<<rel",
        "ated>>[\"1871.00001\"]<</related>>",
        "At dusk the longer light path shifts it toward red.",
    ]));
    let orchestrator = ChatOrchestrator::new(
        Arc::clone(&registry),
        retrieval,
        completions,
        ChatConfig::from_env(),
    );

    let session = registry.create();
    println!("session: {session}");

    let document = pipeline.ingest(
        &session,
        DocumentInput::Upload {
            name: "sky-notes.txt".to_string(),
            bytes: DOCUMENT.as_bytes().to_vec(),
        },
    )?;
    println!("attached: {} ({})", document.name, document.id);

    // Poll the tracker the way a client without a push channel would.
    loop {
        let status = tracker.status(&session)?;
        println!(
            "status: processing={} current={:?} queue_depth={}",
            status.processing, status.current_document, status.queue_depth
        );
        let documents = registry.list_documents(&session)?;
        if documents.iter().all(|doc| doc.status.is_terminal()) && !status.processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    for doc in registry.list_documents(&session)? {
        println!("document {}: {} ({} chunks)", doc.name, doc.status, doc.chunk_count);
    }

    let mut turn = orchestrator.send_message(&session, "Why is the sky blue?")?;
    let fragments = turn.fragments().expect("stream not yet taken");
    while let Ok(fragment) = fragments.recv_async().await {
        print!("{}", fragment.encode_line()?);
        if fragment.is_terminal() {
            break;
        }
    }

    let outcome = turn.join().await?;
    println!("assistant: {}", outcome.message.content);
    println!("related documents: {:?}", outcome.related);

    registry.end(&session)?;
    Ok(())
}
