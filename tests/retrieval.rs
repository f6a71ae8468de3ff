//! Retrieval engine integration tests: determinism, ready-only visibility,
//! self-similarity ranking, embedding-space consistency, and enrichment.

mod common;

use std::sync::Arc;

use common::{FailingEmbedder, build_stack, stack, wait_until_terminal};
use paperchat::config::RetrievalConfig;
use paperchat::ingest::DocumentInput;
use paperchat::providers::{
    DocumentMeta, EmbeddingProvider, MockEmbeddingProvider, StaticMetadataLookup, Utf8Extractor,
};
use paperchat::retrieval::{RetrievalEngine, RetrievalError};
use paperchat::types::{DocumentStatus, SessionId};

fn upload(name: &str, text: &str) -> DocumentInput {
    DocumentInput::Upload {
        name: name.to_string(),
        bytes: text.as_bytes().to_vec(),
    }
}

async fn ingest_ready(stack: &common::TestStack, session: &SessionId, name: &str, text: &str) {
    let doc = stack.pipeline.ingest(session, upload(name, text)).unwrap();
    let status = wait_until_terminal(&stack.registry, session, &doc.id).await;
    assert_eq!(status, DocumentStatus::Ready, "fixture document must index");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_index_returns_empty_result() {
    let stack = stack();
    let session = stack.registry.create();

    let hits = stack.retrieval.retrieve(&session, "query", 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_session_is_a_hard_error() {
    let stack = stack();
    let err = stack
        .retrieval
        .retrieve(&SessionId::generate(), "query", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Registry(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_queries_return_identical_ordered_results() {
    let stack = stack();
    let session = stack.registry.create();
    ingest_ready(
        &stack,
        &session,
        "colors.txt",
        "the sky is blue because of rayleigh scattering of sunlight",
    )
    .await;
    ingest_ready(
        &stack,
        &session,
        "oceans.txt",
        "oceans appear blue because water absorbs red light",
    )
    .await;

    let first = stack
        .retrieval
        .retrieve(&session, "why is the sky blue", 4)
        .await
        .unwrap();
    let second = stack
        .retrieval
        .retrieve(&session, "why is the sky blue", 4)
        .await
        .unwrap();

    assert!(!first.is_empty());
    let key = |hits: &[paperchat::retrieval::RetrievedChunk]| {
        hits.iter()
            .map(|h| (h.document.id.clone(), h.chunk_index, h.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&first), key(&second));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_documents_never_appear_in_results() {
    let stack = stack();
    let session = stack.registry.create();
    ingest_ready(&stack, &session, "good.txt", "indexed searchable content").await;

    // Second document fails extraction; nothing of it may surface.
    let bad = stack
        .pipeline
        .ingest(
            &session,
            DocumentInput::Upload {
                name: "bad.pdf".to_string(),
                bytes: vec![0xff, 0xfe],
            },
        )
        .unwrap();
    let status = wait_until_terminal(&stack.registry, &session, &bad.id).await;
    assert!(matches!(status, DocumentStatus::Failed { .. }));

    let hits = stack
        .retrieval
        .retrieve(&session, "indexed searchable content", 10)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| hit.document.id != bad.id));
    assert!(hits.iter().all(|hit| hit.document.status.is_ready()));
}

#[tokio::test(flavor = "multi_thread")]
async fn exact_chunk_text_ranks_its_own_chunk_first() {
    let stack = stack();
    let session = stack.registry.create();
    ingest_ready(&stack, &session, "a.txt", "gradient descent minimizes loss").await;
    ingest_ready(&stack, &session, "b.txt", "transformers use attention layers").await;
    ingest_ready(&stack, &session, "c.txt", "reinforcement learning maximizes reward").await;

    // Query with the exact text of b's only chunk: self-similarity is maximal.
    let hits = stack
        .retrieval
        .retrieve(&session, "transformers use attention layers", 3)
        .await
        .unwrap();
    assert_eq!(hits[0].document.name, "b.txt");
    assert!(
        (hits[0].score - 1.0).abs() < 1e-5,
        "self-similarity should be maximal, got {}",
        hits[0].score
    );
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test(flavor = "multi_thread")]
async fn querying_with_a_different_embedding_model_is_refused() {
    let stack = stack();
    let session = stack.registry.create();
    ingest_ready(&stack, &session, "doc.txt", "some indexed text").await;

    struct OtherModel(MockEmbeddingProvider);

    #[async_trait::async_trait]
    impl EmbeddingProvider for OtherModel {
        fn model_id(&self) -> &str {
            "another-embedding-space"
        }

        async fn embed_batch(
            &self,
            inputs: &[String],
        ) -> Result<Vec<Vec<f32>>, paperchat::providers::EmbedError> {
            self.0.embed_batch(inputs).await
        }
    }

    let mismatched = RetrievalEngine::new(
        Arc::clone(&stack.registry),
        Arc::new(OtherModel(MockEmbeddingProvider::new())),
        RetrievalConfig::default(),
    );
    let err = mismatched.retrieve(&session, "query", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::ModelMismatch { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_documents_stop_appearing_immediately() {
    let stack = stack();
    let session = stack.registry.create();
    ingest_ready(&stack, &session, "doomed.txt", "soon to be deleted content").await;

    let doc = &stack.registry.list_documents(&session).unwrap()[0];
    assert!(stack.registry.delete_document(&session, &doc.id).unwrap());

    let hits = stack
        .retrieval
        .retrieve(&session, "soon to be deleted content", 5)
        .await
        .unwrap();
    assert!(hits.is_empty(), "no stale retrieval hits after deletion");
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_documents_are_enriched_with_metadata_titles() {
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let stack = build_stack(Arc::new(Utf8Extractor), embedder.clone());
    let metadata = Arc::new(StaticMetadataLookup::new());
    metadata.insert("1706.03762", DocumentMeta::titled("Attention Is All You Need"));
    let retrieval = RetrievalEngine::new(
        Arc::clone(&stack.registry),
        embedder,
        RetrievalConfig::default(),
    )
    .with_metadata(metadata);

    let session = stack.registry.create();
    stack
        .store
        .insert("1706.03762", b"attention weighs token relevance".to_vec());
    let doc = stack
        .pipeline
        .ingest(
            &session,
            DocumentInput::Remote {
                remote_id: "1706.03762".to_string(),
            },
        )
        .unwrap();
    wait_until_terminal(&stack.registry, &session, &doc.id).await;

    let hits = retrieval
        .retrieve(&session, "attention weighs token relevance", 1)
        .await
        .unwrap();
    assert_eq!(hits[0].title.as_deref(), Some("Attention Is All You Need"));
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_provider_failure_surfaces_as_retrieval_error() {
    let stack = stack();
    let session = stack.registry.create();
    ingest_ready(&stack, &session, "doc.txt", "content in the index").await;

    let broken = RetrievalEngine::new(
        Arc::clone(&stack.registry),
        Arc::new(FailingEmbedder),
        RetrievalConfig::default(),
    );
    let err = broken.retrieve(&session, "query", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Embedding(_)));
}
