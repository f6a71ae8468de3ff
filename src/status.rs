//! Pollable view over ingestion progress.
//!
//! Purely derived from the session registry and the pipeline's queues;
//! read-only and never blocking beyond a short lock. Built for callers that
//! poll on an interval instead of holding an open connection.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::ingest::IngestionPipeline;
use crate::registry::{RegistryError, SessionRegistry};
use crate::types::SessionId;

/// Snapshot of a session's ingestion state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Whether a document is being ingested right now.
    pub processing: bool,
    /// Name of the document being ingested, when one is.
    pub current_document: Option<String>,
    /// Jobs waiting behind the current one.
    pub queue_depth: usize,
    /// The current document has been processing longer than the stuck
    /// threshold. Step timeouts are shorter than the threshold, so this
    /// should stay false in a healthy deployment.
    pub stalled: bool,
}

/// Read-only status reporting for ingestion.
pub struct StatusTracker {
    registry: Arc<SessionRegistry>,
    pipeline: Arc<IngestionPipeline>,
    stuck_threshold: Duration,
}

impl StatusTracker {
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        pipeline: Arc<IngestionPipeline>,
        stuck_threshold: Duration,
    ) -> Self {
        Self {
            registry,
            pipeline,
            stuck_threshold,
        }
    }

    /// Current ingestion status for a session.
    pub fn status(&self, session_id: &SessionId) -> Result<StatusSnapshot, RegistryError> {
        let processing = self.registry.processing_state(session_id)?;
        let queue_depth = self.pipeline.queue_depth(session_id);

        Ok(match processing {
            Some(state) => {
                let elapsed = (Utc::now() - state.started_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                StatusSnapshot {
                    processing: true,
                    current_document: Some(state.document_name),
                    queue_depth,
                    stalled: elapsed > self.stuck_threshold,
                }
            }
            None => StatusSnapshot {
                processing: false,
                current_document: None,
                queue_depth,
                stalled: false,
            },
        })
    }
}
