//! Runtime configuration for the pipeline components.
//!
//! Each component takes a small plain-data config struct with sensible
//! defaults. `from_env()` constructors layer environment overrides on top of
//! the defaults so deployments can tune limits without code changes; load a
//! `.env` file first (e.g. via `dotenvy::dotenv()`) if you keep overrides
//! there.
//!
//! The document text cap (`max_document_chars`) is a deliberate lossy policy:
//! only a bounded leading portion of very long documents is ingested, keeping
//! embedding cost and latency predictable. It is configuration, not a
//! constant, because the right bound is a cost decision.

use std::time::Duration;

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Chunking policy: window size, overlap, and the ingest text cap.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub target_chars: usize,
    /// Characters shared between consecutive chunks so context is not lost at
    /// window boundaries.
    pub overlap_chars: usize,
    /// Leading-prefix cap applied to extracted text before chunking.
    pub max_document_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: 1200,
            overlap_chars: 200,
            max_document_chars: 48_000,
        }
    }
}

impl ChunkingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_chars: env_usize("PAPERCHAT_CHUNK_TARGET_CHARS", defaults.target_chars),
            overlap_chars: env_usize("PAPERCHAT_CHUNK_OVERLAP_CHARS", defaults.overlap_chars),
            max_document_chars: env_usize(
                "PAPERCHAT_MAX_DOCUMENT_CHARS",
                defaults.max_document_chars,
            ),
        }
    }
}

/// Embedding batch and retry policy.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Inputs per provider request, bounded by provider batch limits.
    pub batch_size: usize,
    /// Attempts per batch before the whole document fails.
    pub max_attempts: usize,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Timeout applied to each provider request.
    pub request_timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            max_attempts: 3,
            backoff_base: Duration::from_millis(200),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl EmbeddingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_usize("PAPERCHAT_EMBED_BATCH_SIZE", defaults.batch_size),
            max_attempts: env_usize("PAPERCHAT_EMBED_MAX_ATTEMPTS", defaults.max_attempts),
            backoff_base: env_duration_ms("PAPERCHAT_EMBED_BACKOFF_MS", defaults.backoff_base),
            request_timeout: env_duration_ms(
                "PAPERCHAT_EMBED_TIMEOUT_MS",
                defaults.request_timeout,
            ),
        }
    }
}

/// Ingestion step timeouts plus the chunking and embedding policies.
///
/// Step timeouts stay shorter than [`SessionConfig::stuck_threshold`] so a
/// document is marked failed before the status tracker would report it
/// stalled.
#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub timeouts: IngestTimeouts,
}

/// Per-step timeouts for ingestion collaborator calls.
#[derive(Debug, Clone)]
pub struct IngestTimeouts {
    pub fetch: Duration,
    pub extract: Duration,
}

impl Default for IngestTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(30),
            extract: Duration::from_secs(30),
        }
    }
}

impl IngestConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            chunking: ChunkingConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            timeouts: IngestTimeouts {
                fetch: env_duration_ms("PAPERCHAT_FETCH_TIMEOUT_MS", Duration::from_secs(30)),
                extract: env_duration_ms("PAPERCHAT_EXTRACT_TIMEOUT_MS", Duration::from_secs(30)),
            },
        }
    }
}

/// Retrieval bounds used by the engine and the chat orchestrator.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Default number of chunks returned per query.
    pub top_k: usize,
    /// Bound on the query-embedding call; expiry degrades the chat turn to an
    /// empty context instead of failing it.
    pub timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            timeout: Duration::from_secs(5),
        }
    }
}

impl RetrievalConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            top_k: env_usize("PAPERCHAT_RETRIEVAL_TOP_K", defaults.top_k),
            timeout: env_duration_ms("PAPERCHAT_RETRIEVAL_TIMEOUT_MS", defaults.timeout),
        }
    }
}

/// Chat turn policy: prompt bounds, streaming timeouts, and fallback text.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Recent conversation messages included in the prompt.
    pub history_limit: usize,
    /// Bound on retrieving context before the turn proceeds without it.
    pub retrieval_timeout: Duration,
    /// Bound on waiting for the next streamed token.
    pub token_timeout: Duration,
    /// System instructions prepended to every prompt.
    pub system_prompt: String,
    /// Sentence appended to a turn that failed mid-stream.
    pub apology: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 12,
            retrieval_timeout: Duration::from_secs(5),
            token_timeout: Duration::from_secs(30),
            system_prompt: "You are a research assistant. Answer using the provided context \
                            passages when they are relevant, and say so when they are not."
                .to_string(),
            apology: "Sorry, something went wrong while generating this answer. Please try again."
                .to_string(),
        }
    }
}

impl ChatConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            history_limit: env_usize("PAPERCHAT_HISTORY_LIMIT", defaults.history_limit),
            retrieval_timeout: env_duration_ms(
                "PAPERCHAT_CHAT_RETRIEVAL_TIMEOUT_MS",
                defaults.retrieval_timeout,
            ),
            token_timeout: env_duration_ms("PAPERCHAT_TOKEN_TIMEOUT_MS", defaults.token_timeout),
            system_prompt: std::env::var("PAPERCHAT_SYSTEM_PROMPT")
                .unwrap_or(defaults.system_prompt),
            apology: defaults.apology,
        }
    }
}

/// Session lifecycle policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity window after which a session is evicted.
    pub idle_timeout: Duration,
    /// How often the eviction sweeper wakes up.
    pub sweep_interval: Duration,
    /// Processing time after which the status tracker reports a document as
    /// stalled. Kept longer than every ingestion step timeout.
    pub stuck_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            stuck_threshold: Duration::from_secs(120),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            idle_timeout: env_duration_ms("PAPERCHAT_IDLE_TIMEOUT_MS", defaults.idle_timeout),
            sweep_interval: env_duration_ms("PAPERCHAT_SWEEP_INTERVAL_MS", defaults.sweep_interval),
            stuck_threshold: env_duration_ms(
                "PAPERCHAT_STUCK_THRESHOLD_MS",
                defaults.stuck_threshold,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_overlap_below_target() {
        let cfg = ChunkingConfig::default();
        assert!(cfg.overlap_chars < cfg.target_chars);
    }

    #[test]
    fn step_timeouts_stay_below_stuck_threshold() {
        let ingest = IngestConfig::default();
        let session = SessionConfig::default();
        assert!(ingest.timeouts.fetch < session.stuck_threshold);
        assert!(ingest.timeouts.extract < session.stuck_threshold);
        assert!(ingest.embedding.request_timeout < session.stuck_threshold);
    }
}
