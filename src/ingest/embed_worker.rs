//! Batch embedding with bounded retry.
//!
//! Requests go out in fixed-size batches to respect provider batch limits.
//! A failing batch is retried with exponential backoff and jitter a bounded
//! number of times; exhausting the attempts fails the whole document rather
//! than leaving it silently half-indexed.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::instrument;

use crate::config::EmbeddingConfig;
use crate::providers::{EmbedError, EmbeddingProvider};

/// Drives batched embedding requests against a provider.
#[derive(Clone)]
pub struct EmbedWorker {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
}

impl EmbedWorker {
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        Self { provider, config }
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Embeds every text, in order, one vector per text.
    #[instrument(skip_all, fields(texts = texts.len()), err)]
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let batch_size = self.config.batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(self.embed_batch_with_retry(batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_batch_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = timeout(
                self.config.request_timeout,
                self.provider.embed_batch(batch),
            )
            .await;

            let err = match outcome {
                Ok(Ok(vectors)) => {
                    if vectors.len() == batch.len() {
                        return Ok(vectors);
                    }
                    // A malformed batch response will not improve on retry.
                    return Err(EmbedError::ShapeMismatch {
                        expected: batch.len(),
                        actual: vectors.len(),
                    });
                }
                Ok(Err(err)) => err,
                Err(_) => EmbedError::Request {
                    message: "embedding request timed out".to_string(),
                },
            };

            if attempt >= max_attempts {
                tracing::warn!(attempt, error = %err, "embedding retries exhausted");
                return Err(err);
            }
            let delay = backoff_delay(self.config.backoff_base, attempt);
            tracing::warn!(
                attempt,
                error = %err,
                backoff_ms = delay.as_millis() as u64,
                "embedding batch failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Exponential backoff with jitter: `base * 2^(attempt-1) + rand(0..base/2)`.
fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let exponent = (attempt.saturating_sub(1)).min(8) as u32;
    let scaled = base.saturating_mul(2u32.saturating_pow(exponent));
    let jitter_ceiling = (base.as_millis() as u64 / 2).max(1);
    let jitter = rand::rng().random_range(0..jitter_ceiling);
    scaled + Duration::from_millis(jitter)
}
