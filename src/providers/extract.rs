//! Text extraction contract: document bytes to plain text.
//!
//! Extraction itself (PDF parsing, OCR) lives outside this crate; the
//! pipeline only needs a signal of success or failure. Corrupt input,
//! unsupported encodings, and extractor timeouts all surface as
//! [`ExtractError`] and mark the document failed without touching the rest of
//! the session.

use async_trait::async_trait;
use serde::Deserialize;

/// Errors surfaced by a text extractor.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The bytes could not be decoded into text.
    #[error("document could not be extracted: {message}")]
    Malformed { message: String },

    /// A remote extraction service failed.
    #[error("extraction request failed: {message}")]
    Request { message: String },
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::Request {
            message: err.to_string(),
        }
    }
}

/// Turns raw document bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Pass-through extractor for already-plain-text payloads.
///
/// Invalid UTF-8 is treated the same way a corrupt PDF would be: extraction
/// fails and the document is marked failed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8Extractor;

#[async_trait]
impl TextExtractor for Utf8Extractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|err| ExtractError::Malformed {
                message: err.to_string(),
            })
    }
}

#[derive(Deserialize)]
struct ExtractResponse {
    text: String,
}

/// HTTP client for a remote extraction service.
///
/// Posts the raw bytes to `{base_url}/extract` and expects `{"text": ...}`
/// back. Non-success statuses are reported as [`ExtractError::Malformed`]
/// because they most often indicate unparseable input rather than transport
/// trouble.
#[derive(Clone, Debug)]
pub struct HttpTextExtractor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTextExtractor {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let url = format!("{}/extract", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractError::Malformed {
                message: format!("status {status}: {message}"),
            });
        }
        let body: ExtractResponse = response.json().await?;
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn utf8_extractor_passes_text_through() {
        let text = Utf8Extractor.extract(b"plain text body").await.unwrap();
        assert_eq!(text, "plain text body");
    }

    #[tokio::test]
    async fn utf8_extractor_rejects_invalid_bytes() {
        let err = Utf8Extractor.extract(&[0xff, 0xfe, 0x00]).await.unwrap_err();
        assert!(matches!(err, ExtractError::Malformed { .. }));
    }
}
