//! Streaming chat-completion provider contract and implementations.
//!
//! A provider turns a prompt (ordered chat messages) into a stream of text
//! tokens. The orchestrator forwards tokens as they arrive; dropping the
//! stream is the cancellation path and must release the underlying
//! connection.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Errors surfaced by a completion provider.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The request could not be sent.
    #[error("completion request failed: {message}")]
    Request { message: String },

    /// The provider answered with a non-success status.
    #[error("completion provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// The token stream broke mid-response.
    #[error("completion stream failed: {message}")]
    Stream { message: String },

    /// No token arrived within the configured bound.
    #[error("completion stream timed out")]
    Timeout,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Request {
            message: err.to_string(),
        }
    }
}

/// Stream of text tokens produced by a completion provider.
pub type TokenStream = BoxStream<'static, Result<String, CompletionError>>;

/// Streaming chat-completion provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Starts a streamed completion for the given prompt messages.
    ///
    /// The returned stream yields tokens in order and ends after the final
    /// token. Dropping the stream cancels the underlying call.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, CompletionError>;
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamPayload {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an OpenAI-style streaming `/chat/completions` endpoint.
///
/// The server-sent `data:` lines are decoded by a pump task that feeds a
/// channel; dropping the returned stream drops the channel receiver, the pump
/// observes the closed channel, and the connection is released.
#[derive(Clone, Debug)]
pub struct HttpCompletionProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCompletionProvider {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            stream: true,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let (tx, rx) = flume::unbounded::<Result<String, CompletionError>>();
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            'pump: while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Err(CompletionError::Stream {
                            message: err.to_string(),
                        }));
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        break 'pump;
                    }
                    let token = match serde_json::from_str::<StreamPayload>(data) {
                        Ok(payload) => payload
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content),
                        Err(err) => {
                            tracing::debug!(error = %err, "skipping unparseable stream line");
                            None
                        }
                    };
                    if let Some(token) = token
                        && tx.send(Ok(token)).is_err()
                    {
                        // Receiver dropped: the caller cancelled the turn.
                        break 'pump;
                    }
                }
            }
        });

        Ok(rx.into_stream().boxed())
    }
}

/// One step of a scripted completion, for tests and demos.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Yield a token.
    Token(String),
    /// Sleep before the next step, to exercise caller-side timeouts.
    Pause(Duration),
    /// Yield a stream error.
    Fail(String),
}

impl ScriptStep {
    #[must_use]
    pub fn token(text: impl Into<String>) -> Self {
        ScriptStep::Token(text.into())
    }
}

/// Deterministic completion provider that replays a fixed script.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCompletionProvider {
    steps: Vec<ScriptStep>,
}

impl ScriptedCompletionProvider {
    #[must_use]
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    /// Convenience: a script that streams each string as one token.
    #[must_use]
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: tokens.into_iter().map(ScriptStep::token).collect(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletionProvider {
    async fn stream_chat(&self, _messages: &[ChatMessage]) -> Result<TokenStream, CompletionError> {
        let steps = self.steps.clone();
        let stream = futures_util::stream::iter(steps)
            .filter_map(|step| async move {
                match step {
                    ScriptStep::Token(text) => Some(Ok(text)),
                    ScriptStep::Pause(delay) => {
                        tokio::time::sleep(delay).await;
                        None
                    }
                    ScriptStep::Fail(message) => Some(Err(CompletionError::Stream { message })),
                }
            })
            .boxed();
        Ok(stream)
    }
}
