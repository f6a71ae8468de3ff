//! The chat turn state machine.
//!
//! Each turn moves `Idle → AwaitingContext → Streaming → Done` (or
//! `→ Failed`). Context retrieval is bounded by a timeout and degrades to an
//! empty context instead of failing the turn; completion failures finalize
//! the partial message with an apology sentence and leave the session usable
//! for the next turn. Tokens are forwarded to the caller as they arrive over
//! a channel; a dropped receiver stops forwarding and drops the provider
//! stream with it.

use std::sync::Arc;

use futures_util::StreamExt;
use miette::Diagnostic;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::instrument;

use crate::config::ChatConfig;
use crate::message::ChatMessage;
use crate::providers::CompletionProvider;
use crate::registry::{RegistryError, SessionRegistry};
use crate::retrieval::{RetrievalEngine, RetrievedChunk};
use crate::types::SessionId;

use super::fragment::ChatFragment;
use super::payload::{PushOutput, SidePayloadParser};
use super::prompt::build_prompt;

/// Hard failures starting or joining a chat turn.
///
/// Completion and retrieval problems never appear here; they are degraded
/// inside the turn per the error-propagation policy.
#[derive(Debug, Error, Diagnostic)]
pub enum ChatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error("chat turn task failed: {0}")]
    #[diagnostic(code(paperchat::chat::join))]
    Join(#[from] tokio::task::JoinError),
}

/// Phases of one chat turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingContext,
    Streaming,
    Done,
    Failed,
}

/// Final result of a chat turn.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The finalized assistant message as recorded in the session.
    pub message: ChatMessage,
    /// Document tags extracted from the side-payload, in arrival order.
    pub related: Vec<String>,
    /// Terminal phase: `Done` or `Failed`.
    pub phase: TurnPhase,
}

/// Handle to an in-flight chat turn.
///
/// Fragments stream on the channel while the turn runs; `join` waits for
/// finalization. Dropping every taken receiver counts as a caller
/// disconnect: forwarding stops and the provider stream is dropped with it.
#[derive(Debug)]
pub struct ChatTurn {
    fragments: Option<flume::Receiver<ChatFragment>>,
    handle: JoinHandle<TurnOutcome>,
}

impl ChatTurn {
    /// Takes the turn's fragment stream.
    ///
    /// Returns `None` on every call after the first; once taken, the caller
    /// owns the receiver and dropping it signals a disconnect.
    pub fn fragments(&mut self) -> Option<flume::Receiver<ChatFragment>> {
        self.fragments.take()
    }

    /// Waits for the turn to finalize.
    pub async fn join(self) -> Result<TurnOutcome, ChatError> {
        Ok(self.handle.await?)
    }
}

/// Builds grounded prompts and streams completions for chat turns.
#[derive(Clone)]
pub struct ChatOrchestrator {
    registry: Arc<SessionRegistry>,
    retrieval: Arc<RetrievalEngine>,
    completions: Arc<dyn CompletionProvider>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        retrieval: Arc<RetrievalEngine>,
        completions: Arc<dyn CompletionProvider>,
        config: ChatConfig,
    ) -> Self {
        Self {
            registry,
            retrieval,
            completions,
            config,
        }
    }

    /// Starts a chat turn for `session_id` and returns its streaming handle.
    ///
    /// The user message is appended to the session before the turn starts;
    /// `NotFound`/`Gone` are the only errors surfaced here. Must be called
    /// from within a tokio runtime.
    #[instrument(skip(self, text), fields(session = %session_id), err)]
    pub fn send_message(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<ChatTurn, ChatError> {
        self.registry
            .append_message(session_id, ChatMessage::user(text))?;

        let (tx, rx) = flume::unbounded();
        let handle = tokio::spawn(self.clone().run_turn(
            session_id.clone(),
            text.to_string(),
            tx,
        ));
        Ok(ChatTurn {
            fragments: Some(rx),
            handle,
        })
    }

    async fn run_turn(
        self,
        session_id: SessionId,
        query: String,
        tx: flume::Sender<ChatFragment>,
    ) -> TurnOutcome {
        tracing::debug!(session = %session_id, phase = ?TurnPhase::AwaitingContext, "chat turn started");
        let context = self.gather_context(&session_id, &query).await;

        let history = self
            .registry
            .message_tail(&session_id, self.config.history_limit)
            .unwrap_or_default();
        let prompt = build_prompt(&self.config, &context, &history);

        tracing::debug!(
            session = %session_id,
            phase = ?TurnPhase::Streaming,
            context_chunks = context.len(),
            "invoking completion provider"
        );

        let mut visible = String::new();
        let mut related: Vec<String> = Vec::new();
        let mut parser = SidePayloadParser::new();
        let mut failed = false;

        match self.completions.stream_chat(&prompt).await {
            Ok(mut stream) => loop {
                match timeout(self.config.token_timeout, stream.next()).await {
                    Err(_) => {
                        tracing::warn!(session = %session_id, "completion stream timed out");
                        failed = true;
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(err))) => {
                        tracing::warn!(session = %session_id, error = %err, "completion stream failed");
                        failed = true;
                        break;
                    }
                    Ok(Some(Ok(token))) => {
                        let out = parser.push(&token);
                        if !self.forward(&tx, out, &mut visible, &mut related) {
                            tracing::debug!(
                                session = %session_id,
                                "caller disconnected; halting token forwarding"
                            );
                            break;
                        }
                    }
                }
            },
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "completion request failed");
                failed = true;
            }
        }

        if failed {
            let suffix = if visible.is_empty() {
                self.config.apology.clone()
            } else {
                format!(" {}", self.config.apology)
            };
            visible.push_str(&suffix);
            let _ = tx.send(ChatFragment::token(suffix));
        } else {
            let rest = parser.finish();
            if !rest.is_empty() {
                visible.push_str(&rest);
                let _ = tx.send(ChatFragment::token(rest));
            }
        }

        // Finalize: the message is recorded once and never mutates again.
        let assistant = ChatMessage::assistant(&visible);
        if let Err(err) = self.registry.append_message(&session_id, assistant.clone()) {
            tracing::warn!(
                session = %session_id,
                error = %err,
                "session vanished before the turn could be recorded"
            );
        }
        let _ = tx.send(ChatFragment::done());

        let phase = if failed { TurnPhase::Failed } else { TurnPhase::Done };
        tracing::debug!(
            session = %session_id,
            ?phase,
            answer_chars = assistant.content.len(),
            related = related.len(),
            "chat turn finalized"
        );
        TurnOutcome {
            message: assistant,
            related,
            phase,
        }
    }

    /// Bounded context retrieval; any failure degrades to an empty context.
    async fn gather_context(&self, session_id: &SessionId, query: &str) -> Vec<RetrievedChunk> {
        let k = self.retrieval.default_top_k();
        match timeout(
            self.config.retrieval_timeout,
            self.retrieval.retrieve(session_id, query, k),
        )
        .await
        {
            Ok(Ok(hits)) => hits,
            Ok(Err(err)) => {
                tracing::warn!(
                    session = %session_id,
                    error = %err,
                    "retrieval failed; answering without context"
                );
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    session = %session_id,
                    "retrieval timed out; answering without context"
                );
                Vec::new()
            }
        }
    }

    /// Forwards parsed output to the caller; returns `false` on disconnect.
    fn forward(
        &self,
        tx: &flume::Sender<ChatFragment>,
        out: PushOutput,
        visible: &mut String,
        related: &mut Vec<String>,
    ) -> bool {
        if !out.text.is_empty() {
            visible.push_str(&out.text);
            if tx.send(ChatFragment::token(out.text)).is_err() {
                return false;
            }
        }
        for payload in out.payloads {
            match serde_json::from_str::<Vec<String>>(payload.trim()) {
                Ok(ids) => {
                    related.extend(ids.iter().cloned());
                    if tx.send(ChatFragment::related(ids)).is_err() {
                        return false;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "discarding malformed related-documents payload");
                }
            }
        }
        true
    }
}
