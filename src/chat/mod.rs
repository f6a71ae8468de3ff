//! Streaming chat orchestration: prompts, token relay, and side-payloads.

mod fragment;
mod orchestrator;
mod payload;
mod prompt;

pub use fragment::ChatFragment;
pub use orchestrator::{ChatError, ChatOrchestrator, ChatTurn, TurnOutcome, TurnPhase};
pub use payload::{PushOutput, RELATED_CLOSE, RELATED_OPEN, SidePayloadParser};
