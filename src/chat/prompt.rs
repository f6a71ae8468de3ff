//! Grounded prompt assembly.
//!
//! A turn's prompt is: system instructions, retrieved context passages with
//! provenance labels, then a bounded tail of the conversation (which already
//! ends with the new user message).

use crate::config::ChatConfig;
use crate::message::ChatMessage;
use crate::retrieval::RetrievedChunk;

/// Builds the ordered prompt messages for one chat turn.
pub(crate) fn build_prompt(
    config: &ChatConfig,
    context: &[RetrievedChunk],
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut system = config.system_prompt.clone();
    if !context.is_empty() {
        system.push_str("\n\nContext passages:\n");
        for (position, hit) in context.iter().enumerate() {
            let label = hit.title.as_deref().unwrap_or(&hit.document.name);
            system.push_str(&format!(
                "[{}] {} (chunk {}): {}\n",
                position + 1,
                label,
                hit.chunk_index,
                hit.text
            ));
        }
    }

    let mut messages = Vec::with_capacity(1 + history.len().min(config.history_limit));
    messages.push(ChatMessage::system(&system));
    let tail_start = history.len().saturating_sub(config.history_limit);
    messages.extend_from_slice(&history[tail_start..]);
    messages
}
