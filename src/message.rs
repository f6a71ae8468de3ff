use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message in a conversation, containing a role and text content.
///
/// Messages are the primary record of chat interactions within a session.
/// Each message has a role (typically "user", "assistant", or "system"),
/// text content, and an append timestamp. Messages are append-only: once a
/// turn finishes, its assistant message never mutates again, and messages are
/// only removed when the whole session expires.
///
/// # Examples
///
/// ```
/// use paperchat::message::ChatMessage;
///
/// let user_msg = ChatMessage::user("What does section 3 claim?");
/// let assistant_msg = ChatMessage::assistant("Section 3 argues that...");
/// let system_msg = ChatMessage::system("Answer using the provided context.");
///
/// assert!(user_msg.has_role(ChatMessage::USER));
/// assert!(!user_msg.has_role(ChatMessage::ASSISTANT));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    /// The role of the message sender. Use the constants on [`ChatMessage`]
    /// for standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}
