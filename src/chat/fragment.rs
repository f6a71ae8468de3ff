//! Wire fragments for the chat stream.
//!
//! A chat turn is delivered as newline-delimited JSON fragments so clients
//! can parse incrementally: zero or more content fragments, optionally a
//! related-documents fragment, then exactly one terminal fragment with
//! `done: true`.

use serde::{Deserialize, Serialize};

/// One fragment of a streamed chat response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatFragment {
    /// Structured side-payload naming the documents the answer leaned on.
    Related {
        related_documents: Vec<String>,
        done: bool,
    },
    /// A run of visible answer text; the terminal fragment is empty with
    /// `done: true`.
    Content { content: String, done: bool },
}

impl ChatFragment {
    /// A non-terminal content fragment.
    #[must_use]
    pub fn token(content: impl Into<String>) -> Self {
        ChatFragment::Content {
            content: content.into(),
            done: false,
        }
    }

    /// The terminal fragment closing a turn.
    #[must_use]
    pub fn done() -> Self {
        ChatFragment::Content {
            content: String::new(),
            done: true,
        }
    }

    /// A related-documents side-payload fragment.
    #[must_use]
    pub fn related(related_documents: Vec<String>) -> Self {
        ChatFragment::Related {
            related_documents,
            done: false,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            ChatFragment::Content { done, .. } | ChatFragment::Related { done, .. } => *done,
        }
    }

    /// Encodes the fragment as one newline-terminated JSON line.
    pub fn encode_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parses one line previously produced by [`encode_line`](Self::encode_line).
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_fragments_round_trip() {
        let fragment = ChatFragment::token("partial answer");
        let line = fragment.encode_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(ChatFragment::parse_line(&line).unwrap(), fragment);
    }

    #[test]
    fn terminal_fragment_is_empty_and_done() {
        let line = ChatFragment::done().encode_line().unwrap();
        let parsed = ChatFragment::parse_line(&line).unwrap();
        assert!(parsed.is_terminal());
        assert_eq!(
            parsed,
            ChatFragment::Content {
                content: String::new(),
                done: true
            }
        );
    }

    #[test]
    fn related_fragment_round_trips_distinctly() {
        let fragment = ChatFragment::related(vec!["2401.01234".to_string()]);
        let line = fragment.encode_line().unwrap();
        assert!(line.contains("related_documents"));
        let parsed = ChatFragment::parse_line(&line).unwrap();
        assert_eq!(parsed, fragment);
        assert!(!parsed.is_terminal());
    }

    #[test]
    fn wire_shape_matches_the_streaming_contract() {
        let line = ChatFragment::token("hi").encode_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["content"], "hi");
        assert_eq!(value["done"], false);
    }
}
