//! In-band side-payload extraction from a token stream.
//!
//! The completion model may interleave a machine-parseable payload with
//! normal prose, wrapped in a delimiter pair. Tokens arrive at arbitrary
//! boundaries, so the markers themselves can be split across fragments; the
//! parser is a small two-state machine (scanning vs. buffering a payload)
//! that holds back just enough text to never emit half a marker.

/// Opens a related-documents payload inside the token stream.
pub const RELATED_OPEN: &str = "<<related>>";
/// Closes a related-documents payload.
pub const RELATED_CLOSE: &str = "<</related>>";

/// Output of feeding one fragment to the parser.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PushOutput {
    /// Visible text, with any complete payloads stripped.
    pub text: String,
    /// Raw payload bodies whose closing marker arrived in this fragment.
    pub payloads: Vec<String>,
}

/// Streaming parser that strips delimited payloads out of visible text.
#[derive(Debug, Default)]
pub struct SidePayloadParser {
    buffer: String,
    buffering_payload: bool,
}

impl SidePayloadParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment; returns visible text and any completed payloads.
    pub fn push(&mut self, fragment: &str) -> PushOutput {
        let mut out = PushOutput::default();
        self.buffer.push_str(fragment);

        loop {
            if self.buffering_payload {
                let Some(close) = self.buffer.find(RELATED_CLOSE) else {
                    // Keep buffering until the closing marker shows up.
                    break;
                };
                out.payloads.push(self.buffer[..close].to_string());
                self.buffer.drain(..close + RELATED_CLOSE.len());
                self.buffering_payload = false;
            } else if let Some(open) = self.buffer.find(RELATED_OPEN) {
                out.text.push_str(&self.buffer[..open]);
                self.buffer.drain(..open + RELATED_OPEN.len());
                self.buffering_payload = true;
            } else {
                // Emit everything except a trailing partial open marker.
                let hold = partial_prefix_len(&self.buffer, RELATED_OPEN);
                let emit_to = self.buffer.len() - hold;
                out.text.push_str(&self.buffer[..emit_to]);
                self.buffer.drain(..emit_to);
                break;
            }
        }
        out
    }

    /// Flushes held-back text at end of stream.
    ///
    /// An unterminated payload is replayed verbatim, marker included, rather
    /// than silently swallowed.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.buffer);
        if std::mem::take(&mut self.buffering_payload) {
            format!("{RELATED_OPEN}{rest}")
        } else {
            rest
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of
/// `marker`. Markers are ASCII, so byte offsets are char boundaries.
fn partial_prefix_len(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    for len in (1..=max).rev() {
        if marker.as_bytes()[..len] == text.as_bytes()[text.len() - len..] {
            return len;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> (String, Vec<String>) {
        let mut parser = SidePayloadParser::new();
        let mut text = String::new();
        let mut payloads = Vec::new();
        for fragment in fragments {
            let out = parser.push(fragment);
            text.push_str(&out.text);
            payloads.extend(out.payloads);
        }
        text.push_str(&parser.finish());
        (text, payloads)
    }

    #[test]
    fn plain_text_passes_through() {
        let (text, payloads) = run(&["hello ", "world"]);
        assert_eq!(text, "hello world");
        assert!(payloads.is_empty());
    }

    #[test]
    fn complete_payload_in_one_fragment_is_stripped() {
        let (text, payloads) = run(&[r#"before <<related>>["a","b"]<</related>> after"#]);
        assert_eq!(text, "before  after");
        assert_eq!(payloads, vec![r#"["a","b"]"#.to_string()]);
    }

    #[test]
    fn payload_split_across_fragments_is_reassembled() {
        let (text, payloads) = run(&[
            "answer <<rel",
            "ated>>[\"2401.0",
            "1234\"]<</rel",
            "ated>> tail",
        ]);
        assert_eq!(text, "answer  tail");
        assert_eq!(payloads, vec![r#"["2401.01234"]"#.to_string()]);
    }

    #[test]
    fn single_character_fragments_still_parse() {
        let full = r#"x<<related>>["id"]<</related>>y"#;
        let fragments: Vec<String> = full.chars().map(|c| c.to_string()).collect();
        let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
        let (text, payloads) = run(&refs);
        assert_eq!(text, "xy");
        assert_eq!(payloads, vec![r#"["id"]"#.to_string()]);
    }

    #[test]
    fn angle_brackets_in_prose_are_not_swallowed() {
        let (text, payloads) = run(&["a < b, and x <", "< y, done"]);
        assert_eq!(text, "a < b, and x << y, done");
        assert!(payloads.is_empty());
    }

    #[test]
    fn unterminated_payload_is_replayed_verbatim() {
        let (text, payloads) = run(&["prose <<related>>[\"lost\""]);
        assert_eq!(text, "prose <<related>>[\"lost\"");
        assert!(payloads.is_empty());
    }

    #[test]
    fn multiple_payloads_in_one_stream() {
        let (text, payloads) = run(&[
            "a<<related>>[1]<</related>>b<<related>>[2]<</related>>c",
        ]);
        assert_eq!(text, "abc");
        assert_eq!(payloads, vec!["[1]".to_string(), "[2]".to_string()]);
    }

    #[test]
    fn partial_prefix_detection() {
        assert_eq!(partial_prefix_len("text <", RELATED_OPEN), 1);
        assert_eq!(partial_prefix_len("text <<rel", RELATED_OPEN), 5);
        assert_eq!(partial_prefix_len("text", RELATED_OPEN), 0);
        // A full marker is not a *partial* prefix.
        assert_eq!(partial_prefix_len(RELATED_OPEN, RELATED_OPEN), 0);
    }
}
