//! SSE (Server-Sent Events) line classification
//!
//! The upstream AI gateway streams chat-completion chunks as
//! `text/event-stream`: `data: <json>` lines carrying payloads, `: `-prefixed
//! heartbeat comments, blank separators, and a literal `data: [DONE]` marking
//! the logical end of content (distinct from the transport closing).
//!
//! Classification is per line and stateless; cross-line reassembly lives in
//! [`crate::framing`] and [`crate::delta`].

/// The SSE `data:` field prefix, including the separating space.
const DATA_PREFIX: &str = "data: ";

/// Literal payload that signals end of content.
const DONE_MARKER: &str = "[DONE]";

/// One framed line, classified per the SSE text convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Blank line or `:` comment/heartbeat; carries nothing.
    Ignore,
    /// `data: [DONE]` - logical end of stream content.
    Terminator,
    /// `data: <payload>` with the prefix stripped and whitespace trimmed.
    Data(String),
    /// Any other non-empty line; dropped silently, not an error.
    Unrecognized,
}

/// Classify a single framed line.
pub fn decode_line(line: &str) -> SseLine {
    if line.starts_with(':') || line.trim().is_empty() {
        return SseLine::Ignore;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Unrecognized;
    };
    let payload = payload.trim();
    if payload == DONE_MARKER {
        return SseLine::Terminator;
    }
    SseLine::Data(payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", SseLine::Ignore)]
    #[case("   ", SseLine::Ignore)]
    #[case(": keep-alive", SseLine::Ignore)]
    #[case(":", SseLine::Ignore)]
    #[case("data: [DONE]", SseLine::Terminator)]
    #[case("data:  [DONE] ", SseLine::Terminator)]
    #[case("event: message", SseLine::Unrecognized)]
    #[case("id: 42", SseLine::Unrecognized)]
    #[case("data:{\"no_space\":true}", SseLine::Unrecognized)]
    fn test_classification(#[case] line: &str, #[case] expected: SseLine) {
        assert_eq!(decode_line(line), expected);
    }

    #[test]
    fn test_data_payload_extracted_and_trimmed() {
        assert_eq!(
            decode_line("data: {\"choices\":[]} "),
            SseLine::Data("{\"choices\":[]}".to_string())
        );
    }

    #[test]
    fn test_done_embedded_in_json_is_not_a_terminator() {
        let line = "data: {\"content\":\"[DONE]\"}";
        assert!(matches!(decode_line(line), SseLine::Data(_)));
    }

    #[test]
    fn test_decoding_is_independent_per_line() {
        // Same line always classifies the same way; no hidden state
        assert_eq!(decode_line("data: a"), SseLine::Data("a".into()));
        assert_eq!(decode_line("data: [DONE]"), SseLine::Terminator);
        assert_eq!(decode_line("data: a"), SseLine::Data("a".into()));
    }
}
