//! Incremental chat-completion delta accumulation
//!
//! Each SSE data payload is a JSON `chat.completion.chunk`; only
//! `choices[0].delta.content` is consumed and everything else is ignored.
//! Upstream proxies are allowed to re-chunk the stream, so a payload can be
//! truncated mid-object even after clean line framing: a syntactically
//! malformed payload is therefore reported as [`Accumulation::NeedMoreInput`]
//! rather than an error, and the session re-queues the raw line until more
//! bytes complete it.

use tracing::debug;

/// JSON pointer to the incremental text fragment inside a chunk.
const CONTENT_POINTER: &str = "/choices/0/delta/content";

/// Outcome of feeding one data payload to the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accumulation {
    /// A non-empty fragment was appended; the buffer grew.
    Updated,
    /// Valid JSON with no content fragment; nothing changed.
    Unchanged,
    /// The payload is not complete JSON yet; re-queue it and wait for bytes.
    NeedMoreInput,
}

/// Builds the assistant message text out of incremental content fragments.
///
/// The buffer only ever grows: every published value is a prefix-extension
/// of the previous one.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    text: String,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self {
            text: String::new(),
        }
    }

    /// Feed one data payload, appending its content fragment if present.
    ///
    /// The payload is syntax-checked as a whole JSON document first; shape
    /// mismatches (missing `choices`, no `delta.content`) are tolerated and
    /// simply produce no update.
    pub fn push(&mut self, payload: &str) -> Accumulation {
        let value: serde_json::Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(_) => return Accumulation::NeedMoreInput,
        };
        match value.pointer(CONTENT_POINTER).and_then(|c| c.as_str()) {
            Some(content) if !content.is_empty() => {
                self.text.push_str(content);
                Accumulation::Updated
            }
            _ => Accumulation::Unchanged,
        }
    }

    /// Feed a payload during the final flush, where no more bytes can come.
    ///
    /// A payload that never completed by end of stream is dropped here. The
    /// upstream is not supposed to truncate mid-object, so the drop is
    /// logged rather than surfaced.
    pub fn push_final(&mut self, payload: &str) -> Accumulation {
        match self.push(payload) {
            Accumulation::NeedMoreInput => {
                debug!(
                    payload_len = payload.len(),
                    "dropping unparseable trailing payload at end of stream"
                );
                Accumulation::Unchanged
            }
            outcome => outcome,
        }
    }

    /// The accumulated text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the accumulator, yielding the final text.
    pub fn into_text(self) -> String {
        self.text
    }
}
