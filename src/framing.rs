//! Incremental line framing for streamed response bodies
//!
//! Network chunk boundaries carry no meaning: a single SSE line can arrive
//! split across several reads, and a single read can carry several lines.
//! `LineFramer` hides the chunking by buffering raw bytes and only handing
//! out complete `\n`-terminated lines. The pending fragment is kept as bytes
//! rather than a `String` so that a chunk boundary falling inside a
//! multibyte UTF-8 sequence cannot corrupt the decoded text.

use bytes::{BufMut, BytesMut};

/// Buffers incoming byte chunks and yields complete lines.
///
/// Lines are terminated by `\n`; one trailing `\r` is stripped so CRLF
/// streams frame identically. Whatever follows the last newline stays
/// buffered until more bytes arrive or [`LineFramer::flush`] is called.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::new(),
        }
    }

    /// Append a raw chunk to the pending buffer.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Extract the next complete line, without its terminator.
    ///
    /// Returns `None` when the buffer holds no complete line; the partial
    /// fragment (if any) remains buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line = self.pending.split_to(pos + 1);
        line.truncate(line.len() - 1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Drain the trailing fragment at end of stream.
    ///
    /// A final line with no trailing newline is still a line. Returns `None`
    /// when nothing is buffered. After this call the buffer is empty.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let mut line = self.pending.split();
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Re-queue a line in front of the pending fragment.
    ///
    /// Used when a consumer decides an extracted line was not actually
    /// complete (a JSON payload truncated mid-object): the line goes back as
    /// `line + "\n" + pending`, turning "bad line" into "not yet a line".
    /// Callers must stop pulling lines after this until more bytes arrive,
    /// otherwise the same line comes straight back out.
    pub fn push_back(&mut self, line: &str) {
        let mut restored = BytesMut::with_capacity(line.len() + 1 + self.pending.len());
        restored.extend_from_slice(line.as_bytes());
        restored.put_u8(b'\n');
        restored.extend_from_slice(&self.pending);
        self.pending = restored;
    }

    /// Whether any bytes are still buffered.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
