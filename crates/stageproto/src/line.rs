//! Newline-delimited JSON framing for the TCP command channel.
//!
//! One UTF-8 JSON object per line, terminated by `\n`. The reader is a
//! plain byte accumulator so it can be exercised without sockets; the TCP
//! client feeds it from an `AsyncRead`.

use serde_json::Value;

use crate::command::{DawCommand, DawResponse};
use crate::error::FrameError;

/// Hard cap on a single frame. Anything larger is a protocol error; the
/// reader then skips to the next newline so the connection stays usable.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Encode one command as a compact JSON line.
pub fn encode_line(command: &DawCommand) -> Result<Vec<u8>, FrameError> {
    let mut buf = serde_json::to_vec(command)?;
    if buf.len() >= MAX_LINE_BYTES {
        return Err(FrameError::LineTooLong {
            limit: MAX_LINE_BYTES,
        });
    }
    buf.push(b'\n');
    Ok(buf)
}

/// Incremental line reader with a length limit.
///
/// Bytes go in via [`push_bytes`](Self::push_bytes); complete lines come
/// out of [`next_line`](Self::next_line). Trailing bytes after a newline
/// are kept for the next read. When a line overruns the limit the reader
/// discards until the terminating newline and reports the overflow once.
#[derive(Debug)]
pub struct LineReader {
    buf: Vec<u8>,
    max_len: usize,
    /// Set while skipping the remainder of an oversized line.
    overflowed: bool,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineReader {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
            overflowed: false,
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete line, without its newline.
    ///
    /// `Ok(None)` means more bytes are needed. An oversized line yields
    /// `Err(LineTooLong)` exactly once, after its newline has been seen
    /// (so the stream stays aligned).
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).take(pos).collect();
            if self.overflowed {
                self.overflowed = false;
                return Err(FrameError::LineTooLong {
                    limit: self.max_len,
                });
            }
            return Ok(Some(line));
        }
        if self.buf.len() > self.max_len {
            // Drop what we have and keep skipping until the newline.
            self.buf.clear();
            self.overflowed = true;
        }
        Ok(None)
    }

    /// Bytes currently buffered (pending an incomplete line).
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Parse one received line as a DAW response.
pub fn decode_response(line: &[u8]) -> Result<DawResponse, FrameError> {
    Ok(serde_json::from_slice(line)?)
}

/// Parse one received line as arbitrary JSON (used by test harnesses and
/// the realtime channel, which carries minimal `{type, params}` objects).
pub fn decode_value(line: &[u8]) -> Result<Value, FrameError> {
    Ok(serde_json::from_slice(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_lines_and_keeps_remainder() {
        let mut r = LineReader::new(1024);
        r.push_bytes(b"{\"status\":\"success\"}\n{\"sta");
        let first = r.next_line().unwrap().unwrap();
        assert_eq!(first, b"{\"status\":\"success\"}");
        assert!(r.next_line().unwrap().is_none());
        r.push_bytes(b"tus\":\"error\",\"message\":\"x\"}\n");
        let second = r.next_line().unwrap().unwrap();
        let resp = decode_response(&second).unwrap();
        assert_eq!(resp.err_message(), "x");
    }

    #[test]
    fn encode_decode_roundtrip() {
        let cmd = DawCommand::new("create_clip")
            .with_param("track_index", 0)
            .with_param("clip_index", 1)
            .with_param("length", 4.0);
        let line = encode_line(&cmd).unwrap();
        assert_eq!(*line.last().unwrap(), b'\n');
        let back: DawCommand = serde_json::from_slice(&line[..line.len() - 1]).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn oversized_line_errors_once_then_recovers() {
        let mut r = LineReader::new(16);
        r.push_bytes(&[b'x'; 40]);
        assert!(r.next_line().unwrap().is_none());
        r.push_bytes(b"tail\n{\"ok\":1}\n");
        match r.next_line() {
            Err(FrameError::LineTooLong { .. }) => {}
            other => panic!("expected LineTooLong, got {:?}", other),
        }
        let next = r.next_line().unwrap().unwrap();
        assert_eq!(next, b"{\"ok\":1}");
    }

    #[test]
    fn encode_rejects_oversized_command() {
        let huge = "x".repeat(MAX_LINE_BYTES);
        let cmd = DawCommand::new("add_notes_to_clip").with_param("blob", huge);
        assert!(matches!(
            encode_line(&cmd),
            Err(FrameError::LineTooLong { .. })
        ));
    }
}
