//! Stream frame demultiplexer.
//!
//! Splits an accumulated text buffer into complete frames. A frame ends at
//! a blank line (`"\n\n"`); whatever follows the last blank line is an
//! incomplete frame and is handed back as the remainder, to be prefixed to
//! the next chunk. Parsing is the same no matter how the input was chunked.

use super::frame::{FrameKind, StreamFrame};
use tracing::debug;

const FRAME_SEPARATOR: &str = "\n\n";
const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// Frames parsed from a buffer plus the unconsumed tail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Demultiplexed {
    /// Complete frames in arrival order.
    pub frames: Vec<StreamFrame>,
    /// Text after the last frame separator.
    pub remainder: String,
}

/// Splits `buffer` into complete frames and a remainder.
///
/// Frames without both an `event:` and a `data:` line, with an unknown
/// kind, or whose payload is not valid JSON are dropped. Never fails.
#[must_use]
pub fn demultiplex(buffer: &str) -> Demultiplexed {
    let mut pieces: Vec<&str> = buffer.split(FRAME_SEPARATOR).collect();
    let remainder = pieces.pop().unwrap_or_default().to_string();

    let frames = pieces
        .into_iter()
        .filter(|chunk| !chunk.trim().is_empty())
        .filter_map(parse_frame)
        .collect();

    Demultiplexed { frames, remainder }
}

fn parse_frame(chunk: &str) -> Option<StreamFrame> {
    let mut event = None;
    let mut data = None;

    for line in chunk.lines() {
        if let Some(name) = line.strip_prefix(EVENT_PREFIX) {
            event = Some(name.trim());
        } else if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            data = Some(payload.trim());
        }
    }

    let (Some(event), Some(data)) = (event, data) else {
        return None;
    };

    let Some(kind) = FrameKind::parse(event) else {
        debug!(event, "Dropping frame with unknown kind");
        return None;
    };

    match serde_json::from_str(data) {
        Ok(payload) => Some(StreamFrame::new(kind, payload)),
        Err(err) => {
            debug!(event, error = %err, "Dropping frame with malformed payload");
            None
        }
    }
}

/// Incremental decoder fed with raw byte chunks.
///
/// Carries both the incomplete-frame remainder and any partial UTF-8
/// sequence split across chunk boundaries.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: String,
    carry: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a byte chunk and returns the frames it completed.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.decode_utf8(chunk);
        self.drain()
    }

    /// Feeds a text chunk and returns the frames it completed.
    pub fn push_str(&mut self, chunk: &str) -> Vec<StreamFrame> {
        self.pending.push_str(chunk);
        self.drain()
    }

    /// Returns the buffered text of the incomplete frame.
    #[must_use]
    pub fn remainder(&self) -> &str {
        &self.pending
    }

    fn drain(&mut self) -> Vec<StreamFrame> {
        let Demultiplexed { frames, remainder } = demultiplex(&self.pending);
        self.pending = remainder;
        frames
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.pending.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    self.pending.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const STREAM: &str = "event: progress\ndata: {\"percent\":10,\"message\":\"Researching\"}\n\n\
event: token\ndata: {\"length\":140,\"percent\":20}\n\n\
event: complete\ndata: {\"success\":true,\"article\":\"Hé ✓\"}\n\n";

    #[test]
    fn test_single_buffer() {
        let out = demultiplex(STREAM);
        assert_eq!(out.frames.len(), 3);
        assert_eq!(out.frames[0].kind, FrameKind::Progress);
        assert_eq!(out.frames[1].payload, json!({"length": 140, "percent": 20}));
        assert_eq!(out.frames[2].kind, FrameKind::Complete);
        assert_eq!(out.remainder, "");
    }

    #[test]
    fn test_incomplete_tail_is_remainder() {
        let out = demultiplex("event: token\ndata: {\"length\":1}\n\nevent: tok");
        assert_eq!(out.frames.len(), 1);
        assert_eq!(out.remainder, "event: tok");
    }

    #[test]
    fn test_prefix_without_space() {
        let out = demultiplex("event:error\ndata:{\"error\":\"boom\"}\n\n");
        assert_eq!(out.frames.len(), 1);
        assert_eq!(out.frames[0].error_message(), Some("boom"));
    }

    #[test]
    fn test_drops_malformed_frames() {
        let buffer = "data: {\"length\":1}\n\n\
event: token\n\n\
event: token\ndata: {not json\n\n\
event: heartbeat\ndata: {}\n\n\
\n\n\
event: token\ndata: {\"length\":2}\n\n";
        let out = demultiplex(buffer);
        assert_eq!(out.frames.len(), 1);
        assert_eq!(out.frames[0].length(), Some(2));
    }

    #[test]
    fn test_chunking_invariance() {
        let whole = demultiplex(STREAM).frames;
        let bytes = STREAM.as_bytes();

        for size in [1, 2, 3, 5, 7, 13, 64] {
            let mut decoder = FrameDecoder::new();
            let mut frames = Vec::new();
            for chunk in bytes.chunks(size) {
                frames.extend(decoder.push_bytes(chunk));
            }
            assert_eq!(frames, whole, "chunk size {size}");
            assert_eq!(decoder.remainder(), "");
        }
    }

    #[test]
    fn test_separator_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_str("event: token\ndata: {\"length\":3}\n").is_empty());
        let frames = decoder.push_str("\nevent: progress");
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.remainder(), "event: progress");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"event: token\ndata: \xff");
        assert!(decoder.remainder().ends_with(char::REPLACEMENT_CHARACTER));
    }
}
