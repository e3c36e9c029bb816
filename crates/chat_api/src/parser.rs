use serde_json::Value;

use crate::frames::{decode_brainstorm, decode_chat, StreamFrame, WireShape};

/// Content-marker prefix carrying a JSON payload.
pub const DATA_PREFIX: &str = "data:";
/// Record body signaling immediate completion irrespective of payload state.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental parser for newline-delimited generation record streams.
///
/// One parser instance is constructed per transport open and discarded on
/// close. The carry-over buffer holds raw bytes, so records and multi-byte
/// UTF-8 sequences split across network reads reassemble identically for
/// every chunking of the same stream.
#[derive(Debug)]
pub struct StreamFrameParser {
    shape: WireShape,
    buffer: Vec<u8>,
}

impl StreamFrameParser {
    pub fn new(shape: WireShape) -> Self {
        Self {
            shape,
            buffer: Vec::new(),
        }
    }

    /// Feed arbitrary bytes into the parser and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let record: Vec<u8> = self.buffer.drain(0..=split).collect();
            let record = String::from_utf8_lossy(&record[..split]);

            if let Some(frame) = self.decode_record(record.trim()) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Parse a complete stream payload in one shot.
    pub fn parse_frames(shape: WireShape, input: &str) -> Vec<StreamFrame> {
        let mut parser = Self::new(shape);
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    /// Decodes one complete record, already stripped of the delimiter.
    ///
    /// Returns `None` for blank records and for malformed payloads; a single
    /// bad record must never abort the stream. Lines without the content
    /// marker go through the same JSON attempt as a compatibility fallback.
    fn decode_record(&self, record: &str) -> Option<StreamFrame> {
        if record.is_empty() {
            return None;
        }

        let payload = record
            .strip_prefix(DATA_PREFIX)
            .map(str::trim_start)
            .unwrap_or(record);

        if payload == DONE_SENTINEL {
            return Some(StreamFrame::done());
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => match self.shape {
                WireShape::Chat => Some(decode_chat(&value)),
                WireShape::Brainstorm => decode_brainstorm(&value),
            },
            Err(error) => {
                tracing::debug!(%error, "skipping malformed stream record");
                None
            }
        }
    }
}
