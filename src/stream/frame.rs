//! Wire framing for event streams.
//!
//! Every message is a single `data:` line holding a JSON array, terminated by
//! a blank line:
//!
//! ```text
//! data: [true]\n\n
//! ```

use serde::Serialize;
use serde_json::Value;

use super::StreamError;

pub const DATA_PREFIX: &str = "data:";
pub const FRAME_DELIMITER: &[u8] = b"\n\n";

/// One encoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage(String);

impl StreamMessage {
    /// Encode an argument list. The payload must serialize to a JSON array so
    /// the consumer can always spread it into handler arguments.
    pub fn encode<T: Serialize + ?Sized>(args: &T) -> Result<Self, StreamError> {
        let value = serde_json::to_value(args)?;
        if !value.is_array() {
            return Err(StreamError::Serialization(format!(
                "payload must be a JSON array, got {value}"
            )));
        }
        Ok(Self(format!("{DATA_PREFIX} {value}\n\n")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

/// Largest frame the decoder buffers before giving up on the stream.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Splits an incoming byte stream into frame payloads.
///
/// Bytes are buffered until a blank-line delimiter arrives, so frames may be
/// split across (or packed into) arbitrary network chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no delimiter.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete frame's data, skipping frames that carry none
    /// (comments, keep-alives). Returns `Ok(None)` until a full frame is
    /// buffered.
    ///
    /// Fails with [`StreamError::Decode`] on a frame that is not UTF-8 or
    /// that grows past [`MAX_FRAME_BYTES`]. The decoder should not be used
    /// after an error.
    pub fn next_frame(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            let Some(end) = self.find_delimiter() else {
                if self.buffer.len() > MAX_FRAME_BYTES {
                    return Err(StreamError::Decode(format!(
                        "frame exceeds {MAX_FRAME_BYTES} bytes"
                    )));
                }
                return Ok(None);
            };
            if end > MAX_FRAME_BYTES {
                return Err(StreamError::Decode(format!(
                    "frame of {end} bytes exceeds {MAX_FRAME_BYTES} bytes"
                )));
            }

            let mut frame: Vec<u8> = self.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
            self.scanned = 0;
            frame.truncate(end);
            let text = String::from_utf8(frame)
                .map_err(|e| StreamError::Decode(format!("frame is not valid UTF-8: {e}")))?;
            if let Some(data) = frame_data(&text) {
                return Ok(Some(data));
            }
            tracing::trace!("skipping event-stream frame without data: {text:?}");
        }
    }

    /// Bytes received that do not yet form a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn find_delimiter(&mut self) -> Option<usize> {
        let start = self.scanned;
        match self.buffer[start..]
            .windows(FRAME_DELIMITER.len())
            .position(|window| window == FRAME_DELIMITER)
        {
            Some(offset) => Some(start + offset),
            None => {
                // Keep the tail byte: it may be the first half of a delimiter.
                self.scanned = self.buffer.len().saturating_sub(FRAME_DELIMITER.len() - 1);
                None
            }
        }
    }
}

fn frame_data(frame: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        let Some(value) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }
    data
}

/// Parse a decoded frame into the argument list it carries.
pub fn parse_args(data: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Array(args)) => Ok(args),
        Ok(other) => Err(format!("expected a JSON array, got {other}")),
        Err(e) => Err(format!("invalid JSON {data:?}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_wraps_array_in_data_frame() {
        let message = StreamMessage::encode(&json!([true, "x", 3])).unwrap();
        assert_eq!(message.as_str(), "data: [true,\"x\",3]\n\n");
    }

    #[test]
    fn test_encode_empty_args() {
        let message = StreamMessage::encode(&Vec::<Value>::new()).unwrap();
        assert_eq!(message.as_str(), "data: []\n\n");
    }

    #[test]
    fn test_encode_tuple_is_array() {
        let message = StreamMessage::encode(&([false],)).unwrap();
        assert_eq!(message.as_str(), "data: [[false]]\n\n");
    }

    #[test]
    fn test_encode_rejects_non_array() {
        let err = StreamMessage::encode(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, StreamError::Serialization(_)));
    }

    #[test]
    fn test_encode_rejects_unserializable() {
        let mut map = HashMap::new();
        map.insert((1, 2), 3);
        let err = StreamMessage::encode(&(map,)).unwrap_err();
        assert!(matches!(err, StreamError::Serialization(_)));
    }

    #[test]
    fn test_round_trip_preserves_args() {
        let cases = [
            json!([]),
            json!([1, "two", {"three": [3.5, null]}]),
            json!([["nested"], false, "data: inside\nstring"]),
        ];
        for args in cases {
            let message = StreamMessage::encode(&args).unwrap();
            let mut decoder = FrameDecoder::new();
            decoder.push(message.as_str().as_bytes());
            let data = decoder.next_frame().unwrap().unwrap();
            assert_eq!(Value::Array(parse_args(&data).unwrap()), args);
            assert_eq!(decoder.pending(), 0);
        }
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: [1,");
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.push(b"2]\n");
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.push(b"\ndata: [3]\n\n");
        assert_eq!(decoder.next_frame(), Ok(Some("[1,2]".to_string())));
        assert_eq!(decoder.next_frame(), Ok(Some("[3]".to_string())));
        assert_eq!(decoder.next_frame(), Ok(None));
    }

    #[test]
    fn test_decoder_byte_at_a_time() {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in b"data: [\"a\"]\n\ndata: [\"b\"]\n\n" {
            decoder.push(&[*byte]);
            if let Some(data) = decoder.next_frame().unwrap() {
                frames.push(data);
            }
        }
        assert_eq!(frames, vec!["[\"a\"]", "[\"b\"]"]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_skips_comment_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b":\n\nevent: ping\n\ndata: [\"ok\"]\n\n");
        assert_eq!(decoder.next_frame(), Ok(Some("[\"ok\"]".to_string())));
        assert_eq!(decoder.next_frame(), Ok(None));
    }

    #[test]
    fn test_decoder_joins_multiline_data() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: [1,\r\ndata: 2]\n\n");
        assert_eq!(decoder.next_frame(), Ok(Some("[1,\n2]".to_string())));
    }

    #[test]
    fn test_decoder_rejects_invalid_utf8() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: [\"\xff\"]\n\n");
        assert!(matches!(decoder.next_frame(), Err(StreamError::Decode(_))));
    }

    #[test]
    fn test_decoder_rejects_oversized_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: [\"");
        decoder.push(&vec![b'x'; MAX_FRAME_BYTES]);
        assert!(matches!(decoder.next_frame(), Err(StreamError::Decode(_))));
    }

    #[test]
    fn test_parse_args_rejects_non_array() {
        assert!(parse_args("{\"a\":1}").is_err());
        assert!(parse_args("not json").is_err());
        assert_eq!(parse_args("[]").unwrap(), Vec::<Value>::new());
    }
}
