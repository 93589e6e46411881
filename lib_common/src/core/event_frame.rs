//! # Push Event Frames
//!
//! Each pushed event is a single text frame:
//!
//! ```text
//! data: {"symbol":"IBM","name":"Int. Bus. Machines","low":153.7,"high":154.17,"current":154.03}\n\n
//! ```
//!
//! A frame is encoded once per tick into `Bytes`, and every subscriber gets a
//! reference-counted clone of the same buffer.
//!
//! The decoding half ([`FrameBuffer`], [`parse_frame`]) is for consumers of the
//! stream.

use std::str::Utf8Error;

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::markets::stocks::StockRecord;

/// Field prefix of the payload line.
pub const DATA_PREFIX: &str = "data: ";
/// Terminator that closes one event.
pub const FRAME_TERMINATOR: &str = "\n\n";

/// Why a received frame could not be turned back into a record.
#[derive(Debug, Error)]
pub enum FrameError {
    /// No `data:` line in the frame.
    #[error("frame has no data field")]
    MissingData,
    /// The payload is not a valid record.
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    /// The frame's bytes are not UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    Encoding(#[from] Utf8Error),
}

/// Encodes `record` as one push event frame.
pub fn encode_frame(record: &StockRecord) -> Result<Bytes, serde_json::Error> {
    let payload = serde_json::to_string(record)?;
    let mut frame = String::with_capacity(DATA_PREFIX.len() + payload.len() + FRAME_TERMINATOR.len());
    frame.push_str(DATA_PREFIX);
    frame.push_str(&payload);
    frame.push_str(FRAME_TERMINATOR);
    Ok(Bytes::from(frame))
}

/// Decodes one frame (with or without its terminator) back into a record.
///
/// Multiple `data:` lines are joined with `\n`; other fields and comment
/// lines are ignored.
pub fn parse_frame(frame: &str) -> Result<StockRecord, FrameError> {
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() {
        return Err(FrameError::MissingData);
    }
    Ok(serde_json::from_str(&data.join("\n"))?)
}

/// Reassembles frames from arbitrarily split chunks of a push stream.
///
/// Bytes are buffered until a blank line closes a frame, and only complete
/// frames are decoded, so a chunk boundary inside a multi-byte character is
/// harmless.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: BytesMut,
}

impl FrameBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame it completed, without its
    /// terminator. Blank keep-alive frames are dropped; a frame that is not
    /// UTF-8 comes back as [`FrameError::Encoding`].
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, FrameError>> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = frame_end(&self.pending) {
            let raw = self.pending.split_to(end);
            match std::str::from_utf8(&raw) {
                Ok(text) => {
                    let text = text.replace("\r\n", "\n");
                    let frame = text.trim_matches('\n');
                    if !frame.is_empty() {
                        frames.push(Ok(frame.to_string()));
                    }
                }
                Err(e) => frames.push(Err(FrameError::Encoding(e))),
            }
        }
        frames
    }
}

/// Offset just past the first blank line (`\n\n`, `\n\r\n` or `\r\n\r\n`).
fn frame_end(buf: &[u8]) -> Option<usize> {
    (0..buf.len()).find_map(|i| {
        let rest = &buf[i..];
        if rest.starts_with(b"\n\n") {
            Some(i + 2)
        } else if rest.starts_with(b"\n\r\n") {
            Some(i + 3)
        } else if rest.starts_with(b"\r\n\r\n") {
            Some(i + 4)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ibm() -> StockRecord {
        StockRecord::new("IBM", "Int. Bus. Machines", 153.7, 154.17, 154.03)
    }

    #[test]
    fn frame_layout() {
        let frame = encode_frame(&ibm()).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {\"symbol\":\"IBM\""));
        assert!(text.ends_with("}\n\n"));
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn parse_accepts_prefix_without_space() {
        let record = parse_frame(r#"data:{"symbol":"A","name":"a","low":1.0,"high":2.0,"current":1.5}"#).unwrap();
        assert_eq!(record.symbol, "A");
    }

    #[test]
    fn parse_reports_missing_data_and_bad_payload() {
        assert!(matches!(parse_frame(": keep-alive"), Err(FrameError::MissingData)));
        assert!(matches!(parse_frame("data: {not json"), Err(FrameError::Payload(_))));
    }

    #[test]
    fn buffer_reassembles_split_frames() {
        let encoded = encode_frame(&ibm()).unwrap();
        let (head, tail) = encoded.split_at(17);

        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"\n").is_empty());
        assert!(buffer.push(head).is_empty());

        let mut rest = tail.to_vec();
        rest.extend_from_slice(&encoded);
        let frames = buffer.push(&rest);
        assert_eq!(frames.len(), 2);
        for frame in frames {
            assert_eq!(parse_frame(&frame.unwrap()).unwrap(), ibm());
        }
    }

    #[test]
    fn split_inside_multibyte_character_is_lossless() {
        let record = StockRecord::new("GLE", "Société Générale", 30.0, 31.0, 30.5);
        let encoded = encode_frame(&record).unwrap();
        let cut = encoded.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(&encoded[..cut]).is_empty());
        let frames = buffer.push(&encoded[cut..]);
        assert_eq!(frames.len(), 1);

        let decoded = parse_frame(frames[0].as_ref().unwrap()).unwrap();
        assert_eq!(decoded.name, "Société Générale");
    }

    #[test]
    fn invalid_utf8_frame_is_reported_and_stream_continues() {
        let mut buffer = FrameBuffer::new();
        let mut wire = b"data: \xff\xfe\n\n".to_vec();
        wire.extend_from_slice(&encode_frame(&ibm()).unwrap());

        let frames = buffer.push(&wire);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(FrameError::Encoding(_))));
        assert_eq!(parse_frame(frames[1].as_ref().unwrap()).unwrap(), ibm());
    }

    #[test]
    fn crlf_terminated_frames_are_accepted() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(b"data: {\"symbol\":\"A\",\"name\":\"a\",\"low\":1.0,\"high\":2.0,\"current\":1.5}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(parse_frame(frames[0].as_ref().unwrap()).unwrap().symbol, "A");
    }
}
