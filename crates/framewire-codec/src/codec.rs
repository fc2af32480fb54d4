use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::wire::WireWriter;

/// Head sync marker opening every frame.
pub const HEAD: [u8; 4] = [0xFF, 0xFE, 0xFD, 0xFC];

/// Tail sync marker closing every frame.
pub const TAIL: [u8; 4] = [0x9B, 0x9A, 0x99, 0x98];

/// Bytes before the payload: head (4) + sequence (8) + type id (4).
pub const HEADER_SIZE: usize = 16;

/// Bytes after the payload: tail (4).
pub const TRAILER_SIZE: usize = 4;

/// Default maximum size of an encoded payload or a single byte buffer: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────────┬─────────────┬──────────────┬──────────────┐
/// │ Head (4B)    │ Sequence      │ Type id     │ Payload      │ Tail (4B)    │
/// │ FF FE FD FC  │ (8B BE u64)   │ (4B BE i32) │ (self-       │ 9B 9A 99 98  │
/// │              │               │             │  delimiting) │              │
/// └──────────────┴───────────────┴─────────────┴──────────────┴──────────────┘
/// ```
///
/// On error `dst` is left as it was.
pub fn encode_frame(
    sequence: u64,
    message: &dyn Message,
    dst: &mut BytesMut,
    max_payload: usize,
) -> Result<()> {
    let start = dst.len();
    dst.reserve(HEADER_SIZE + TRAILER_SIZE);
    dst.put_slice(&HEAD);
    dst.put_u64(sequence);
    dst.put_i32(message.message_type());

    let payload_start = dst.len();
    let encoded = message.encode(&mut WireWriter::with_limit(dst, max_payload));
    if let Err(err) = encoded {
        dst.truncate(start);
        return Err(err);
    }

    let payload_len = dst.len() - payload_start;
    if payload_len > max_payload {
        dst.truncate(start);
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    dst.put_slice(&TAIL);
    Ok(())
}

/// Sliding-window matcher for a 4-byte sync marker.
///
/// Relies on every marker byte being distinct: after a mismatch the only
/// possible restart is at the current byte, as the marker's first byte.
#[derive(Debug, Clone)]
pub(crate) struct MarkerScan {
    marker: [u8; 4],
    matched: usize,
    consumed: u64,
}

impl MarkerScan {
    pub(crate) fn new(marker: [u8; 4]) -> Self {
        Self {
            marker,
            matched: 0,
            consumed: 0,
        }
    }

    /// Feed one byte; returns true once the whole marker has been seen.
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        self.consumed += 1;
        if byte == self.marker[self.matched] {
            self.matched += 1;
        } else if byte == self.marker[0] {
            self.matched = 1;
        } else {
            self.matched = 0;
        }
        self.matched == self.marker.len()
    }

    /// Bytes consumed that were not part of the matched marker.
    pub(crate) fn discarded(&self) -> u64 {
        self.consumed.saturating_sub(self.matched as u64)
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum encoded payload size and maximum single byte-buffer length.
    /// Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::testing::Note;

    #[test]
    fn test_markers_have_distinct_bytes() {
        for marker in [HEAD, TAIL] {
            for (i, a) in marker.iter().enumerate() {
                for b in &marker[i + 1..] {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_encode_layout() {
        let mut buf = BytesMut::new();
        let note = Note {
            id: 1,
            text: "hi".to_string(),
        };
        encode_frame(5, &note, &mut buf, DEFAULT_MAX_PAYLOAD).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&HEAD);
        expected.extend_from_slice(&5u64.to_be_bytes());
        expected.extend_from_slice(&7i32.to_be_bytes());
        expected.extend_from_slice(&1i64.to_be_bytes());
        expected.extend_from_slice(&[0, 0, 0, 2, b'h', b'i']);
        expected.extend_from_slice(&TAIL);

        assert_eq!(buf.as_ref(), expected.as_slice());
        assert_eq!(buf.len(), HEADER_SIZE + 8 + 6 + TRAILER_SIZE);
    }

    #[test]
    fn test_encode_appends_after_existing_frames() {
        let mut buf = BytesMut::new();
        let note = Note::default();
        encode_frame(0, &note, &mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        let first = buf.len();
        encode_frame(1, &note, &mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert_eq!(buf.len(), first * 2);
        assert_eq!(&buf[first..first + 4], &HEAD);
    }

    #[test]
    fn test_encode_payload_too_large_leaves_buffer_untouched() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        let note = Note {
            id: 0,
            text: "x".repeat(64),
        };
        let err = encode_frame(0, &note, &mut buf, 16).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert_eq!(buf.as_ref(), b"prefix");
    }

    #[test]
    fn test_scan_finds_marker_immediately() {
        let mut scan = MarkerScan::new(HEAD);
        let hits: Vec<bool> = HEAD.iter().map(|b| scan.push(*b)).collect();
        assert_eq!(hits, vec![false, false, false, true]);
        assert_eq!(scan.discarded(), 0);
    }

    #[test]
    fn test_scan_restarts_on_partial_match() {
        let mut scan = MarkerScan::new(HEAD);
        let stream = [0x01, 0xFF, 0xFE, 0xFF, 0xFE, 0xFD, 0xFC];
        let found = stream.iter().position(|b| scan.push(*b));
        assert_eq!(found, Some(stream.len() - 1));
        assert_eq!(scan.discarded(), 3);
    }

    #[test]
    fn test_frame_config_defaults() {
        let cfg = FrameConfig::default();
        assert_eq!(cfg.max_payload_size, DEFAULT_MAX_PAYLOAD);
        assert!(cfg.read_timeout.is_none());
        assert!(cfg.write_timeout.is_none());
    }
}
