//! Frame Codec
//!
//! Wire format for host/surface messages:
//!
//! ```text
//! +----------------+----------------+-------------------------+
//! | Length (4, BE) | CRC32 (4, BE)  | JSON payload (variable) |
//! +----------------+----------------+-------------------------+
//! ```
//!
//! Length covers the payload only. The checksum is CRC32 over the payload.
//! Length is validated before any buffer is sized from it.

use serde::{de::DeserializeOwned, Serialize};

use super::TransportError;

/// Maximum payload size. Sprite data URIs are the largest frames; 16 MB is
/// far above any real sprite while still bounding a corrupted length field.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const HEADER_BYTES: usize = 8;

/// Encode one message as a framed byte buffer.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, TransportError> {
    let payload = serde_json::to_vec(msg).map_err(|e| TransportError::Frame(e.to_string()))?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(TransportError::Frame(format!(
            "payload of {} bytes exceeds limit {MAX_FRAME_BYTES}",
            payload.len()
        )));
    }

    let mut buf = Vec::with_capacity(HEADER_BYTES + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Incremental decoder: feed it socket reads, pull out complete messages.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    consumed: usize,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        if self.consumed > 0 && self.consumed >= self.buffer.len() / 2 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next message.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn next<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        let pending = &self.buffer[self.consumed..];
        if pending.len() < HEADER_BYTES {
            return Ok(None);
        }

        let len = u32::from_be_bytes([pending[0], pending[1], pending[2], pending[3]]) as usize;
        if len > MAX_FRAME_BYTES {
            return Err(TransportError::Frame(format!(
                "declared payload of {len} bytes exceeds limit {MAX_FRAME_BYTES}"
            )));
        }
        if pending.len() < HEADER_BYTES + len {
            return Ok(None);
        }

        let expected = u32::from_be_bytes([pending[4], pending[5], pending[6], pending[7]]);
        let payload = &pending[HEADER_BYTES..HEADER_BYTES + len];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(TransportError::ChecksumMismatch { expected, actual });
        }

        let msg = serde_json::from_slice(payload).map_err(|e| TransportError::Frame(e.to_string()))?;
        self.consumed += HEADER_BYTES + len;
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::WireMessage;

    #[test]
    fn test_roundtrip() {
        let msg = WireMessage::Socket { port: 40123 };
        let bytes = encode(&msg).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        let out: WireMessage = decoder.next().unwrap().unwrap();
        assert_eq!(out, msg);
        assert!(decoder.next::<WireMessage>().unwrap().is_none());
    }

    #[test]
    fn test_partial_then_complete() {
        let msg = WireMessage::Asset {
            file: Some("pets/cat/tabby/idle.gif".into()),
            content: Some("data:image/gif;base64,AAAA".into()),
        };
        let bytes = encode(&msg).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes[..5]);
        assert!(decoder.next::<WireMessage>().unwrap().is_none());
        decoder.push(&bytes[5..]);
        let out: WireMessage = decoder.next().unwrap().unwrap();
        assert_eq!(out, msg);
    }

    #[test]
    fn test_back_to_back_frames() {
        let a = WireMessage::Socket { port: 40001 };
        let b = WireMessage::Socket { port: 40002 };
        let mut bytes = encode(&a).unwrap();
        bytes.extend(encode(&b).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        assert_eq!(decoder.next::<WireMessage>().unwrap(), Some(a));
        assert_eq!(decoder.next::<WireMessage>().unwrap(), Some(b));
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = encode(&WireMessage::Socket { port: 40001 }).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        let err = decoder.next::<WireMessage>().unwrap_err();
        assert!(matches!(err, TransportError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&(u32::MAX).to_be_bytes());
        decoder.push(&[0; 4]);
        let err = decoder.next::<WireMessage>().unwrap_err();
        assert!(matches!(err, TransportError::Frame(_)));
    }
}
