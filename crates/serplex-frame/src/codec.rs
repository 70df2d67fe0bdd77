use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::stream::{StreamId, STREAM_ID_SIZE};

/// Frame terminator. Never appears inside an encoded frame.
pub const DELIMITER: u8 = 0x00;

/// Default bound on an encoded frame awaiting its delimiter: 64 KiB.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Longest run of non-zero bytes one COBS block can carry.
const MAX_BLOCK_DATA: usize = 254;
/// Code byte of a full block (no implied zero).
const FULL_BLOCK_CODE: u8 = 0xFF;

/// A decoded frame with its stream routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The stream this frame was written to.
    pub stream: StreamId,
    /// The frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(stream: StreamId, payload: impl Into<Bytes>) -> Self {
        Self {
            stream,
            payload: payload.into(),
        }
    }

    /// Encoded size on the wire, terminator included.
    pub fn wire_size(&self) -> usize {
        encoded_len(self.stream, &self.payload) + 1
    }

    /// Append this frame's wire form to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_frame(self.stream, &self.payload, dst);
    }
}

/// Upper bound on the encoded length of a payload, terminator excluded.
///
/// Depends only on the payload length: one leading code byte plus one extra
/// code byte per full 254-byte block of the stream id and payload.
pub fn max_encoded_len(payload_len: usize) -> usize {
    let n = STREAM_ID_SIZE + payload_len;
    n + n / MAX_BLOCK_DATA + 1
}

/// Exact encoded length of a frame, terminator excluded.
pub fn encoded_len(stream: StreamId, payload: &[u8]) -> usize {
    let mut len = 1;
    let mut run = 0usize;
    for byte in stream.bytes().iter().chain(payload) {
        if *byte == 0 {
            len += 1;
            run = 0;
        } else {
            len += 1;
            run += 1;
            if run == MAX_BLOCK_DATA {
                len += 1;
                run = 0;
            }
        }
    }
    len
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────────────────────┬──────────┐
/// │ COBS( stream id (4B) ‖ payload )             │ 0x00     │
/// │ no zero bytes, ≤ max_encoded_len(len) bytes  │ delimiter│
/// └──────────────────────────────────────────────┴──────────┘
/// ```
///
/// Space for the worst case is reserved up front, so `dst` grows at most
/// once. Encoding cannot fail.
pub fn encode_frame(stream: StreamId, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(max_encoded_len(payload.len()) + 1);

    let mut code_at = dst.len();
    dst.put_u8(0);
    let mut code: u8 = 1;

    for &byte in stream.bytes().iter().chain(payload) {
        if byte == 0 {
            dst[code_at] = code;
            code_at = dst.len();
            dst.put_u8(0);
            code = 1;
            continue;
        }
        dst.put_u8(byte);
        code += 1;
        if code == FULL_BLOCK_CODE {
            dst[code_at] = code;
            code_at = dst.len();
            dst.put_u8(0);
            code = 1;
        }
    }

    dst[code_at] = code;
    dst.put_u8(DELIMITER);
}

/// Decode one frame body (the bytes between two delimiters).
pub fn decode_frame(encoded: &[u8]) -> Result<Frame> {
    let mut decoded = BytesMut::with_capacity(encoded.len());
    let mut pos = 0usize;

    while pos < encoded.len() {
        let code = encoded[pos];
        if code == 0 {
            return Err(FrameError::UnexpectedZero { offset: pos });
        }

        let end = pos + code as usize;
        if end > encoded.len() {
            return Err(FrameError::Truncated {
                needed: code as usize - 1,
                available: encoded.len() - pos - 1,
            });
        }

        let block = &encoded[pos + 1..end];
        if let Some(zero) = block.iter().position(|b| *b == 0) {
            return Err(FrameError::UnexpectedZero {
                offset: pos + 1 + zero,
            });
        }
        decoded.put_slice(block);

        pos = end;
        if code != FULL_BLOCK_CODE && pos < encoded.len() {
            decoded.put_u8(0);
        }
    }

    if decoded.len() < STREAM_ID_SIZE {
        return Err(FrameError::MissingStreamId { len: decoded.len() });
    }

    let header = decoded.split_to(STREAM_ID_SIZE);
    let stream = StreamId::new([header[0], header[1], header[2], header[3]]);

    Ok(Frame {
        stream,
        payload: decoded.freeze(),
    })
}

/// Configuration for the frame reader.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum encoded frame size in bytes. Default: 64 KiB.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            read_timeout: None,
        }
    }
}
