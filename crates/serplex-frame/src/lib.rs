//! Frame encoding for multiplexed serial links.
//!
//! Every write that reaches the wire is one self-delimiting frame:
//! - the 4-byte stream identity followed by the payload
//! - COBS-encoded, so no zero byte appears inside the frame
//! - terminated by a single zero byte
//!
//! A receiver can resynchronise at any zero byte, and recovers both the
//! payload and the stream it was written to.

pub mod codec;
pub mod error;
pub mod reader;
pub mod stream;

pub use codec::{
    decode_frame, encode_frame, encoded_len, max_encoded_len, Frame, FrameConfig,
    DEFAULT_MAX_FRAME, DELIMITER,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use stream::{stream_name, StreamId, KDBG, STDERR, STDIN, STDOUT, STREAM_ID_SIZE};
