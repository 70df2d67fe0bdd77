//! Stream identities.
//!
//! A stream is named by exactly four bytes, normally the ASCII characters of
//! its name. The same four bytes read as a little-endian `u32` give the
//! numeric key used by control operations (`sout` is `0x74756f73`).

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Size of a stream identity on the wire.
pub const STREAM_ID_SIZE: usize = 4;

/// Standard input.
pub const STDIN: StreamId = StreamId(*b"sinp");

/// Standard output. Enabled at startup.
pub const STDOUT: StreamId = StreamId(*b"sout");

/// Standard error. Always delivered.
pub const STDERR: StreamId = StreamId(*b"serr");

/// Kernel debug output.
pub const KDBG: StreamId = StreamId(*b"kdbg");

/// A 4-byte stream identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StreamId([u8; STREAM_ID_SIZE]);

impl StreamId {
    /// Build an identity from its raw bytes.
    pub const fn new(bytes: [u8; STREAM_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build an identity from its numeric key.
    pub const fn from_u32(key: u32) -> Self {
        Self(key.to_le_bytes())
    }

    /// Numeric key (little-endian view of the bytes).
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Raw bytes, in wire order.
    pub const fn bytes(self) -> [u8; STREAM_ID_SIZE] {
        self.0
    }

    /// Build an identity from a name of at most four bytes.
    ///
    /// Shorter names are padded with zero bytes.
    pub fn from_name(name: &str) -> Result<Self, FrameError> {
        let raw = name.as_bytes();
        if raw.len() > STREAM_ID_SIZE {
            return Err(FrameError::NameTooLong {
                len: raw.len(),
                max: STREAM_ID_SIZE,
            });
        }
        let mut bytes = [0u8; STREAM_ID_SIZE];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    /// The identity as text, without zero padding, if it is printable ASCII.
    pub fn name(&self) -> Option<&str> {
        let len = self
            .0
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(STREAM_ID_SIZE);
        let (name, padding) = self.0.split_at(len);
        if name.is_empty()
            || !name.iter().all(u8::is_ascii_graphic)
            || padding.iter().any(|b| *b != 0)
        {
            return None;
        }
        std::str::from_utf8(name).ok()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#010x}", self.as_u32()),
        }
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({self})")
    }
}

impl FromStr for StreamId {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl From<u32> for StreamId {
    fn from(key: u32) -> Self {
        Self::from_u32(key)
    }
}

impl From<StreamId> for u32 {
    fn from(id: StreamId) -> Self {
        id.as_u32()
    }
}

/// Returns a human-readable role for a well-known stream.
pub fn stream_name(id: StreamId) -> &'static str {
    match id {
        STDIN => "STDIN",
        STDOUT => "STDOUT",
        STDERR => "STDERR",
        KDBG => "KDBG",
        _ => "USER",
    }
}
