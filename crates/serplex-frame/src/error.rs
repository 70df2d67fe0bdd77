/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A COBS code byte points past the end of the frame.
    #[error("truncated frame (block needs {needed} bytes, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// A zero byte appeared inside an encoded frame.
    #[error("unexpected zero byte at offset {offset}")]
    UnexpectedZero { offset: usize },

    /// The decoded frame is too short to carry a stream identity.
    #[error("frame too short for stream id ({len} bytes decoded)")]
    MissingStreamId { len: usize },

    /// No delimiter arrived within the configured frame size.
    #[error("frame too large ({size} bytes without delimiter, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A stream name does not fit in a stream identity.
    #[error("stream name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
