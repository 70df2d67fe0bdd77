use std::io::{ErrorKind, Read};

use bytes::BytesMut;
#[cfg(unix)]
use serplex_link::LinkStream;
use tracing::{debug, warn};

use crate::codec::{decode_frame, Frame, FrameConfig, DELIMITER};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// This is the far end of a serial link: it splits the byte stream at
/// delimiters and decodes each frame back into its stream and payload.
/// Consecutive delimiters are skipped. After an oversized frame the reader
/// drops bytes up to the next delimiter and resumes from there.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    discarding: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            discarding: false,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// A frame that fails to decode is consumed and its error returned; the
    /// next call continues with the following frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.next_buffered()? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn next_buffered(&mut self) -> Result<Option<Frame>> {
        while let Some(pos) = self.buf.iter().position(|b| *b == DELIMITER) {
            let segment = self.buf.split_to(pos + 1);
            if self.discarding {
                debug!(dropped = segment.len(), "resynchronised after oversized frame");
                self.discarding = false;
                continue;
            }
            if pos == 0 {
                continue;
            }
            if pos > self.config.max_frame_size {
                warn!(size = pos, max = self.config.max_frame_size, "dropping oversized frame");
                return Err(FrameError::FrameTooLarge {
                    size: pos,
                    max: self.config.max_frame_size,
                });
            }
            return decode_frame(&segment[..pos]).map(Some);
        }

        if self.buf.len() > self.config.max_frame_size {
            let size = self.buf.len();
            self.buf.clear();
            if !self.discarding {
                self.discarding = true;
                warn!(size, max = self.config.max_frame_size, "dropping oversized frame");
                return Err(FrameError::FrameTooLarge {
                    size,
                    max: self.config.max_frame_size,
                });
            }
        }

        Ok(None)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(link_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(unix)]
fn link_to_frame_error(err: serplex_link::LinkError) -> FrameError {
    match err {
        serplex_link::LinkError::Io(io) | serplex_link::LinkError::Accept(io) => {
            FrameError::Io(io)
        }
        serplex_link::LinkError::Bind { source, .. }
        | serplex_link::LinkError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
