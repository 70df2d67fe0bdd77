use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;

use crate::error::Result;

/// A connected byte stream carrying serial traffic. Implements Read + Write.
///
/// The host side of a link reads frames straight from this type; the device
/// side wraps it in a [`SocketLink`](crate::SocketLink).
pub struct LinkStream {
    inner: UnixStream,
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = libc::MSG_DONTWAIT;

impl LinkStream {
    pub(crate) fn from_unix(stream: UnixStream) -> Self {
        Self { inner: stream }
    }

    /// Send as much of `buf` as the socket buffer takes right now.
    ///
    /// Fails with `WouldBlock` instead of waiting when the buffer is full.
    /// Only this call is non-blocking: the descriptor mode is shared with
    /// every clone and stays blocking.
    pub fn try_send(&self, buf: &[u8]) -> std::io::Result<usize> {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes and the
        // descriptor is an open socket owned by `self.inner`.
        let rc = unsafe {
            libc::send(
                self.inner.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                SEND_FLAGS,
            )
        };
        if rc < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_unix(cloned))
    }

    /// Shut down both directions; pending blocking reads return EOF.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown(Shutdown::Both).map_err(Into::into)
    }

    /// A connected pair, handy for tests and in-process demos.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream").field("type", &"unix").finish()
    }
}
