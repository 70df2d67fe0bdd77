use std::io::{ErrorKind, Read};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::error::{LinkError, Result};
use crate::memory::InboundBuffer;
use crate::stream::LinkStream;
use crate::traits::SerialLink;

const READ_CHUNK_SIZE: usize = 1024;
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Unix domain socket endpoint for serial traffic.
///
/// Provides bind/accept/connect over filesystem-path sockets. The bound path
/// is removed again on drop, unless it was replaced in the meantime.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the path already exists and is a socket, it is removed first
    /// (stale socket cleanup). Any other existing file is left alone and
    /// binding fails.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(LinkError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| LinkError::Bind {
            path: path.clone(),
            source,
        };

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening for serial link");

        Ok(Self {
            listener,
            path,
            created_inode: Some((created.dev(), created.ino())),
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, _addr) = self.listener.accept().map_err(LinkError::Accept)?;
        debug!("accepted serial link connection");
        Ok(LinkStream::from_unix(stream))
    }

    /// Accept an incoming connection, giving up after `timeout`.
    ///
    /// Returns `Ok(None)` when no client connected in time, so callers can
    /// check for shutdown between attempts.
    pub fn accept_timeout(&self, timeout: Duration) -> Result<Option<LinkStream>> {
        self.listener
            .set_nonblocking(true)
            .map_err(LinkError::Accept)?;
        let accepted = self.poll_accept(Instant::now() + timeout);
        self.listener
            .set_nonblocking(false)
            .map_err(LinkError::Accept)?;

        let Some(stream) = accepted? else {
            return Ok(None);
        };
        stream.set_nonblocking(false).map_err(LinkError::Accept)?;
        debug!("accepted serial link connection");
        Ok(Some(LinkStream::from_unix(stream)))
    }

    fn poll_accept(&self, deadline: Instant) -> Result<Option<UnixStream>> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => return Ok(Some(stream)),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(ACCEPT_POLL.min(deadline - now));
                }
                Err(err) => return Err(LinkError::Accept(err)),
            }
        }
    }

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<LinkStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| LinkError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected serial link");
        Ok(LinkStream::from_unix(stream))
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

/// A [`SerialLink`] carried over a connected [`LinkStream`].
///
/// A background thread pumps received bytes into an inbound buffer so
/// single-byte reads can honour any timeout, including a zero-length poll.
/// Transmits never wait: whatever the socket buffer takes at once is the
/// accepted prefix, and a full buffer accepts nothing.
pub struct SocketLink {
    writer: LinkStream,
    control: LinkStream,
    inbound: Arc<InboundBuffer>,
    reader: Option<JoinHandle<()>>,
}

impl SocketLink {
    /// Transmit space advertised to the flush path.
    pub const TRANSMIT_WINDOW: usize = 4096;

    /// Wrap a connected stream.
    pub fn new(stream: LinkStream) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let control = stream.try_clone()?;
        let inbound = Arc::new(InboundBuffer::default());

        let reader = std::thread::Builder::new()
            .name("serplex-link-rx".to_string())
            .spawn({
                let inbound = Arc::clone(&inbound);
                move || pump_inbound(reader_stream, &inbound)
            })?;

        Ok(Self {
            writer: stream,
            control,
            inbound,
            reader: Some(reader),
        })
    }

    /// Connect to `path` and wrap the resulting stream.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(UnixDomainSocket::connect(path)?)
    }

    /// True once the peer has closed its side (or the receive side failed).
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

impl SerialLink for SocketLink {
    fn bytes_free(&self, _channel: u32) -> usize {
        Self::TRANSMIT_WINDOW
    }

    fn write_buffer(&self, _channel: u32, bytes: &[u8]) -> usize {
        match self.writer.try_send(bytes) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                trace!("link transmit window full");
                0
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => 0,
            Err(err) => {
                warn!(error = %err, "link transmit failed");
                0
            }
        }
    }

    fn read_byte(&self, timeout: Option<Duration>) -> Option<u8> {
        self.inbound.pop(timeout)
    }
}

impl Drop for SocketLink {
    fn drop(&mut self) {
        let _ = self.control.shutdown();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl std::fmt::Debug for SocketLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketLink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn pump_inbound(mut stream: LinkStream, inbound: &InboundBuffer) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => inbound.push(&chunk[..n]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(error = %err, "link receive ended");
                break;
            }
        }
    }
    inbound.close();
}
