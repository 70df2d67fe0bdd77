use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serplex_frame::{StreamId, KDBG, STDERR, STDIN, STDOUT, STREAM_ID_SIZE};
use tracing::debug;

use crate::error::{DriverError, Result};
use crate::queue::WritePolicy;

/// Descriptor of an open stream handle.
pub type Fd = u32;

/// Reserved descriptor for standard input.
pub const STDIN_FD: Fd = 0;
/// Reserved descriptor for standard output.
pub const STDOUT_FD: Fd = 1;
/// Reserved descriptor for standard error.
pub const STDERR_FD: Fd = 2;
/// Reserved descriptor for kernel debug output.
pub const KDBG_FD: Fd = 3;

const FIRST_DYNAMIC_FD: Fd = 4;

const FLAG_NONBLOCKING_WRITE: u8 = 1;

/// One open stream: its identity plus per-handle write flags.
///
/// Several handles may name the same stream. The identity never changes
/// after creation; the flags can be flipped through a shared reference by
/// control operations.
#[derive(Debug)]
pub struct StreamHandle {
    stream: StreamId,
    flags: AtomicU8,
}

impl StreamHandle {
    /// Create a blocking handle for `stream`.
    pub fn new(stream: StreamId) -> Self {
        Self {
            stream,
            flags: AtomicU8::new(0),
        }
    }

    /// The stream this handle writes to.
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// True if writes through this handle must not wait.
    pub fn is_nonblocking(&self) -> bool {
        self.flags.load(Ordering::Acquire) & FLAG_NONBLOCKING_WRITE != 0
    }

    /// Switch between blocking and non-blocking writes.
    pub fn set_nonblocking(&self, nonblocking: bool) {
        if nonblocking {
            self.flags
                .fetch_or(FLAG_NONBLOCKING_WRITE, Ordering::AcqRel);
        } else {
            self.flags
                .fetch_and(!FLAG_NONBLOCKING_WRITE, Ordering::AcqRel);
        }
    }

    /// Write policy implied by the handle flags.
    pub fn write_policy(&self) -> WritePolicy {
        if self.is_nonblocking() {
            WritePolicy::NonBlocking
        } else {
            WritePolicy::Blocking
        }
    }
}

/// Where an open request lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenTarget {
    /// One of the reserved descriptors; nothing is allocated.
    Reserved(Fd),
    /// A new handle for this stream.
    Stream(StreamId),
}

/// Resolve an open path.
///
/// An empty path means standard output. One leading `/` is ignored. The
/// remaining name must fit in a stream identity (4 bytes, not characters);
/// `sout`, `sin` and `serr` map onto their reserved descriptors.
pub fn resolve_path(path: &str) -> Result<OpenTarget> {
    let name = path.strip_prefix('/').unwrap_or(path);

    let len = name.len();
    if len > STREAM_ID_SIZE {
        return Err(DriverError::NameTooLong {
            len,
            max: STREAM_ID_SIZE,
        });
    }

    let target = match name {
        "" | "sout" => OpenTarget::Reserved(STDOUT_FD),
        "sin" => OpenTarget::Reserved(STDIN_FD),
        "serr" => OpenTarget::Reserved(STDERR_FD),
        other => {
            let stream =
                StreamId::from_name(other).map_err(|_| DriverError::NameTooLong {
                    len,
                    max: STREAM_ID_SIZE,
                })?;
            OpenTarget::Stream(stream)
        }
    };
    Ok(target)
}

/// Descriptor table for open stream handles.
///
/// Descriptors 0 to 3 are permanently bound to stdin, stdout, stderr and
/// the kernel debug stream. Handles opened by name get fresh descriptors
/// from 4 upward.
#[derive(Debug)]
pub struct HandleTable {
    entries: RwLock<HashMap<Fd, Arc<StreamHandle>>>,
    next_fd: AtomicU32,
}

impl HandleTable {
    /// Create a table holding only the reserved handles.
    pub fn new() -> Self {
        let entries = [
            (STDIN_FD, STDIN),
            (STDOUT_FD, STDOUT),
            (STDERR_FD, STDERR),
            (KDBG_FD, KDBG),
        ]
        .into_iter()
        .map(|(fd, stream)| (fd, Arc::new(StreamHandle::new(stream))))
        .collect();

        Self {
            entries: RwLock::new(entries),
            next_fd: AtomicU32::new(FIRST_DYNAMIC_FD),
        }
    }

    /// Open `path`, returning a reserved or newly allocated descriptor.
    pub fn open(&self, path: &str) -> Result<Fd> {
        match resolve_path(path)? {
            OpenTarget::Reserved(fd) => Ok(fd),
            OpenTarget::Stream(stream) => {
                let fd = self
                    .next_fd
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |fd| fd.checked_add(1))
                    .map_err(|_| DriverError::DescriptorsExhausted)?;
                self.entries
                    .write()
                    .insert(fd, Arc::new(StreamHandle::new(stream)));
                debug!(fd, %stream, "stream handle opened");
                Ok(fd)
            }
        }
    }

    /// Look up an open handle.
    pub fn get(&self, fd: Fd) -> Result<Arc<StreamHandle>> {
        self.entries
            .read()
            .get(&fd)
            .cloned()
            .ok_or(DriverError::BadDescriptor(fd))
    }

    /// Release a descriptor. Reserved descriptors stay bound.
    pub fn close(&self, fd: Fd) -> Result<()> {
        if fd < FIRST_DYNAMIC_FD {
            return self.get(fd).map(|_| ());
        }
        match self.entries.write().remove(&fd) {
            Some(handle) => {
                debug!(fd, stream = %handle.stream(), "stream handle closed");
                Ok(())
            }
            None => Err(DriverError::BadDescriptor(fd)),
        }
    }

    /// Number of open descriptors, reserved ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Always false: the reserved descriptors are permanent.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
