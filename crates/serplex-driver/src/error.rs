use std::time::Duration;

use crate::handle::Fd;

/// Reasons the output queue refused a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Not enough space right now and the caller would not wait.
    #[error("output queue full ({requested} bytes requested, {free} free)")]
    Full { requested: usize, free: usize },

    /// Space did not free up within the caller's timeout.
    #[error("timed out after {0:?} waiting for output queue space")]
    TimedOut(Duration),

    /// The write can never fit in one piece.
    #[error("write of {len} bytes exceeds output queue capacity {capacity}")]
    TooLarge { len: usize, capacity: usize },
}

/// Errors reported by the serial driver to its callers.
///
/// None of these is fatal; each aborts only the operation that raised it.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The read or write lock could not be taken under the caller's policy.
    #[error("{0} lock unavailable")]
    AccessDenied(&'static str),

    /// The output queue rejected the write.
    #[error("output queue rejected write: {0}")]
    Io(#[from] QueueError),

    /// An open path does not fit in a stream identity.
    #[error("stream name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Serial streams have no position.
    #[error("serial streams are not seekable")]
    NotSeekable,

    /// No open handle with this descriptor.
    #[error("bad descriptor {0}")]
    BadDescriptor(Fd),

    /// Every descriptor value has been handed out.
    #[error("no free stream descriptors")]
    DescriptorsExhausted,

    /// Unknown control action code.
    #[error("unknown control action {0}")]
    InvalidControl(u32),

    /// A per-handle control action was issued without a handle.
    #[error("control action {0} requires a stream handle")]
    HandleRequired(&'static str),
}

impl DriverError {
    /// The errno a C-style dispatch layer would report for this error.
    pub fn errno(&self) -> i32 {
        match self {
            DriverError::AccessDenied(_) => libc::EACCES,
            DriverError::Io(_) => libc::EIO,
            DriverError::NameTooLong { .. } => libc::ENAMETOOLONG,
            DriverError::NotSeekable => libc::ESPIPE,
            DriverError::BadDescriptor(_) => libc::EBADF,
            DriverError::DescriptorsExhausted => libc::EMFILE,
            DriverError::InvalidControl(_) | DriverError::HandleRequired(_) => libc::EINVAL,
        }
    }
}

impl From<DriverError> for std::io::Error {
    fn from(err: DriverError) -> Self {
        use std::io::ErrorKind;

        let kind = match &err {
            DriverError::AccessDenied(_) => ErrorKind::PermissionDenied,
            DriverError::Io(QueueError::Full { .. }) => ErrorKind::WouldBlock,
            DriverError::Io(QueueError::TimedOut(_)) => ErrorKind::TimedOut,
            DriverError::Io(QueueError::TooLarge { .. }) => ErrorKind::InvalidInput,
            DriverError::NameTooLong { .. } => ErrorKind::InvalidInput,
            DriverError::NotSeekable => ErrorKind::Unsupported,
            DriverError::BadDescriptor(_) => ErrorKind::NotFound,
            DriverError::DescriptorsExhausted => ErrorKind::OutOfMemory,
            DriverError::InvalidControl(_) | DriverError::HandleRequired(_) => {
                ErrorKind::InvalidInput
            }
        };
        std::io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
