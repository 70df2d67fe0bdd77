use std::io::SeekFrom;
use std::sync::Arc;

use serplex_link::SerialLink;

use crate::config::DriverConfig;
use crate::control::ControlAction;
use crate::driver::SerialDriver;
use crate::error::{DriverError, Result};
use crate::handle::{Fd, HandleTable};

/// File type reported by [`CharDevice::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Character device.
    CharDevice,
}

/// Metadata reported by [`CharDevice::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
}

/// File-style interface of a character device.
///
/// This is the surface a VFS layer dispatches into: descriptors in, byte
/// counts or errors out.
pub trait CharDevice: Send + Sync {
    /// Open `path` and return its descriptor.
    fn open(&self, path: &str) -> Result<Fd>;

    /// Read into `buf` from the device.
    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf` through the handle `fd`.
    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize>;

    /// Release `fd`.
    fn close(&self, fd: Fd) -> Result<()>;

    /// Describe the file behind `fd`.
    fn stat(&self, fd: Fd) -> Result<FileStat>;

    /// Character devices have no position.
    fn seek(&self, fd: Fd, pos: SeekFrom) -> Result<u64> {
        let _ = (fd, pos);
        Err(DriverError::NotSeekable)
    }

    /// True if `fd` refers to a terminal.
    fn isatty(&self, fd: Fd) -> Result<bool>;

    /// Apply a control action, optionally scoped to `fd`.
    fn control(&self, fd: Option<Fd>, action: ControlAction) -> Result<()>;
}

/// A [`SerialDriver`] with a descriptor table in front of it.
pub struct SerialDevice<L> {
    driver: Arc<SerialDriver<L>>,
    handles: HandleTable,
}

impl<L: SerialLink> SerialDevice<L> {
    /// Create a device over `link` with default configuration.
    pub fn new(link: L) -> Self {
        Self::with_config(link, DriverConfig::default())
    }

    /// Create a device over `link` with explicit configuration.
    pub fn with_config(link: L, config: DriverConfig) -> Self {
        Self::from_driver(Arc::new(SerialDriver::with_config(link, config)))
    }

    /// Wrap an existing driver, e.g. one a [`FlushDaemon`](crate::FlushDaemon)
    /// already holds.
    pub fn from_driver(driver: Arc<SerialDriver<L>>) -> Self {
        Self {
            driver,
            handles: HandleTable::new(),
        }
    }

    /// The shared driver.
    pub fn driver(&self) -> &Arc<SerialDriver<L>> {
        &self.driver
    }

    /// The descriptor table.
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }
}

impl<L: SerialLink> CharDevice for SerialDevice<L> {
    fn open(&self, path: &str) -> Result<Fd> {
        self.handles.open(path)
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        self.handles.get(fd)?;
        self.driver.read(buf)
    }

    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let handle = self.handles.get(fd)?;
        self.driver.write(&handle, buf)
    }

    fn close(&self, fd: Fd) -> Result<()> {
        self.handles.close(fd)
    }

    fn stat(&self, fd: Fd) -> Result<FileStat> {
        self.handles.get(fd)?;
        Ok(FileStat {
            kind: FileKind::CharDevice,
        })
    }

    fn isatty(&self, fd: Fd) -> Result<bool> {
        self.handles.get(fd)?;
        Ok(true)
    }

    fn control(&self, fd: Option<Fd>, action: ControlAction) -> Result<()> {
        let handle = fd.map(|fd| self.handles.get(fd)).transpose()?;
        self.driver.control(handle.as_deref(), action)
    }
}

impl<L> std::fmt::Debug for SerialDevice<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevice")
            .field("driver", &self.driver)
            .field("handles", &self.handles)
            .finish()
    }
}
