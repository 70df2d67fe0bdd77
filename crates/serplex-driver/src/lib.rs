//! Serial stream multiplexer.
//!
//! Many logical output streams share one physical serial link. A write is
//! gated by the [`StreamRegistry`] (disabled streams are discarded but
//! reported as written), framed with its stream identity, and appended to a
//! bounded [`OutputQueue`] under a single write lock so frames never
//! interleave. A periodic flush drains the queue into the link, coping with
//! links that accept only part of what they are offered. Reads pull bytes
//! from the link directly, line by line, under their own lock.
//!
//! [`SerialDriver`] holds all of that state; [`SerialDevice`] puts a handle
//! table in front of it and implements the [`CharDevice`] file interface.

pub mod config;
pub mod control;
pub mod device;
pub mod driver;
pub mod error;
pub mod flusher;
pub mod handle;
pub mod queue;
pub mod registry;

pub use config::{DriverConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_QUEUE_CAPACITY};
pub use control::ControlAction;
pub use device::{CharDevice, FileKind, FileStat, SerialDevice};
pub use driver::SerialDriver;
pub use error::{DriverError, QueueError, Result};
pub use flusher::FlushDaemon;
#[cfg(feature = "async")]
pub use flusher::spawn_flush_task;
pub use handle::{Fd, HandleTable, StreamHandle, KDBG_FD, STDERR_FD, STDIN_FD, STDOUT_FD};
pub use queue::{OutputQueue, WritePolicy};
pub use registry::{StreamRegistry, GUARANTEED_DELIVERY};
