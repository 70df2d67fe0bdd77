use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::{Mutex, MutexGuard};
use serplex_frame::{encode_frame, max_encoded_len, StreamId};
use serplex_link::SerialLink;
use tracing::{debug, trace};

use crate::config::DriverConfig;
use crate::control::ControlAction;
use crate::error::{DriverError, Result};
use crate::handle::StreamHandle;
use crate::queue::{OutputQueue, WritePolicy};
use crate::registry::StreamRegistry;

const NEWLINE: u8 = b'\n';

/// The serial multiplexer: all driver state for one physical link.
///
/// Construct one per link at startup and share it (usually behind an `Arc`)
/// between writers, the reader, and whatever runs the periodic
/// [`flush`](SerialDriver::flush).
///
/// Writes serialize on the write lock, which also owns the scratch buffer
/// frames are encoded into, so encode and enqueue happen as one step per
/// message. Reads serialize on a separate read lock; a read never waits for
/// a write or the other way round.
pub struct SerialDriver<L> {
    link: L,
    config: DriverConfig,
    registry: StreamRegistry,
    queue: OutputQueue,
    framing: AtomicBool,
    read_lock: Mutex<()>,
    write_lock: Mutex<BytesMut>,
}

impl<L: SerialLink> SerialDriver<L> {
    /// Create a driver with default configuration.
    pub fn new(link: L) -> Self {
        Self::with_config(link, DriverConfig::default())
    }

    /// Create a driver with explicit configuration.
    pub fn with_config(link: L, config: DriverConfig) -> Self {
        let scratch = BytesMut::with_capacity(max_encoded_len(config.queue_capacity) + 1);
        Self {
            link,
            registry: StreamRegistry::new(config.default_streams.iter().copied()),
            queue: OutputQueue::with_capacity(config.queue_capacity),
            framing: AtomicBool::new(config.framing),
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(scratch),
            config,
        }
    }

    /// The underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Startup configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Stream enable state.
    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Pending output.
    pub fn queue(&self) -> &OutputQueue {
        &self.queue
    }

    /// True if writes are currently framed.
    pub fn framing_enabled(&self) -> bool {
        self.framing.load(Ordering::Acquire)
    }

    /// Turn framing on or off for subsequent writes.
    pub fn set_framing(&self, enabled: bool) {
        let previous = self.framing.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            debug!(enabled, "framing toggled");
        }
    }

    /// Write `buf` to the handle's stream using the handle's write policy.
    pub fn write(&self, handle: &StreamHandle, buf: &[u8]) -> Result<usize> {
        self.write_with_policy(handle.stream(), buf, handle.write_policy())
    }

    /// Write `buf` to `stream`.
    ///
    /// A disabled stream reports the whole buffer as written and drops it.
    /// Otherwise the write is framed (when framing is on) and queued as one
    /// unit; the result is either the full length or an error with nothing
    /// reported written. What the link later manages to transmit does not
    /// affect the result.
    pub fn write_with_policy(
        &self,
        stream: StreamId,
        buf: &[u8],
        policy: WritePolicy,
    ) -> Result<usize> {
        if !self.registry.is_active(stream) {
            trace!(%stream, len = buf.len(), "stream inactive, write discarded");
            return Ok(buf.len());
        }

        let mut scratch =
            lock_with_policy(&self.write_lock, policy).ok_or(DriverError::AccessDenied("write"))?;

        let queued = if self.framing_enabled() {
            scratch.clear();
            encode_frame(stream, buf, &mut scratch);
            self.queue.enqueue(&scratch, policy)
        } else {
            self.queue.enqueue(buf, policy)
        };
        drop(scratch);

        queued?;
        Ok(buf.len())
    }

    /// Read inbound bytes into `buf`.
    ///
    /// Waits for the first byte, then takes only what is immediately
    /// available. Stops after a newline (which is kept) or when `buf` is
    /// full. If `buf` has room after the last byte read, a zero terminator is
    /// written there; it is not counted. Returns 0 only if the link has no
    /// more input to give.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let guard = self.read_lock.lock();

        let mut count = 0usize;
        while count < buf.len() {
            let timeout = if count == 0 {
                None
            } else {
                Some(Duration::ZERO)
            };
            let Some(byte) = self.link.read_byte(timeout) else {
                break;
            };

            buf[count] = byte;
            count += 1;
            if byte == NEWLINE {
                break;
            }
        }
        drop(guard);

        if let Some(slot) = buf.get_mut(count) {
            *slot = 0;
        }
        Ok(count)
    }

    /// Drain the output queue into the link. Best effort; returns bytes sent.
    pub fn flush(&self) -> usize {
        self.queue.flush(&self.link, self.config.link_channel)
    }

    /// Apply a control action. Per-handle actions need `handle`.
    pub fn control(&self, handle: Option<&StreamHandle>, action: ControlAction) -> Result<()> {
        match action {
            ControlAction::Activate(stream) => {
                self.registry.enable(stream);
            }
            ControlAction::Deactivate(stream) => {
                self.registry.disable(stream);
            }
            ControlAction::BlockingWrite | ControlAction::NonBlockingWrite => {
                let handle = handle.ok_or(DriverError::HandleRequired(action.name()))?;
                handle.set_nonblocking(action == ControlAction::NonBlockingWrite);
                debug!(
                    stream = %handle.stream(),
                    nonblocking = handle.is_nonblocking(),
                    "write policy changed"
                );
            }
            ControlAction::EnableFraming => self.set_framing(true),
            ControlAction::DisableFraming => self.set_framing(false),
        }
        Ok(())
    }
}

impl<L> std::fmt::Debug for SerialDriver<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDriver")
            .field("config", &self.config)
            .field("framing", &self.framing.load(Ordering::Relaxed))
            .field("registry", &self.registry)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

fn lock_with_policy<T>(lock: &Mutex<T>, policy: WritePolicy) -> Option<MutexGuard<'_, T>> {
    match policy {
        WritePolicy::Blocking => Some(lock.lock()),
        WritePolicy::NonBlocking => lock.try_lock(),
        WritePolicy::Timeout(timeout) => lock.try_lock_for(timeout),
    }
}
