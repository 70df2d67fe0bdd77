use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::traits::SerialLink;

/// Receive-side byte buffer with blocking single-byte reads.
#[derive(Debug, Default)]
pub(crate) struct InboundBuffer {
    state: Mutex<InboundState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct InboundState {
    bytes: VecDeque<u8>,
    closed: bool,
}

impl InboundBuffer {
    pub(crate) fn push(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.state.lock().bytes.extend(bytes);
        self.ready.notify_all();
    }

    /// Mark the source as finished; blocked readers stop waiting.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().bytes.len()
    }

    pub(crate) fn pop(&self, timeout: Option<Duration>) -> Option<u8> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if let Some(byte) = state.bytes.pop_front() {
                return Some(byte);
            }
            if state.closed {
                return None;
            }
            match deadline {
                None => self.ready.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        return state.bytes.pop_front();
                    }
                }
            }
        }
    }
}

/// A simulated serial wire.
///
/// Everything accepted by [`write_buffer`](SerialLink::write_buffer) is
/// recorded, both as one contiguous byte log and as the list of chunks
/// handed over per call. Free space and the per-call acceptance limit can be
/// tuned to reproduce a saturated or partially accepting transmitter. Inbound
/// bytes are injected with [`feed`](MemoryLink::feed).
#[derive(Debug)]
pub struct MemoryLink {
    outbound: Mutex<Outbound>,
    inbound: InboundBuffer,
}

#[derive(Debug)]
struct Outbound {
    wire: Vec<u8>,
    chunks: Vec<Vec<u8>>,
    free: usize,
    accept_limit: Option<usize>,
    write_calls: usize,
}

impl MemoryLink {
    /// Free space reported by a fresh link.
    pub const DEFAULT_FREE: usize = 4096;

    /// Create a link that reports [`DEFAULT_FREE`](Self::DEFAULT_FREE) bytes
    /// free and accepts everything it is given.
    pub fn new() -> Self {
        Self::with_free(Self::DEFAULT_FREE)
    }

    /// Create a link reporting `free` bytes of transmit space.
    pub fn with_free(free: usize) -> Self {
        Self {
            outbound: Mutex::new(Outbound {
                wire: Vec::new(),
                chunks: Vec::new(),
                free,
                accept_limit: None,
                write_calls: 0,
            }),
            inbound: InboundBuffer::default(),
        }
    }

    /// Change the reported transmit space.
    pub fn set_free(&self, free: usize) {
        self.outbound.lock().free = free;
    }

    /// Cap how many bytes a single transmit call accepts. `None` removes the cap.
    pub fn set_accept_limit(&self, limit: Option<usize>) {
        self.outbound.lock().accept_limit = limit;
    }

    /// Everything transmitted so far, in order.
    pub fn transmitted(&self) -> Vec<u8> {
        self.outbound.lock().wire.clone()
    }

    /// Drain and return the transmitted byte log.
    pub fn take_transmitted(&self) -> Vec<u8> {
        std::mem::take(&mut self.outbound.lock().wire)
    }

    /// The bytes accepted by each transmit call, in call order.
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.outbound.lock().chunks.clone()
    }

    /// Number of transmit calls made so far.
    pub fn write_calls(&self) -> usize {
        self.outbound.lock().write_calls
    }

    /// Make `bytes` available to the receive side.
    pub fn feed(&self, bytes: &[u8]) {
        self.inbound.push(bytes);
    }

    /// Inbound bytes not read yet.
    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }
}

impl Default for MemoryLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for MemoryLink {
    fn bytes_free(&self, _channel: u32) -> usize {
        self.outbound.lock().free
    }

    fn write_buffer(&self, _channel: u32, bytes: &[u8]) -> usize {
        let mut out = self.outbound.lock();
        out.write_calls += 1;

        let mut accepted = bytes.len().min(out.free);
        if let Some(limit) = out.accept_limit {
            accepted = accepted.min(limit);
        }

        out.wire.extend_from_slice(&bytes[..accepted]);
        out.chunks.push(bytes[..accepted].to_vec());
        accepted
    }

    fn read_byte(&self, timeout: Option<Duration>) -> Option<u8> {
        self.inbound.pop(timeout)
    }
}
