use std::sync::Arc;
use std::time::Duration;

/// Transmit channel used by the serial driver on single-wire hardware.
pub const DEFAULT_CHANNEL: u32 = 1;

/// The raw byte primitives of a physical serial link.
///
/// Implementations use interior mutability: the transmit side is driven by
/// the flush path and the receive side by the read path, possibly from
/// different threads at the same time. Callers still never invoke
/// [`write_buffer`](SerialLink::write_buffer) concurrently with itself.
pub trait SerialLink: Send + Sync {
    /// Number of bytes the transmit side can accept right now.
    fn bytes_free(&self, channel: u32) -> usize;

    /// Hand `bytes` to the transmitter.
    ///
    /// Returns how many bytes from the front of `bytes` were accepted, which
    /// may be fewer than requested (including zero).
    fn write_buffer(&self, channel: u32, bytes: &[u8]) -> usize;

    /// Take one inbound byte.
    ///
    /// `None` waits until a byte arrives, `Some(Duration::ZERO)` polls, any
    /// other duration waits at most that long. Returns `None` when no byte
    /// became available in time.
    fn read_byte(&self, timeout: Option<Duration>) -> Option<u8>;
}

impl<L: SerialLink + ?Sized> SerialLink for Arc<L> {
    fn bytes_free(&self, channel: u32) -> usize {
        (**self).bytes_free(channel)
    }

    fn write_buffer(&self, channel: u32, bytes: &[u8]) -> usize {
        (**self).write_buffer(channel, bytes)
    }

    fn read_byte(&self, timeout: Option<Duration>) -> Option<u8> {
        (**self).read_byte(timeout)
    }
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn bytes_free(&self, channel: u32) -> usize {
        (**self).bytes_free(channel)
    }

    fn write_buffer(&self, channel: u32, bytes: &[u8]) -> usize {
        (**self).write_buffer(channel, bytes)
    }

    fn read_byte(&self, timeout: Option<Duration>) -> Option<u8> {
        (**self).read_byte(timeout)
    }
}
