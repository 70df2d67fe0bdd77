use std::time::Duration;

use serplex_frame::{StreamId, STDOUT};
use serplex_link::DEFAULT_CHANNEL;

/// Output queue size used by the on-device driver.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2047;

/// Period of the background flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(2);

/// Startup configuration for a [`SerialDriver`](crate::SerialDriver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Output queue capacity in bytes. Default: 2047.
    pub queue_capacity: usize,
    /// Whether writes are framed at startup. Default: true.
    pub framing: bool,
    /// Link channel the flush transmits on.
    pub link_channel: u32,
    /// Streams enabled at startup, on top of the guaranteed-delivery set.
    pub default_streams: Vec<StreamId>,
    /// How often a [`FlushDaemon`](crate::FlushDaemon) drains the queue.
    pub flush_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            framing: true,
            link_channel: DEFAULT_CHANNEL,
            default_streams: vec![STDOUT],
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl DriverConfig {
    /// Set the output queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Start with framing on or off.
    pub fn with_framing(mut self, framing: bool) -> Self {
        self.framing = framing;
        self
    }

    /// Transmit on `channel`.
    pub fn with_link_channel(mut self, channel: u32) -> Self {
        self.link_channel = channel;
        self
    }

    /// Replace the streams enabled at startup.
    pub fn with_default_streams(mut self, streams: impl IntoIterator<Item = StreamId>) -> Self {
        self.default_streams = streams.into_iter().collect();
        self
    }

    /// Set the background flush period.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use serplex_frame::KDBG;

    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = DriverConfig::default()
            .with_queue_capacity(64)
            .with_framing(false)
            .with_default_streams([STDOUT, KDBG])
            .with_flush_interval(Duration::from_millis(10));

        assert_eq!(config.queue_capacity, 64);
        assert!(!config.framing);
        assert_eq!(config.default_streams, vec![STDOUT, KDBG]);
        assert_eq!(config.flush_interval, Duration::from_millis(10));
        assert_eq!(config.link_channel, DEFAULT_CHANNEL);
    }
}
