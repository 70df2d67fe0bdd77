use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serplex_link::SerialLink;
use tracing::{debug, warn};

use crate::driver::SerialDriver;

const FLUSH_THREAD_NAME: &str = "serplex-flush";

/// Background thread that drains a driver's output queue every
/// `flush_interval`.
///
/// Dropping the daemon stops the thread and performs one last flush.
pub struct FlushDaemon<L: SerialLink + 'static> {
    driver: Arc<SerialDriver<L>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl<L: SerialLink + 'static> FlushDaemon<L> {
    /// Start flushing `driver` periodically.
    pub fn spawn(driver: Arc<SerialDriver<L>>) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let interval = driver.config().flush_interval;

        let thread = {
            let driver = Arc::clone(&driver);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(FLUSH_THREAD_NAME.to_string())
                .spawn(move || {
                    debug!(?interval, "flush daemon started");
                    while running.load(Ordering::Acquire) {
                        driver.flush();
                        thread::park_timeout(interval);
                    }
                    debug!("flush daemon stopped");
                })?
        };

        Ok(Self {
            driver,
            running,
            thread: Some(thread),
        })
    }

    /// The driver being flushed.
    pub fn driver(&self) -> &Arc<SerialDriver<L>> {
        &self.driver
    }

    /// Stop the thread and flush whatever is still queued.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        thread.thread().unpark();
        if thread.join().is_err() {
            warn!("flush daemon panicked");
        }
        self.driver.flush();
    }
}

impl<L: SerialLink + 'static> Drop for FlushDaemon<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Flush `driver` on the tokio runtime until `cancel` fires.
///
/// A final flush runs after cancellation.
#[cfg(feature = "async")]
pub fn spawn_flush_task<L: SerialLink + 'static>(
    driver: Arc<SerialDriver<L>>,
    cancel: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(driver.config().flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    driver.flush();
                }
            }
        }
        driver.flush();
        debug!("flush task stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serplex_frame::STDOUT;
    use serplex_link::MemoryLink;

    use super::*;
    use crate::queue::WritePolicy;

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn daemon_drains_queue() {
        let driver = Arc::new(SerialDriver::new(MemoryLink::new()));
        let _daemon = FlushDaemon::spawn(Arc::clone(&driver)).unwrap();

        driver
            .write_with_policy(STDOUT, b"tick", WritePolicy::Blocking)
            .unwrap();
        assert!(wait_for(|| driver.queue().waiting() == 0
            && !driver.link().transmitted().is_empty()));
    }

    #[test]
    fn shutdown_flushes_remaining_output() {
        let driver = Arc::new(SerialDriver::new(MemoryLink::new()));
        let mut daemon = FlushDaemon::spawn(Arc::clone(&driver)).unwrap();
        driver.link().set_free(0);

        driver
            .write_with_policy(STDOUT, b"late", WritePolicy::Blocking)
            .unwrap();
        thread::sleep(Duration::from_millis(10));
        assert!(driver.link().transmitted().is_empty());

        driver.link().set_free(4096);
        daemon.shutdown();
        assert_eq!(driver.queue().waiting(), 0);
        assert!(!driver.link().transmitted().is_empty());

        daemon.shutdown();
    }

    #[test]
    fn blocking_writer_progresses_with_daemon() {
        let driver = Arc::new(SerialDriver::with_config(
            MemoryLink::new(),
            crate::DriverConfig {
                queue_capacity: 32,
                ..Default::default()
            },
        ));
        let _daemon = FlushDaemon::spawn(Arc::clone(&driver)).unwrap();

        for _ in 0..50 {
            driver
                .write_with_policy(STDOUT, b"0123456789", WritePolicy::Blocking)
                .unwrap();
        }
        // 10 payload + 4 id + 1 code byte + 1 delimiter per frame.
        assert!(wait_for(|| driver.link().transmitted().len() == 50 * 16));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn flush_task_stops_on_cancel() {
        let driver = Arc::new(SerialDriver::new(MemoryLink::new()));
        let cancel = tokio_util::sync::CancellationToken::new();
        let task = spawn_flush_task(Arc::clone(&driver), cancel.clone());

        driver
            .write_with_policy(STDOUT, b"async", WritePolicy::Blocking)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.queue().waiting(), 0);

        cancel.cancel();
        task.await.unwrap();
    }
}
