//! A stalled socket peer must never hold up the flush path or
//! non-blocking writers.
#![cfg(unix)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serplex_driver::{DriverConfig, DriverError, QueueError, SerialDriver, WritePolicy};
use serplex_frame::STDOUT;
use serplex_link::{LinkStream, SerialLink, SocketLink, DEFAULT_CHANNEL};

const QUICK: Duration = Duration::from_millis(25);

fn saturate(link: &SocketLink) {
    let chunk = [0x41u8; SocketLink::TRANSMIT_WINDOW];
    for _ in 0..100_000 {
        if link.write_buffer(DEFAULT_CHANNEL, &chunk) == 0 {
            return;
        }
    }
    panic!("socket never filled up");
}

#[test]
fn saturated_socket_does_not_stall_flush_or_writers() {
    // The peer end stays open and is never read.
    let (left, _peer) = LinkStream::pair().unwrap();
    let config = DriverConfig {
        queue_capacity: 8192,
        ..DriverConfig::default()
    };
    let driver = Arc::new(SerialDriver::with_config(
        SocketLink::new(left).unwrap(),
        config,
    ));
    saturate(driver.link());
    driver
        .write_with_policy(STDOUT, b"pending", WritePolicy::NonBlocking)
        .unwrap();

    let start = Instant::now();
    assert_eq!(driver.flush(), 0);
    assert!(driver.queue().waiting() > 0);
    assert!(start.elapsed() < QUICK, "flush waited {:?}", start.elapsed());

    let running = Arc::new(AtomicBool::new(true));
    let flusher = {
        let driver = Arc::clone(&driver);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                driver.flush();
            }
        })
    };

    for _ in 0..50 {
        let start = Instant::now();
        let result = driver.write_with_policy(STDOUT, b"x", WritePolicy::NonBlocking);
        let elapsed = start.elapsed();
        assert!(elapsed < QUICK, "non-blocking write waited {elapsed:?}");
        assert!(
            matches!(
                result,
                Ok(1) | Err(DriverError::Io(QueueError::Full { .. })) | Err(DriverError::AccessDenied(_))
            ),
            "unexpected result: {result:?}"
        );
    }

    running.store(false, Ordering::Release);
    flusher.join().unwrap();
}
