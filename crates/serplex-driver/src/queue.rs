use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serplex_link::SerialLink;
use tracing::{debug, trace};

use crate::error::QueueError;

/// How long a writer is prepared to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Wait as long as it takes.
    #[default]
    Blocking,
    /// Fail instead of waiting.
    NonBlocking,
    /// Wait at most this long.
    Timeout(Duration),
}

/// Bounded byte FIFO between writers and the link.
///
/// All writers share one queue, so bytes leave in the order they were
/// submitted across every stream. The queue has its own lock: a flush running
/// on a background thread and an enqueue holding the driver's write lock never
/// see each other's index updates half-done, and the link's transmit call is
/// only ever made from inside [`flush`](OutputQueue::flush) under that lock.
#[derive(Debug)]
pub struct OutputQueue {
    bytes: Mutex<VecDeque<u8>>,
    space: Condvar,
    capacity: usize,
}

impl OutputQueue {
    /// Create an empty queue holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
            capacity,
        }
    }

    /// Maximum number of queued bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes waiting to be transmitted.
    pub fn waiting(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Bytes that can be enqueued without waiting.
    pub fn free(&self) -> usize {
        self.capacity - self.waiting()
    }

    /// Copy of the queued bytes, front first.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().iter().copied().collect()
    }

    /// Append `bytes` at the back of the queue.
    ///
    /// - [`WritePolicy::NonBlocking`]: all or nothing; fails with
    ///   [`QueueError::Full`] if the batch does not fit right now, or if a
    ///   flush holds the queue at that moment (reported with `free: 0`).
    /// - [`WritePolicy::Timeout`]: waits for room for the whole batch; a batch
    ///   larger than the capacity fails at once with [`QueueError::TooLarge`].
    /// - [`WritePolicy::Blocking`]: never fails. A batch larger than the
    ///   capacity goes in piece by piece as flushes make room.
    pub fn enqueue(&self, bytes: &[u8], policy: WritePolicy) -> Result<(), QueueError> {
        if bytes.is_empty() {
            return Ok(());
        }

        match policy {
            WritePolicy::NonBlocking => {
                let Some(mut queue) = self.bytes.try_lock() else {
                    return Err(QueueError::Full {
                        requested: bytes.len(),
                        free: 0,
                    });
                };
                let free = self.capacity - queue.len();
                if bytes.len() > free {
                    return Err(QueueError::Full {
                        requested: bytes.len(),
                        free,
                    });
                }
                queue.extend(bytes);
                Ok(())
            }
            WritePolicy::Timeout(timeout) => {
                if bytes.len() > self.capacity {
                    return Err(QueueError::TooLarge {
                        len: bytes.len(),
                        capacity: self.capacity,
                    });
                }
                let deadline = Instant::now() + timeout;
                let mut queue = self.bytes.lock();
                while self.capacity - queue.len() < bytes.len() {
                    if self.space.wait_until(&mut queue, deadline).timed_out()
                        && self.capacity - queue.len() < bytes.len()
                    {
                        return Err(QueueError::TimedOut(timeout));
                    }
                }
                queue.extend(bytes);
                Ok(())
            }
            WritePolicy::Blocking => {
                let mut rest = bytes;
                let mut queue = self.bytes.lock();
                while !rest.is_empty() {
                    let free = self.capacity - queue.len();
                    if free == 0 {
                        self.space.wait(&mut queue);
                        continue;
                    }
                    let (now, later) = rest.split_at(free.min(rest.len()));
                    queue.extend(now);
                    rest = later;
                }
                Ok(())
            }
        }
    }

    /// Drain queued bytes into `link`. Never blocks, never fails.
    ///
    /// Transmits only when everything waiting fits in the link's free space,
    /// and then offers all of it in a single call. If the link takes it all
    /// the queue is reset; otherwise exactly the accepted prefix is removed
    /// and the rest keeps its order for the next flush. Returns the number of
    /// bytes transmitted.
    pub fn flush<L: SerialLink + ?Sized>(&self, link: &L, channel: u32) -> usize {
        let mut queue = self.bytes.lock();
        let waiting = queue.len();
        if waiting == 0 {
            return 0;
        }

        let free = link.bytes_free(channel);
        if waiting > free {
            trace!(waiting, free, "link busy, flush deferred");
            return 0;
        }

        let sent = link
            .write_buffer(channel, queue.make_contiguous())
            .min(waiting);
        if sent == waiting {
            queue.clear();
        } else {
            debug!(sent, waiting, "link accepted partial flush");
            queue.drain(..sent);
        }
        drop(queue);

        if sent > 0 {
            trace!(sent, "flushed");
            self.space.notify_all();
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serplex_link::{MemoryLink, DEFAULT_CHANNEL};

    use super::*;

    #[test]
    fn flush_with_nothing_waiting_is_a_noop() {
        let queue = OutputQueue::with_capacity(16);
        let link = MemoryLink::new();

        assert_eq!(queue.flush(&link, DEFAULT_CHANNEL), 0);
        assert_eq!(link.write_calls(), 0);
        assert_eq!(queue.waiting(), 0);
    }

    #[test]
    fn full_acceptance_empties_queue() {
        let queue = OutputQueue::with_capacity(16);
        let link = MemoryLink::new();
        queue.enqueue(b"hello", WritePolicy::NonBlocking).unwrap();

        assert_eq!(queue.flush(&link, DEFAULT_CHANNEL), 5);
        assert_eq!(queue.waiting(), 0);
        assert_eq!(link.transmitted(), b"hello");
        assert_eq!(link.write_calls(), 1);
    }

    #[test]
    fn partial_acceptance_keeps_tail_in_order() {
        let queue = OutputQueue::with_capacity(16);
        let link = MemoryLink::new();
        link.set_accept_limit(Some(3));
        queue.enqueue(b"abcdefg", WritePolicy::NonBlocking).unwrap();

        assert_eq!(queue.flush(&link, DEFAULT_CHANNEL), 3);
        assert_eq!(queue.snapshot(), b"defg");
        assert_eq!(link.transmitted(), b"abc");

        link.set_accept_limit(None);
        assert_eq!(queue.flush(&link, DEFAULT_CHANNEL), 4);
        assert_eq!(link.transmitted(), b"abcdefg");
        assert_eq!(queue.waiting(), 0);
    }

    #[test]
    fn zero_acceptance_changes_nothing() {
        let queue = OutputQueue::with_capacity(16);
        let link = MemoryLink::new();
        link.set_accept_limit(Some(0));
        queue.enqueue(b"xyz", WritePolicy::NonBlocking).unwrap();

        assert_eq!(queue.flush(&link, DEFAULT_CHANNEL), 0);
        assert_eq!(queue.snapshot(), b"xyz");
    }

    #[test]
    fn flush_waits_until_link_has_room_for_everything() {
        let queue = OutputQueue::with_capacity(16);
        let link = MemoryLink::with_free(4);
        queue.enqueue(b"too much", WritePolicy::NonBlocking).unwrap();

        assert_eq!(queue.flush(&link, DEFAULT_CHANNEL), 0);
        assert_eq!(link.write_calls(), 0);
        assert_eq!(queue.waiting(), 8);

        link.set_free(8);
        assert_eq!(queue.flush(&link, DEFAULT_CHANNEL), 8);
    }

    #[test]
    fn nonblocking_enqueue_is_all_or_nothing() {
        let queue = OutputQueue::with_capacity(8);
        queue.enqueue(b"12345", WritePolicy::NonBlocking).unwrap();

        let err = queue
            .enqueue(b"6789", WritePolicy::NonBlocking)
            .unwrap_err();
        assert_eq!(
            err,
            QueueError::Full {
                requested: 4,
                free: 3
            }
        );
        assert_eq!(queue.snapshot(), b"12345");
        assert_eq!(queue.free(), 3);
    }

    #[test]
    fn timed_enqueue_expires() {
        let queue = OutputQueue::with_capacity(4);
        queue.enqueue(b"full", WritePolicy::NonBlocking).unwrap();

        let timeout = Duration::from_millis(20);
        let err = queue
            .enqueue(b"x", WritePolicy::Timeout(timeout))
            .unwrap_err();
        assert_eq!(err, QueueError::TimedOut(timeout));
        assert_eq!(queue.snapshot(), b"full");
    }

    #[test]
    fn timed_enqueue_rejects_oversized_batch() {
        let queue = OutputQueue::with_capacity(4);
        let err = queue
            .enqueue(b"12345", WritePolicy::Timeout(Duration::from_secs(1)))
            .unwrap_err();
        assert_eq!(
            err,
            QueueError::TooLarge {
                len: 5,
                capacity: 4
            }
        );
    }

    #[test]
    fn timed_enqueue_succeeds_after_flush() {
        let queue = Arc::new(OutputQueue::with_capacity(4));
        let link = Arc::new(MemoryLink::new());
        queue.enqueue(b"full", WritePolicy::NonBlocking).unwrap();

        let flusher = {
            let queue = Arc::clone(&queue);
            let link = Arc::clone(&link);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.flush(&*link, DEFAULT_CHANNEL)
            })
        };

        queue
            .enqueue(b"next", WritePolicy::Timeout(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(flusher.join().unwrap(), 4);
        assert_eq!(queue.snapshot(), b"next");
    }

    #[test]
    fn blocking_enqueue_streams_oversized_batch() {
        let queue = Arc::new(OutputQueue::with_capacity(4));
        let link = Arc::new(MemoryLink::new());
        let payload: Vec<u8> = (1..=20).collect();

        let writer = {
            let queue = Arc::clone(&queue);
            let payload = payload.clone();
            std::thread::spawn(move || queue.enqueue(&payload, WritePolicy::Blocking))
        };

        while link.transmitted().len() < payload.len() {
            queue.flush(&*link, DEFAULT_CHANNEL);
            std::thread::sleep(Duration::from_millis(1));
        }

        writer.join().unwrap().unwrap();
        assert_eq!(link.transmitted(), payload);
    }

    struct StallingLink {
        entered: std::sync::mpsc::SyncSender<()>,
        release: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl SerialLink for StallingLink {
        fn bytes_free(&self, _channel: u32) -> usize {
            usize::MAX
        }

        fn write_buffer(&self, _channel: u32, bytes: &[u8]) -> usize {
            self.entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            bytes.len()
        }

        fn read_byte(&self, _timeout: Option<Duration>) -> Option<u8> {
            None
        }
    }

    #[test]
    fn nonblocking_enqueue_fails_fast_while_flush_holds_queue() {
        let (entered_tx, entered_rx) = std::sync::mpsc::sync_channel(1);
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let link = Arc::new(StallingLink {
            entered: entered_tx,
            release: std::sync::Mutex::new(release_rx),
        });
        let queue = Arc::new(OutputQueue::with_capacity(64));
        queue.enqueue(b"first", WritePolicy::NonBlocking).unwrap();

        let flusher = {
            let queue = Arc::clone(&queue);
            let link = Arc::clone(&link);
            std::thread::spawn(move || queue.flush(&*link, DEFAULT_CHANNEL))
        };
        entered_rx.recv().unwrap();

        let start = Instant::now();
        let err = queue
            .enqueue(b"second", WritePolicy::NonBlocking)
            .unwrap_err();
        assert!(start.elapsed() < Duration::from_millis(25));
        assert_eq!(
            err,
            QueueError::Full {
                requested: 6,
                free: 0
            }
        );

        release_tx.send(()).unwrap();
        assert_eq!(flusher.join().unwrap(), 5);
        queue.enqueue(b"second", WritePolicy::NonBlocking).unwrap();
        assert_eq!(queue.snapshot(), b"second");
    }

    #[test]
    fn empty_enqueue_always_succeeds() {
        let queue = OutputQueue::with_capacity(0);
        queue.enqueue(b"", WritePolicy::NonBlocking).unwrap();
        assert_eq!(queue.waiting(), 0);
    }
}
