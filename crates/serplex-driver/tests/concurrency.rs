//! Many writers, one link: frames must arrive whole and in per-writer order.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serplex_driver::{
    CharDevice, ControlAction, DriverConfig, FlushDaemon, SerialDevice, SerialDriver, WritePolicy,
};
use serplex_frame::{FrameError, FrameReader, StreamId, STDERR, STDOUT};
use serplex_link::MemoryLink;

const WRITERS: usize = 6;
const MESSAGES: usize = 200;

fn decode_all(wire: Vec<u8>) -> Vec<serplex_frame::Frame> {
    let mut reader = FrameReader::new(Cursor::new(wire));
    let mut frames = Vec::new();
    loop {
        match reader.read_frame() {
            Ok(frame) => frames.push(frame),
            Err(FrameError::ConnectionClosed) => return frames,
            Err(err) => panic!("corrupt frame on wire: {err}"),
        }
    }
}

fn wait_until_drained(driver: &SerialDriver<MemoryLink>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while driver.queue().waiting() > 0 {
        assert!(Instant::now() < deadline, "queue never drained");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn concurrent_writers_never_interleave() {
    let config = DriverConfig {
        queue_capacity: 256,
        flush_interval: Duration::from_micros(200),
        ..DriverConfig::default()
    };
    let device = Arc::new(SerialDevice::with_config(MemoryLink::new(), config));
    let daemon = FlushDaemon::spawn(Arc::clone(device.driver())).unwrap();

    let names: Vec<String> = (0..WRITERS).map(|i| format!("w{i}")).collect();
    for name in &names {
        let stream = StreamId::from_name(name).unwrap();
        device.control(None, ControlAction::Activate(stream)).unwrap();
    }

    let workers: Vec<_> = names
        .iter()
        .cloned()
        .map(|name| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                let fd = device.open(&name).unwrap();
                for seq in 0..MESSAGES {
                    let line = format!("{name}:{seq:04}\n");
                    assert_eq!(device.write(fd, line.as_bytes()).unwrap(), line.len());
                }
                device.close(fd).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    wait_until_drained(device.driver());
    drop(daemon);

    let frames = decode_all(device.driver().link().take_transmitted());
    assert_eq!(frames.len(), WRITERS * MESSAGES);

    let mut next_seq: HashMap<StreamId, usize> = HashMap::new();
    for frame in frames {
        let name = frame.stream.name().unwrap().to_string();
        let seq = next_seq.entry(frame.stream).or_default();
        let expected = format!("{name}:{:04}\n", *seq);
        assert_eq!(&frame.payload[..], expected.as_bytes());
        *seq += 1;
    }
    assert!(next_seq.values().all(|count| *count == MESSAGES));
}

#[test]
fn partial_link_acceptance_keeps_stream_intact() {
    let link = MemoryLink::new();
    link.set_accept_limit(Some(7));
    let driver = Arc::new(SerialDriver::new(link));

    let payloads: Vec<Vec<u8>> = (0..20u8).map(|n| vec![n; usize::from(n) + 1]).collect();
    for payload in &payloads {
        driver
            .write_with_policy(STDOUT, payload, WritePolicy::NonBlocking)
            .unwrap();
    }

    while driver.queue().waiting() > 0 {
        assert!(driver.flush() > 0);
    }
    assert!(driver.link().write_calls() > 1);

    let frames = decode_all(driver.link().transmitted());
    let decoded: Vec<Vec<u8>> = frames.iter().map(|f| f.payload.to_vec()).collect();
    assert_eq!(decoded, payloads);
}

#[test]
fn guaranteed_stream_survives_toggling() {
    let driver = Arc::new(SerialDriver::new(MemoryLink::new()));
    let daemon = FlushDaemon::spawn(Arc::clone(&driver)).unwrap();

    let toggler = {
        let driver = Arc::clone(&driver);
        thread::spawn(move || {
            for _ in 0..500 {
                driver.control(None, ControlAction::Deactivate(STDERR)).unwrap();
                driver.control(None, ControlAction::Deactivate(STDOUT)).unwrap();
                driver.control(None, ControlAction::Activate(STDOUT)).unwrap();
            }
        })
    };

    for n in 0..100u32 {
        driver
            .write_with_policy(STDERR, &n.to_le_bytes(), WritePolicy::Blocking)
            .unwrap();
    }
    toggler.join().unwrap();

    wait_until_drained(&driver);
    drop(daemon);

    let errs: Vec<_> = decode_all(driver.link().transmitted())
        .into_iter()
        .filter(|f| f.stream == STDERR)
        .collect();
    assert_eq!(errs.len(), 100);
    for (n, frame) in errs.iter().enumerate() {
        assert_eq!(&frame.payload[..], &(n as u32).to_le_bytes());
    }
}
