use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serplex_driver::{
    CharDevice, ControlAction, DriverConfig, FlushDaemon, SerialDevice, SerialDriver,
};
use serplex_frame::encoded_len;
use serplex_link::{SerialLink, SocketLink};
use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{
    driver_error, io_error, link_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT,
};
use crate::output::{print_send_summary, OutputFormat};

const DRAIN_POLL: Duration = Duration::from_millis(1);

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let link =
        SocketLink::connect(&args.path).map_err(|err| link_error("connect failed", err))?;
    let config = DriverConfig::default()
        .with_queue_capacity(args.queue_capacity)
        .with_framing(!args.unframed);
    let device = SerialDevice::with_config(link, config);
    let daemon = FlushDaemon::spawn(Arc::clone(device.driver()))
        .map_err(|err| io_error("flush thread failed to start", err))?;

    let fd = device
        .open(&args.stream)
        .map_err(|err| driver_error("open failed", err))?;
    let stream = device
        .handles()
        .get(fd)
        .map_err(|err| driver_error("open failed", err))?
        .stream();
    device
        .control(None, ControlAction::Activate(stream))
        .map_err(|err| driver_error("activate failed", err))?;
    if args.nonblocking {
        device
            .control(Some(fd), ControlAction::NonBlockingWrite)
            .map_err(|err| driver_error("control failed", err))?;
    }

    let written = device
        .write(fd, &payload)
        .map_err(|err| driver_error("write failed", err))?;
    wait_for_drain(device.driver().as_ref(), timeout)?;
    drop(daemon);
    device
        .close(fd)
        .map_err(|err| driver_error("close failed", err))?;

    let wire_bytes = if args.unframed {
        payload.len()
    } else {
        encoded_len(stream, &payload) + 1
    };
    debug!(%stream, written, wire_bytes, "message sent");
    print_send_summary(
        &stream.to_string(),
        written,
        wire_bytes,
        !args.unframed,
        &args.path.display().to_string(),
        format,
    );

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(buf)
}

/// Wait until the flush daemon has handed everything to the link.
fn wait_for_drain<L: LinkState>(driver: &SerialDriver<L>, timeout: Duration) -> CliResult<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let waiting = driver.queue().waiting();
        if waiting == 0 {
            return Ok(());
        }
        if driver.link().peer_closed() {
            return Err(CliError::new(
                FAILURE,
                format!("link closed with {waiting} bytes unsent"),
            ));
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("timed out after {timeout:?} with {waiting} bytes unsent"),
            ));
        }
        thread::sleep(DRAIN_POLL);
    }
}

trait LinkState: SerialLink {
    fn peer_closed(&self) -> bool;
}

impl LinkState for SocketLink {
    fn peer_closed(&self) -> bool {
        self.is_closed()
    }
}
