use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serplex_frame::{FrameConfig, FrameError, FrameReader};
use serplex_link::UnixDomainSocket;
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let socket = UnixDomainSocket::bind(&args.path).map_err(|err| link_error("bind failed", err))?;
    info!(path = %socket.path().display(), "listening");

    let config = FrameConfig {
        max_frame_size: args.max_frame,
        read_timeout: Some(POLL_INTERVAL),
    };
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some(stream) = socket
            .accept_timeout(POLL_INTERVAL)
            .map_err(|err| link_error("accept failed", err))?
        else {
            continue;
        };
        let mut reader = FrameReader::with_config_link(stream, config.clone())
            .map_err(|err| frame_error("link setup failed", err))?;
        info!("link connected");

        while running.load(Ordering::SeqCst) {
            let frame = match reader.read_frame() {
                Ok(frame) => frame,
                Err(FrameError::ConnectionClosed) => {
                    info!("link closed");
                    break;
                }
                Err(FrameError::Io(err)) if is_poll_timeout(&err) => continue,
                Err(FrameError::Io(err)) => {
                    return Err(frame_error("receive failed", FrameError::Io(err)))
                }
                Err(err) => {
                    warn!(error = %err, "skipping corrupt frame");
                    continue;
                }
            };

            if let Some(streams) = &args.streams {
                if !streams.contains(&frame.stream) {
                    continue;
                }
            }

            print_frame(&frame, format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn is_poll_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
