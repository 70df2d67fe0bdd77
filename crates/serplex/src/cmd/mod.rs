use clap::{Args, Subcommand};
use serplex_frame::StreamId;
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

#[cfg(unix)]
pub mod listen;
#[cfg(unix)]
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write one message to a stream over a serial link socket.
    #[cfg(unix)]
    Send(SendArgs),
    /// Accept a link and print the frames it carries.
    #[cfg(unix)]
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(unix)]
        Command::Send(args) => send::run(args, format),
        #[cfg(unix)]
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Stream to write to (up to 4 characters).
    #[arg(long, short = 's', default_value = "sout")]
    pub stream: String,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Send the payload without framing.
    #[arg(long)]
    pub unframed: bool,
    /// Fail instead of waiting when the output queue is full.
    #[arg(long)]
    pub nonblocking: bool,
    /// Output queue size in bytes.
    #[arg(long, env = "SERPLEX_QUEUE_CAPACITY", default_value_t = serplex_driver::DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Maximum time to wait for the link to take everything (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Only print these streams (comma-separated names).
    #[arg(long, value_delimiter = ',')]
    pub streams: Option<Vec<StreamId>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Largest encoded frame accepted, in bytes.
    #[arg(long, default_value_t = serplex_frame::DEFAULT_MAX_FRAME)]
    pub max_frame: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
