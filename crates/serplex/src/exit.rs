use std::fmt;
use std::io;

use serplex_driver::DriverError;
use serplex_frame::FrameError;
use serplex_link::LinkError;

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const LINK_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Bind { source, .. }
        | LinkError::Connect { source, .. }
        | LinkError::Accept(source)
        | LinkError::Io(source) => io_error(context, source),
        other => CliError::new(LINK_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::NameTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn driver_error(context: &str, err: DriverError) -> CliError {
    let code = match &err {
        DriverError::AccessDenied(_) | DriverError::Io(_) => TIMEOUT,
        DriverError::NameTooLong { .. } | DriverError::InvalidControl(_) => USAGE,
        DriverError::NotSeekable
        | DriverError::BadDescriptor(_)
        | DriverError::DescriptorsExhausted
        | DriverError::HandleRequired(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use serplex_driver::QueueError;

    use super::*;

    #[test]
    fn refused_connection_is_plain_failure() {
        let err = link_error(
            "connect failed",
            LinkError::Connect {
                path: "/tmp/none.sock".into(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn driver_errors_map_to_exit_codes() {
        let full = DriverError::Io(QueueError::Full {
            requested: 9,
            free: 0,
        });
        assert_eq!(driver_error("write", full).code, TIMEOUT);

        let long = DriverError::NameTooLong { len: 7, max: 4 };
        assert_eq!(driver_error("open", long).code, USAGE);
    }

    #[test]
    fn corrupt_frames_are_invalid_data() {
        let err = frame_error("receive", FrameError::UnexpectedZero { offset: 3 });
        assert_eq!(err.code, DATA_INVALID);
    }
}
