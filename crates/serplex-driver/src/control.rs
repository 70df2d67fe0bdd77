use serplex_frame::StreamId;

use crate::error::{DriverError, Result};

/// Control code: let a stream reach the wire.
pub const SERCTL_ACTIVATE: u32 = 10;
/// Control code: stop a stream from reaching the wire.
pub const SERCTL_DEACTIVATE: u32 = 11;
/// Control code: make a handle's writes wait for space.
pub const SERCTL_BLKWRITE: u32 = 12;
/// Control code: make a handle's writes fail instead of waiting.
pub const SERCTL_NOBLKWRITE: u32 = 13;
/// Control code: frame every write.
pub const SERCTL_ENABLE_COBS: u32 = 14;
/// Control code: send writes unframed.
pub const SERCTL_DISABLE_COBS: u32 = 15;

/// A control operation on the driver or on one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Enable a stream (ignored for guaranteed-delivery streams).
    Activate(StreamId),
    /// Disable a stream (ignored for guaranteed-delivery streams).
    Deactivate(StreamId),
    /// Handle writes wait for space.
    BlockingWrite,
    /// Handle writes fail instead of waiting.
    NonBlockingWrite,
    /// Frame every write.
    EnableFraming,
    /// Send writes unframed.
    DisableFraming,
}

impl ControlAction {
    /// Decode a numeric action code and its parameter.
    ///
    /// The parameter is the stream key for activate/deactivate and ignored
    /// otherwise.
    pub fn from_code(code: u32, param: u32) -> Result<Self> {
        match code {
            SERCTL_ACTIVATE => Ok(Self::Activate(StreamId::from_u32(param))),
            SERCTL_DEACTIVATE => Ok(Self::Deactivate(StreamId::from_u32(param))),
            SERCTL_BLKWRITE => Ok(Self::BlockingWrite),
            SERCTL_NOBLKWRITE => Ok(Self::NonBlockingWrite),
            SERCTL_ENABLE_COBS => Ok(Self::EnableFraming),
            SERCTL_DISABLE_COBS => Ok(Self::DisableFraming),
            other => Err(DriverError::InvalidControl(other)),
        }
    }

    /// Numeric action code.
    pub fn code(&self) -> u32 {
        match self {
            Self::Activate(_) => SERCTL_ACTIVATE,
            Self::Deactivate(_) => SERCTL_DEACTIVATE,
            Self::BlockingWrite => SERCTL_BLKWRITE,
            Self::NonBlockingWrite => SERCTL_NOBLKWRITE,
            Self::EnableFraming => SERCTL_ENABLE_COBS,
            Self::DisableFraming => SERCTL_DISABLE_COBS,
        }
    }

    /// True for actions that modify a single handle.
    pub fn requires_handle(&self) -> bool {
        matches!(self, Self::BlockingWrite | Self::NonBlockingWrite)
    }

    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activate(_) => "activate",
            Self::Deactivate(_) => "deactivate",
            Self::BlockingWrite => "blocking-write",
            Self::NonBlockingWrite => "nonblocking-write",
            Self::EnableFraming => "enable-framing",
            Self::DisableFraming => "disable-framing",
        }
    }
}

#[cfg(test)]
mod tests {
    use serplex_frame::STDOUT;

    use super::*;

    #[test]
    fn decodes_codes() {
        assert_eq!(
            ControlAction::from_code(SERCTL_ACTIVATE, 0x7475_6f73).unwrap(),
            ControlAction::Activate(STDOUT)
        );
        assert_eq!(
            ControlAction::from_code(SERCTL_DISABLE_COBS, 0).unwrap(),
            ControlAction::DisableFraming
        );
        assert!(matches!(
            ControlAction::from_code(99, 0),
            Err(DriverError::InvalidControl(99))
        ));
    }

    #[test]
    fn code_roundtrip() {
        for code in SERCTL_ACTIVATE..=SERCTL_DISABLE_COBS {
            let action = ControlAction::from_code(code, 0).unwrap();
            assert_eq!(action.code(), code);
        }
    }

    #[test]
    fn handle_scoped_actions() {
        assert!(ControlAction::NonBlockingWrite.requires_handle());
        assert!(ControlAction::BlockingWrite.requires_handle());
        assert!(!ControlAction::EnableFraming.requires_handle());
        assert!(!ControlAction::Activate(STDOUT).requires_handle());
    }
}
