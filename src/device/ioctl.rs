//! IOCTL command table.
//!
//! Commands arrive either by name (`"SET_BUFFER_SIZE"`) or by numeric code
//! (`IOCTL_SET_BUFFER_SIZE`); both end up as an [`IoctlCommand`] so the
//! dispatcher is an exhaustive `match`.

use super::error::DriverError;
use serde::Serialize;
use shared::constants::{
    IOCTL_CLEAR_BUFFER, IOCTL_DEFAULT_BUFFER_SIZE, IOCTL_ENABLE_LOGGING, IOCTL_SET_BUFFER_SIZE,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlCommand {
    ClearBuffer,
    /// Target capacity, already defaulted and sign-checked.
    SetBufferSize(usize),
    /// Flips the logging switch; the name is historical.
    EnableLogging,
}

/// Successful IOCTL reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoctlOutcome {
    pub message: String,
}

impl IoctlCommand {
    /// Resolve a command name (case-insensitive, surrounding whitespace
    /// ignored) and its optional argument.
    pub fn parse(name: &str, argument: Option<i64>) -> Result<Self, DriverError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CLEAR_BUFFER" => Ok(IoctlCommand::ClearBuffer),
            "SET_BUFFER_SIZE" => buffer_size(argument).map(IoctlCommand::SetBufferSize),
            "ENABLE_LOGGING" => Ok(IoctlCommand::EnableLogging),
            _ => Err(DriverError::InvalidCommand(name.to_owned())),
        }
    }

    /// Resolve a numeric request code.
    pub fn from_code(code: u32, argument: Option<i64>) -> Result<Self, DriverError> {
        match code {
            IOCTL_CLEAR_BUFFER => Ok(IoctlCommand::ClearBuffer),
            IOCTL_SET_BUFFER_SIZE => buffer_size(argument).map(IoctlCommand::SetBufferSize),
            IOCTL_ENABLE_LOGGING => Ok(IoctlCommand::EnableLogging),
            other => Err(DriverError::InvalidCommand(format!("{other:#06x}"))),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            IoctlCommand::ClearBuffer => IOCTL_CLEAR_BUFFER,
            IoctlCommand::SetBufferSize(_) => IOCTL_SET_BUFFER_SIZE,
            IoctlCommand::EnableLogging => IOCTL_ENABLE_LOGGING,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IoctlCommand::ClearBuffer => "CLEAR_BUFFER",
            IoctlCommand::SetBufferSize(_) => "SET_BUFFER_SIZE",
            IoctlCommand::EnableLogging => "ENABLE_LOGGING",
        }
    }
}

fn buffer_size(argument: Option<i64>) -> Result<usize, DriverError> {
    match argument {
        None => Ok(IOCTL_DEFAULT_BUFFER_SIZE),
        Some(n) if n <= 0 => Err(DriverError::config(format!(
            "buffer size must be greater than zero, got {n}"
        ))),
        Some(n) => usize::try_from(n)
            .map_err(|_| DriverError::config(format!("buffer size {n} is not addressable"))),
    }
}

impl fmt::Display for IoctlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoctlCommand::SetBufferSize(n) => write!(f, "{}({n})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(IoctlCommand::parse("clear_buffer", None), Ok(IoctlCommand::ClearBuffer));
        assert_eq!(IoctlCommand::parse(" ENABLE_LOGGING ", Some(1)), Ok(IoctlCommand::EnableLogging));
        assert_eq!(
            IoctlCommand::parse("Set_Buffer_Size", Some(512)),
            Ok(IoctlCommand::SetBufferSize(512))
        );
    }

    #[test]
    fn set_buffer_size_defaults_when_argument_missing() {
        assert_eq!(
            IoctlCommand::parse("SET_BUFFER_SIZE", None),
            Ok(IoctlCommand::SetBufferSize(2048))
        );
    }

    #[test]
    fn non_positive_size_is_a_config_error() {
        for arg in [0, -1, i64::MIN] {
            let err = IoctlCommand::parse("SET_BUFFER_SIZE", Some(arg)).unwrap_err();
            assert_eq!(err.kind(), "ConfigError", "arg {arg}");
        }
    }

    #[test]
    fn unknown_name_is_invalid_command() {
        assert_eq!(
            IoctlCommand::parse("FORMAT_DISK", None),
            Err(DriverError::InvalidCommand("FORMAT_DISK".into()))
        );
    }

    #[test]
    fn codes_map_both_ways() {
        for cmd in [
            IoctlCommand::ClearBuffer,
            IoctlCommand::SetBufferSize(2048),
            IoctlCommand::EnableLogging,
        ] {
            assert_eq!(IoctlCommand::from_code(cmd.code(), None), Ok(cmd));
        }
        assert_eq!(IOCTL_CLEAR_BUFFER, 0x6B01);
        assert!(matches!(
            IoctlCommand::from_code(0xDEAD, None),
            Err(DriverError::InvalidCommand(code)) if code == "0xdead"
        ));
    }
}
