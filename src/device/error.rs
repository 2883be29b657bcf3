//! Operation-level failures returned by the driver.

use thiserror::Error;

/// Every way an `open`/`read`/`write`/`ioctl` call can fail.
///
/// An empty read is not an error; it is a successful zero-length result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("device module is not loaded")]
    DeviceNotLoaded,

    #[error("device busy: another operation holds the buffer")]
    Busy,

    #[error("buffer full: no room for {requested} byte(s)")]
    BufferFull { requested: usize },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("invalid ioctl command '{0}'")]
    InvalidCommand(String),
}

impl DriverError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        DriverError::Config { reason: reason.into() }
    }

    /// Stable name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            DriverError::DeviceNotLoaded => "DeviceNotLoaded",
            DriverError::Busy => "Busy",
            DriverError::BufferFull { .. } => "BufferFull",
            DriverError::Config { .. } => "ConfigError",
            DriverError::InvalidCommand(_) => "InvalidCommand",
        }
    }

    /// The errno a Linux character device would hand back to user space.
    pub fn errno(&self) -> i32 {
        match self {
            DriverError::DeviceNotLoaded => 19,    // ENODEV
            DriverError::Busy => 16,               // EBUSY
            DriverError::BufferFull { .. } => 28,  // ENOSPC
            DriverError::Config { .. } => 22,      // EINVAL
            DriverError::InvalidCommand(_) => 25,  // ENOTTY
        }
    }
}
