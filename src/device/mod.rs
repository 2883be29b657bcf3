//! Character device core: ring buffer, access control, lifecycle state and
//! the `open`/`read`/`write`/`ioctl`/`release` surface that ties them
//! together.

pub mod access;
pub mod driver;
pub mod error;
pub mod ioctl;
pub mod ring;
pub mod state;
pub mod stats;

pub use access::{AccessController, AccessGuard, Role};
pub use driver::{DeviceDriver, DeviceInfo, Health, OpenResult, ReadResult, WriteResult};
pub use error::DriverError;
pub use ioctl::{IoctlCommand, IoctlOutcome};
pub use ring::RingBuffer;
pub use state::{DeviceState, RuntimeConfig, Stats};
pub use stats::StatsSnapshot;
