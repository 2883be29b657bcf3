// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Public library entry point.  Re-export everything for both `main.rs` and
// integration tests.

mod macros;

pub mod clock;
pub mod comms;
pub mod config;
pub mod device;

pub use clock::{Clock, ManualClock, SystemClock};
pub use comms::events::{EventLevel, EventLog, LogEvent};
pub use config::Config;
pub use device::{
    DeviceDriver, DeviceInfo, DriverError, Health, IoctlCommand, IoctlOutcome, OpenResult,
    ReadResult, StatsSnapshot, WriteResult,
};
