//! The device itself.
//!
//! `DeviceDriver` owns one ring, one access controller and one state block,
//! and exposes the file-operation surface a character device gives user
//! space:
//!
//! ```text
//!   open ──► (write | read | ioctl)* ──► release
//! ```
//!
//! Every data operation follows the same order:
//!
//!  1. bail out with `DeviceNotLoaded` if the module is unloaded,
//!  2. pay the simulated I/O latency (never while holding the guard),
//!  3. take the guard (fail fast with `Busy` on contention),
//!  4. touch the ring and the counters,
//!  5. drop the guard, then count the error if there was one.

use super::{
    access::{AccessController, AccessGuard, Role},
    error::DriverError,
    ioctl::{IoctlCommand, IoctlOutcome},
    ring::RingBuffer,
    state::{DeviceState, RuntimeConfig},
    stats::{StatsSnapshot, rate},
};
use crate::{
    clock::{Clock, SystemClock},
    comms::events::{EventLevel, EventLog, pseudo_pid},
    config::{Config, ConfigError, Latency},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::constants::DRIVER_VERSION;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// Who the device is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name:    String,
    pub major:   u32,
    pub minor:   u32,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenResult {
    /// Handle to pass back to `release`.
    pub session: u64,
    pub pid:     u32,
    pub device:  String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub bytes_written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    pub data:       Vec<u8>,
    pub bytes_read: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status:    &'static str,
    pub version:   String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DeviceDriver {
    info:         DeviceInfo,
    latency:      Latency,
    buffer:       AccessController<RingBuffer>,
    state:        DeviceState,
    events:       EventLog,
    clock:        Arc<dyn Clock>,
    next_session: AtomicU64,
}

impl DeviceDriver {
    /// Build a loaded device on the system clock.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a loaded device on an injected clock.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let latency = config.latency.parse()?;
        let ring = RingBuffer::new(config.buffer.default_size, config.buffer.max_size).map_err(
            |e| ConfigError::InvalidValue { field: "buffer.default_size", reason: e.to_string() },
        )?;

        let info = DeviceInfo {
            name:    config.device.name.clone(),
            major:   config.device.major,
            minor:   config.device.minor,
            version: DRIVER_VERSION.to_owned(),
        };
        let now = clock.now();
        let driver = Self {
            state: DeviceState::new(RuntimeConfig::from(config), ring.capacity(), now),
            buffer: AccessController::new(ring),
            events: EventLog::new(config.events.capacity),
            next_session: AtomicU64::new(1),
            info,
            latency,
            clock,
        };

        driver.emit_always(
            EventLevel::Info,
            "Character device driver module loaded successfully".to_owned(),
        );
        driver.emit(
            EventLevel::Debug,
            format!(
                "Device {} registered with major number {}",
                driver.info.name, driver.info.major
            ),
        );
        Ok(driver)
    }

    /*──────────────────────────── file operations ───────────────────────────*/

    pub fn open(&self) -> Result<OpenResult, DriverError> {
        let result = self.ensure_loaded().map(|()| {
            self.state.record_open();
            metrics::counter!("chardev_open_total").increment(1);

            let session = self.next_session.fetch_add(1, Ordering::Relaxed);
            self.emit(
                EventLevel::Info,
                format!("open: session {session} on {}", self.info.name),
            );
            OpenResult { session, pid: pseudo_pid(), device: self.info.name.clone() }
        });
        self.settle("open", result)
    }

    /// Copies as much of `data` as fits. Partial writes succeed with the
    /// short count; a non-empty write that fits nothing is `BufferFull`.
    pub fn write(&self, data: &[u8]) -> Result<WriteResult, DriverError> {
        let result = self.write_guarded(data);
        self.settle("write", result)
    }

    fn write_guarded(&self, data: &[u8]) -> Result<WriteResult, DriverError> {
        self.ensure_loaded()?;
        self.simulate_latency(self.latency.write);

        let mut ring = self.buffer.try_acquire(Role::Writer, self.clock.now())?;
        // unload may have landed while we slept
        self.ensure_loaded()?;

        let written = ring.write(data);
        if written == 0 && !data.is_empty() {
            return Err(DriverError::BufferFull { requested: data.len() });
        }
        self.state.record_write(written);
        self.sync_gauges(&ring);
        let (used, capacity) = (ring.used(), ring.capacity());
        drop(ring);

        metrics::counter!("chardev_bytes_written_total").increment(written as u64);
        self.emit(
            EventLevel::Debug,
            format!("write: {written}/{} byte(s), buffer {used}/{capacity}", data.len()),
        );
        Ok(WriteResult { bytes_written: written })
    }

    /// Takes up to `max_count` of the oldest bytes. An empty buffer is a
    /// successful zero-length read.
    pub fn read(&self, max_count: usize) -> Result<ReadResult, DriverError> {
        let result = self.read_guarded(max_count);
        self.settle("read", result)
    }

    fn read_guarded(&self, max_count: usize) -> Result<ReadResult, DriverError> {
        self.ensure_loaded()?;
        self.simulate_latency(self.latency.read);

        let mut ring = self.buffer.try_acquire(Role::Reader, self.clock.now())?;
        self.ensure_loaded()?;

        let data = ring.read(max_count);
        self.state.record_read(data.len());
        self.sync_gauges(&ring);
        let (used, capacity) = (ring.used(), ring.capacity());
        drop(ring);

        metrics::counter!("chardev_bytes_read_total").increment(data.len() as u64);
        self.emit(
            EventLevel::Debug,
            format!("read: {}/{max_count} byte(s), buffer {used}/{capacity}", data.len()),
        );
        Ok(ReadResult { bytes_read: data.len(), data })
    }

    /// IOCTL by command name, e.g. `ioctl("SET_BUFFER_SIZE", Some(4096))`.
    pub fn ioctl(&self, command: &str, argument: Option<i64>) -> Result<IoctlOutcome, DriverError> {
        let result = self
            .begin_ioctl()
            .and_then(|()| IoctlCommand::parse(command, argument))
            .and_then(|cmd| self.dispatch(cmd));
        self.settle("ioctl", result)
    }

    /// IOCTL by numeric request code.
    pub fn ioctl_code(&self, code: u32, argument: Option<i64>) -> Result<IoctlOutcome, DriverError> {
        let result = self
            .begin_ioctl()
            .and_then(|()| IoctlCommand::from_code(code, argument))
            .and_then(|cmd| self.dispatch(cmd));
        self.settle("ioctl", result)
    }

    /// IOCTL with an already-resolved command.
    pub fn ioctl_command(&self, command: IoctlCommand) -> Result<IoctlOutcome, DriverError> {
        let result = self.begin_ioctl().and_then(|()| self.dispatch(command));
        self.settle("ioctl", result)
    }

    fn begin_ioctl(&self) -> Result<(), DriverError> {
        self.ensure_loaded()?;
        self.state.record_ioctl();
        Ok(())
    }

    fn dispatch(&self, command: IoctlCommand) -> Result<IoctlOutcome, DriverError> {
        metrics::counter!("chardev_ioctl_total", "cmd" => command.name()).increment(1);
        self.simulate_latency(self.latency.ioctl);

        let message = match command {
            IoctlCommand::ClearBuffer => {
                let mut ring = self.admin_ring()?;
                ring.clear();
                self.sync_gauges(&ring);
                "Buffer cleared".to_owned()
            }
            IoctlCommand::SetBufferSize(size) => {
                let mut ring = self.admin_ring()?;
                ring.resize(size)?;
                self.sync_gauges(&ring);
                format!("Buffer size set to {size} bytes")
            }
            IoctlCommand::EnableLogging => {
                let enabled = self.state.toggle_logging();
                let message = format!("Logging {}", if enabled { "enabled" } else { "disabled" });
                // recorded even when this call just switched logging off
                self.emit_always(EventLevel::Info, format!("ioctl {command}: {message}"));
                return Ok(IoctlOutcome { message });
            }
        };

        self.emit(EventLevel::Info, format!("ioctl {command}: {message}"));
        Ok(IoctlOutcome { message })
    }

    /// Buffer-mutating IOCTLs wait for the in-flight read/write instead of
    /// racing it.
    fn admin_ring(&self) -> Result<AccessGuard<'_, RingBuffer>, DriverError> {
        let ring = self.buffer.acquire(Role::Admin);
        self.ensure_loaded()?;
        Ok(ring)
    }

    /// Ends a session opened by `open`. Never unloads the module.
    pub fn release(&self, session: u64) {
        if !self.state.is_loaded() {
            return;
        }
        self.emit(EventLevel::Info, format!("release: session {session} closed"));
    }

    /*──────────────────────────── module lifecycle ──────────────────────────*/

    /// Unloaded → Loaded. Restarts the counters and the uptime clock; the
    /// buffer keeps its contents.
    pub fn load(&self) {
        if self.state.set_loaded(true) {
            self.emit_always(EventLevel::Warn, "load: module already loaded".to_owned());
            return;
        }
        self.state.reset_stats(self.clock.now());
        self.emit_always(
            EventLevel::Info,
            "Character device driver module loaded successfully".to_owned(),
        );
    }

    /// Loaded → Unloaded. Forcibly zeroes the reader/writer counts and the
    /// wait queue; operations still in flight are not cancelled and will
    /// fail with `DeviceNotLoaded` when they next check.
    pub fn unload(&self) {
        if !self.state.set_loaded(false) {
            self.emit_always(EventLevel::Warn, "unload: module not loaded".to_owned());
            return;
        }
        self.buffer.force_reset();
        self.emit_always(
            EventLevel::Info,
            "Character device driver module unloaded".to_owned(),
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /*──────────────────────────── observation ───────────────────────────────*/

    /// Point-in-time snapshot. Takes no guard and changes nothing.
    pub fn stats(&self) -> StatsSnapshot {
        let now = self.clock.now();
        let stats = self.state.stats();
        let cfg = self.state.config();
        let (capacity, used) = self.state.buffer_gauges();
        let elapsed_ms = (now - stats.started_at).num_milliseconds();

        StatsSnapshot {
            timestamp:                now,
            device_name:              self.info.name.clone(),
            major_number:             self.info.major,
            minor_number:             self.info.minor,
            module_loaded:            self.state.is_loaded(),
            bytes_read:               stats.bytes_read,
            bytes_written:            stats.bytes_written,
            read_count:               stats.read_count,
            write_count:              stats.write_count,
            open_count:               stats.open_count,
            ioctl_count:              stats.ioctl_count,
            error_count:              stats.error_count,
            uptime_seconds:           u64::try_from(elapsed_ms / 1000).unwrap_or(0),
            read_rate_bytes_per_sec:  rate(stats.bytes_read, elapsed_ms),
            write_rate_bytes_per_sec: rate(stats.bytes_written, elapsed_ms),
            buffer_size:              capacity,
            buffer_used:              used,
            buffer_free:              capacity.saturating_sub(used),
            active_readers:           self.buffer.active_readers(),
            active_writers:           self.buffer.active_writers(),
            queue_length:             self.buffer.queue_len(),
            logging_enabled:          cfg.logging_enabled,
            interrupt_enabled:        cfg.interrupt_enabled,
            dma_enabled:              cfg.dma_enabled,
        }
    }

    pub fn health(&self) -> Health {
        Health {
            status:    if self.state.is_loaded() { "healthy" } else { "unloaded" },
            version:   self.info.version.clone(),
            timestamp: self.clock.now(),
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The controller guarding the ring, for callers that need to hold
    /// exclusive access across several steps.
    pub fn access(&self) -> &AccessController<RingBuffer> {
        &self.buffer
    }

    /*──────────────────────────── private helpers ───────────────────────────*/

    fn ensure_loaded(&self) -> Result<(), DriverError> {
        if self.state.is_loaded() {
            Ok(())
        } else {
            Err(DriverError::DeviceNotLoaded)
        }
    }

    fn simulate_latency(&self, cost: Duration) {
        if !cost.is_zero() {
            self.clock.sleep(cost);
        }
    }

    fn sync_gauges(&self, ring: &RingBuffer) {
        self.state.sync_buffer(ring.capacity(), ring.used());
        metrics::gauge!("chardev_buffer_used_bytes").set(ring.used() as f64);
    }

    /// Counts a failed operation exactly once. Runs after the guard is gone.
    fn settle<T>(&self, op: &'static str, result: Result<T, DriverError>) -> Result<T, DriverError> {
        if let Err(err) = &result {
            self.state.record_error();
            metrics::counter!("chardev_errors_total", "op" => op, "kind" => err.kind())
                .increment(1);
            let level = match err {
                DriverError::Busy => EventLevel::Warn,
                _ => EventLevel::Error,
            };
            self.emit(level, format!("{op} failed: {err}"));
        }
        result
    }

    /// Debug/Info events are dropped while logging is switched off.
    fn emit(&self, level: EventLevel, message: String) {
        if level < EventLevel::Warn && !self.state.logging_enabled() {
            return;
        }
        self.emit_always(level, message);
    }

    fn emit_always(&self, level: EventLevel, message: String) {
        self.events.record(level, message, self.clock.now());
    }
}
