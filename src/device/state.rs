//! Module lifecycle flag, per-operation counters and runtime feature
//! switches.

use crate::config::Config;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

/// Monotonic counters; only `reset` (on re-load) moves them backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub bytes_read:    u64,
    pub bytes_written: u64,
    pub read_count:    u64,
    pub write_count:   u64,
    pub open_count:    u64,
    pub ioctl_count:   u64,
    pub error_count:   u64,
    pub started_at:    DateTime<Utc>,
}

impl Stats {
    fn fresh(started_at: DateTime<Utc>) -> Self {
        Self {
            bytes_read: 0,
            bytes_written: 0,
            read_count: 0,
            write_count: 0,
            open_count: 0,
            ioctl_count: 0,
            error_count: 0,
            started_at,
        }
    }
}

/// Feature switches that IOCTLs may flip at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub logging_enabled:   bool,
    pub interrupt_enabled: bool,
    pub dma_enabled:       bool,
}

impl From<&Config> for RuntimeConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            logging_enabled:   cfg.features.logging_enabled,
            interrupt_enabled: cfg.features.interrupt_enabled,
            dma_enabled:       cfg.features.dma_enabled,
        }
    }
}

#[derive(Debug)]
pub struct DeviceState {
    loaded: AtomicBool,
    stats:  Mutex<Stats>,
    config: Mutex<RuntimeConfig>,
    /// `(capacity, used)` mirrored from the ring while the guard is held, so
    /// snapshots never lock the ring. One lock keeps the pair consistent.
    gauges: Mutex<(usize, usize)>,
}

impl DeviceState {
    /// A freshly loaded module.
    pub fn new(config: RuntimeConfig, capacity: usize, now: DateTime<Utc>) -> Self {
        Self {
            loaded: AtomicBool::new(true),
            stats:  Mutex::new(Stats::fresh(now)),
            config: Mutex::new(config),
            gauges: Mutex::new((capacity, 0)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Sets the flag and returns the previous value.
    pub fn set_loaded(&self, loaded: bool) -> bool {
        self.loaded.swap(loaded, Ordering::AcqRel)
    }

    pub fn stats(&self) -> Stats {
        *self.lock_stats()
    }

    pub fn reset_stats(&self, now: DateTime<Utc>) {
        *self.lock_stats() = Stats::fresh(now);
    }

    pub fn record_open(&self) {
        self.lock_stats().open_count += 1;
    }

    pub fn record_read(&self, bytes: usize) {
        let mut stats = self.lock_stats();
        stats.read_count += 1;
        stats.bytes_read += bytes as u64;
    }

    pub fn record_write(&self, bytes: usize) {
        let mut stats = self.lock_stats();
        stats.write_count += 1;
        stats.bytes_written += bytes as u64;
    }

    pub fn record_ioctl(&self) {
        self.lock_stats().ioctl_count += 1;
    }

    pub fn record_error(&self) {
        self.lock_stats().error_count += 1;
    }

    pub fn config(&self) -> RuntimeConfig {
        *self.lock_config()
    }

    pub fn logging_enabled(&self) -> bool {
        self.lock_config().logging_enabled
    }

    /// Flips `logging_enabled` and returns the new value.
    pub fn toggle_logging(&self) -> bool {
        let mut cfg = self.lock_config();
        cfg.logging_enabled = !cfg.logging_enabled;
        cfg.logging_enabled
    }

    pub fn sync_buffer(&self, capacity: usize, used: usize) {
        *self.gauges.lock().unwrap_or_else(PoisonError::into_inner) = (capacity, used);
    }

    /// `(capacity, used)` as of the last guarded mutation.
    pub fn buffer_gauges(&self) -> (usize, usize) {
        *self.gauges.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_config(&self) -> MutexGuard<'_, RuntimeConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
