//! Point-in-time view of the device for dashboards and exporters.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything `getStats` reports. Building one has no side effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub timestamp:                DateTime<Utc>,
    pub device_name:              String,
    pub major_number:             u32,
    pub minor_number:             u32,
    pub module_loaded:            bool,

    pub bytes_read:               u64,
    pub bytes_written:            u64,
    pub read_count:               u64,
    pub write_count:              u64,
    pub open_count:               u64,
    pub ioctl_count:              u64,
    pub error_count:              u64,

    pub uptime_seconds:           u64,
    pub read_rate_bytes_per_sec:  f64,
    pub write_rate_bytes_per_sec: f64,

    pub buffer_size:              usize,
    pub buffer_used:              usize,
    pub buffer_free:              usize,

    pub active_readers:           usize,
    pub active_writers:           usize,
    pub queue_length:             usize,

    pub logging_enabled:          bool,
    pub interrupt_enabled:        bool,
    pub dma_enabled:              bool,
}

/// Bytes per second over `elapsed_ms`; zero before any time has passed.
pub(crate) fn rate(bytes: u64, elapsed_ms: i64) -> f64 {
    if elapsed_ms <= 0 {
        return 0.0;
    }
    bytes as f64 * 1000.0 / elapsed_ms as f64
}

#[cfg(test)]
mod tests {
    use super::rate;

    #[test]
    fn rate_handles_zero_and_negative_elapsed() {
        assert_eq!(rate(100, 0), 0.0);
        assert_eq!(rate(100, -5), 0.0);
    }

    #[test]
    fn rate_is_bytes_per_second() {
        assert_eq!(rate(100, 10_000), 10.0);
        assert_eq!(rate(3, 500), 6.0);
    }
}
