// src/config/model.rs

use serde::Deserialize;
use shared::constants::{
    DEFAULT_BUFFER_SIZE, DEVICE_NAME, EVENT_LOG_CAPACITY, MAJOR_NUMBER, MAX_BUFFER_SIZE,
    MINOR_NUMBER,
};
use std::time::Duration;
use thiserror::Error;

/// Top-level config. Every table is optional in the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device:   DeviceConfig,
    pub buffer:   BufferConfig,
    pub features: FeatureConfig,
    pub latency:  LatencyConfig,
    pub events:   EventsConfig,
    pub logging:  LoggingConfig,
}

/// Mirror of the `[device]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name:  String,
    pub major: u32,
    pub minor: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { name: DEVICE_NAME.into(), major: MAJOR_NUMBER, minor: MINOR_NUMBER }
    }
}

/// Mirror of the `[buffer]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub default_size: usize,
    pub max_size:     usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { default_size: DEFAULT_BUFFER_SIZE, max_size: MAX_BUFFER_SIZE }
    }
}

/// Mirror of the `[features]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub logging_enabled:   bool,
    pub interrupt_enabled: bool,
    pub dma_enabled:       bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { logging_enabled: true, interrupt_enabled: false, dma_enabled: false }
    }
}

/// Mirror of the `[latency]` table, as humantime strings ("2ms", "1s").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub read:  String,
    pub write: String,
    pub ioctl: String,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self { read: "0ms".into(), write: "0ms".into(), ioctl: "0ms".into() }
    }
}

/// Parsed simulated I/O cost per operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latency {
    pub read:  Duration,
    pub write: Duration,
    pub ioctl: Duration,
}

impl LatencyConfig {
    pub fn parse(&self) -> Result<Latency, ConfigError> {
        Ok(Latency {
            read:  parse_duration(&self.read)?,
            write: parse_duration(&self.write)?,
            ioctl: parse_duration(&self.ioctl)?,
        })
    }
}

fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| ConfigError::InvalidDuration(raw.into(), e))
}

/// Mirror of the `[events]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: EVENT_LOG_CAPACITY }
    }
}

/// Mirror of the `[logging]` table
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]                   pub enable: bool,
    #[serde(default)]                   pub file:   Option<String>,
    #[serde(default = "default_level")] pub level:  String,
}
fn default_level() -> String { "INFO".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enable: false, file: None, level: default_level() }
    }
}

/// All the ways config loading can go wrong
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration '{0}': {1}")]
    InvalidDuration(String, #[source] humantime::DurationError),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Config {
    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field:  "buffer.max_size",
                reason: "must be greater than zero".into(),
            });
        }
        if self.buffer.default_size == 0 || self.buffer.default_size > self.buffer.max_size {
            return Err(ConfigError::InvalidValue {
                field:  "buffer.default_size",
                reason: format!(
                    "{} is outside 1..={}",
                    self.buffer.default_size, self.buffer.max_size
                ),
            });
        }
        if self.events.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field:  "events.capacity",
                reason: "must be greater than zero".into(),
            });
        }
        self.latency.parse()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_stock_device() {
        let cfg = Config::default();
        assert_eq!(cfg.device.name, "/dev/mychardev");
        assert_eq!(cfg.device.major, 250);
        assert_eq!(cfg.buffer.default_size, 1024);
        assert_eq!(cfg.buffer.max_size, 8192);
        assert!(cfg.features.logging_enabled);
        assert_eq!(cfg.latency.parse().unwrap(), Latency::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_tables_fill_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [buffer]
            default_size = 16

            [latency]
            write = "5ms"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.buffer.default_size, 16);
        assert_eq!(cfg.buffer.max_size, 8192);
        assert_eq!(cfg.latency.parse().unwrap().write, Duration::from_millis(5));
        assert_eq!(cfg.logging.level, "INFO");
    }

    #[test]
    fn default_size_above_max_is_rejected() {
        let mut cfg = Config::default();
        cfg.buffer.default_size = 9000;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "buffer.default_size", .. }));
    }

    #[test]
    fn garbage_duration_is_rejected() {
        let mut cfg = Config::default();
        cfg.latency.read = "soon".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDuration(raw, _)) if raw == "soon"));
    }
}
