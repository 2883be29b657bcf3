// src/config/loader.rs

//! # Configuration Loader
//!
//! Reads the TOML file, deserializes it into `Config` and validates it.

use crate::chardev_log;
use crate::config::model::{Config, ConfigError};
use log::Level;
use std::{fs, path::Path};

/// Load, parse and validate the configuration at `path`.
/// Logs at DEBUG before reading and INFO on success.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    chardev_log!(Level::Debug, "config", "Reading config from {:?}", path);
    let txt = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&txt)?;
    cfg.validate()?;
    chardev_log!(Level::Info, "config", "Loaded config from {:?}", path);
    Ok(cfg)
}

/// Like [`load`], but a missing file yields `Config::default()`.
/// A file that exists but does not parse is still an error.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        chardev_log!(Level::Warn, "config", "{:?} not found, using built-in defaults", path);
        return Ok(Config::default());
    }
    load(path)
}
