// src/main.rs

//! Console entry point.
//!
//! 1. Load configuration (first argument, or `default.toml` next to the exe);
//!    an optional second argument sets the number of workload rounds
//! 2. Set up structured logging
//! 3. Build one device and hammer it from writer and reader threads
//! 4. Log the final stats snapshot as JSON

use anyhow::{Context, Result};
use chardev::{Config, DeviceDriver, DriverError, config::model::LoggingConfig};
use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::{
    path::{Path, PathBuf},
    process,
    sync::{Arc, Barrier},
    thread,
};

const WRITERS: usize = 2;
const READERS: usize = 2;
const DEFAULT_ROUNDS: usize = 200;

/// Directory that contains the running executable.
fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot determine exe path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable must live in some directory")
}

/// Configure global logging as requested in `[logging]`.
fn setup_logging(exe_dir: &Path, logging: &LoggingConfig) -> Result<(), fern::InitError> {
    let level = match logging.level.to_uppercase().as_str() {
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let log_path = logging
        .enable
        .then(|| exe_dir.join(logging.file.as_deref().unwrap_or("chardev.log")));

    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}][pid={}][tid={:?}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                process::id(),
                thread::current().id(),
                msg
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = log_path {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

/// Writers push numbered frames, readers drain; contention shows up as
/// `Busy` and is simply retried on the next round.
fn run_workload(driver: &Arc<DeviceDriver>, rounds: usize) {
    let start = Arc::new(Barrier::new(WRITERS + READERS));
    let mut handles = Vec::with_capacity(WRITERS + READERS);

    for id in 0..WRITERS {
        let driver = Arc::clone(driver);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            let session = driver.open().map(|s| s.session).ok();
            start.wait();
            for round in 0..rounds {
                let frame = format!("w{id}:{round};");
                match driver.write(frame.as_bytes()) {
                    Ok(_) | Err(DriverError::Busy) | Err(DriverError::BufferFull { .. }) => {}
                    Err(e) => log::warn!("writer {id} stopping: {e}"),
                }
            }
            if let Some(session) = session {
                driver.release(session);
            }
        }));
    }

    for id in 0..READERS {
        let driver = Arc::clone(driver);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            let session = driver.open().map(|s| s.session).ok();
            start.wait();
            for _ in 0..rounds {
                if let Err(e) = driver.read(64) {
                    if e != DriverError::Busy {
                        log::warn!("reader {id} stopping: {e}");
                        break;
                    }
                }
            }
            if let Some(session) = session {
                driver.release(session);
            }
        }));
    }

    for handle in handles {
        if handle.join().is_err() {
            log::error!("worker thread panicked");
        }
    }
}

fn main() -> Result<()> {
    let exe_dir = exe_dir()?;
    let mut args = std::env::args().skip(1);
    let cfg_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| exe_dir.join("default.toml"));
    let rounds = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid round count {raw:?}"))?,
        None => DEFAULT_ROUNDS,
    };

    let config: Config = chardev::config::load_or_default(&cfg_path)
        .with_context(|| format!("loading {}", cfg_path.display()))?;
    setup_logging(&exe_dir, &config.logging).context("logging setup failed")?;

    let driver = Arc::new(DeviceDriver::new(&config).context("building device")?);
    log::info!(
        "{} v{} ready (major {}, minor {})",
        driver.info().name,
        driver.info().version,
        driver.info().major,
        driver.info().minor
    );

    run_workload(&driver, rounds);

    let stats = driver.stats();
    log::info!("final stats:\n{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
