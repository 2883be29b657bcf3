// src/macros.rs

/// Logs through the `log` facade with the component as the record target.
///
/// The `fern` dispatcher installed by the binary renders it as:
/// `[2025-04-25T16:32:10+02:00][DEBUG][ring][pid=4568][tid=ThreadId(3)] message`
///
/// ```ignore
/// chardev_log!(log::Level::Info, "driver", "module loaded");
/// chardev_log!(log::Level::Error, "config", "load failed: {}", err);
/// ```
#[macro_export]
macro_rules! chardev_log {
    ($level:expr, $component:expr, $fmt:expr $(, $($arg:tt)+)?) => {
        log::log!(
            target: concat!("chardev::", $component),
            $level,
            $fmt
            $(, $($arg)+)?
        )
    };
}

#[cfg(test)]
mod tests {
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::Mutex;

    /// A tiny in-memory logger that captures up to DEBUG.
    struct MemoryLogger {
        buffer: Mutex<String>,
    }

    impl MemoryLogger {
        const fn new() -> Self {
            MemoryLogger { buffer: Mutex::new(String::new()) }
        }

        fn contents(&self) -> String {
            self.buffer.lock().unwrap().clone()
        }
    }

    static LOGGER: MemoryLogger = MemoryLogger::new();

    impl Log for MemoryLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Debug
        }
        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                let mut buf = self.buffer.lock().unwrap();
                buf.push_str(&format!("[{}][{}] {}\n", record.level(), record.target(), record.args()));
            }
        }
        fn flush(&self) {}
    }

    #[test]
    fn chardev_log_uses_component_as_target() {
        // other tests in this binary log too, so only look for our own line
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Debug);

        chardev_log!(Level::Debug, "macro-test", "Answer={}!", 42);

        let output = LOGGER.contents();
        assert!(output.contains("[DEBUG][chardev::macro-test] Answer=42!"), "got: {}", output);
    }
}
