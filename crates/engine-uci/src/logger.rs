//! Stderr logger that flushes after every record
//!
//! The UCI protocol runs on stdout, so log output goes to stderr and
//! must not sit in a buffer when running as a GUI subprocess.

use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};

struct FlushingStderrLogger;

impl Log for FlushingStderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[{}] {}", record.level(), record.args());
        let _ = stderr.flush();
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: FlushingStderrLogger = FlushingStderrLogger;

/// Install the logger. Fails if a logger is already set.
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    log::set_logger(&LOGGER).map_err(|e| anyhow::anyhow!("logger already installed: {e}"))?;
    log::set_max_level(level);
    Ok(())
}
