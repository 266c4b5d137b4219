//! Console log backend.
//!
//! Implements [`log::Log`] by formatting each record with a boot-relative
//! timestamp and writing it through a [`CaptureTee`], so every log line
//! reaches the serial console (UART / USB-CDC in production) and the
//! capture ring served at `/serialOut`.
//!
//! Line format: `[<millis since boot, 10 wide>] <level>: <message>\n`.

use std::io::Write;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::capture::{CaptureReader, CaptureTee};

/// Console the tee forwards to.
pub type ConsoleSink = Box<dyn Write + Send>;

pub struct CaptureLogger {
    tee: Mutex<CaptureTee<ConsoleSink>>,
    boot: Instant,
    level: LevelFilter,
}

impl CaptureLogger {
    pub fn new(console: ConsoleSink, level: LevelFilter) -> Self {
        Self {
            tee: Mutex::new(CaptureTee::new(console)),
            boot: Instant::now(),
            level,
        }
    }

    pub fn reader(&self) -> CaptureReader {
        self.tee
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reader()
    }

    fn format(&self, record: &Record<'_>) -> String {
        let millis = self.boot.elapsed().as_millis();
        format!(
            "[{:>10}] {}: {}\n",
            millis,
            level_char(record.level()),
            record.args()
        )
    }
}

fn level_char(level: Level) -> char {
    match level {
        Level::Error => 'E',
        Level::Warn => 'W',
        Level::Info => 'I',
        Level::Debug => 'D',
        Level::Trace => 'T',
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        self.tee
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_bytes(line.as_bytes());
    }

    fn flush(&self) {
        let _ = self
            .tee
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush();
    }
}

static LOGGER: OnceLock<CaptureLogger> = OnceLock::new();

/// Install the capture logger as the global `log` backend.
///
/// Call once, first thing in `main`. Returns the reader the web interface
/// serves the captured output from.
pub fn init(console: ConsoleSink, level: LevelFilter) -> Result<CaptureReader, SetLoggerError> {
    let logger = LOGGER.get_or_init(|| CaptureLogger::new(console, level));
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(logger.reader())
}
