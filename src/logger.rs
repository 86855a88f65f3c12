//! Where the logger lives
//!
//! The library itself only ever goes through the `log` macros; this module provides the logger the
//! `piecebuf` binary installs to get those messages into a file. Each line is prefixed with a
//! timestamp and the level of the message.

use std::fs::File;
use std::io::{self, Write};
use std::mem;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use lazy_static::lazy_static;
use log::{Metadata, Record, SetLoggerError};

lazy_static! {
    /// The global log file
    ///
    /// This lock is provided both to sync writes to whatever log file we're using, AND to allow
    /// changing the file at runtime.
    static ref LOG: Arc<Mutex<Option<File>>> = Arc::new(Mutex::new(None));
}

const DEFAULT_LEVEL: log::LevelFilter = log::LevelFilter::Warn;

/// Initializes the logging utilities, setting the global logger to the one given here
///
/// This should only be called once; later calls return an error from the `log` crate.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(DEFAULT_LEVEL);
    Ok(())
}

/// Creates (or truncates) the file at `path` and starts logging to it, returning the previous
/// log file, if there was one
pub fn set_file_path(path: impl AsRef<Path>) -> io::Result<Option<File>> {
    let file = File::create(path)?;
    Ok(set_file(file))
}

/// Sets the log file to the given file handle, returning the old one, if it was present
pub fn set_file(file: File) -> Option<File> {
    mem::replace(&mut *lock(), Some(file))
}

/// Sets the application-wide logging level, returning the previous one
pub fn set_level(level: log::LevelFilter) -> log::LevelFilter {
    let previous = log::max_level();
    log::set_max_level(level);
    previous
}

/// Returns whether there is currently a file being logged to
pub fn logging() -> bool {
    lock().is_some()
}

/// Returns the current level of the logger
pub fn level() -> log::LevelFilter {
    log::max_level()
}

// A panic while holding the lock can only have happened mid-write; the file itself is still fine
// to use.
fn lock() -> MutexGuard<'static, Option<File>> {
    LOG.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The public-facing logger. This is an empty struct that uses the internal functions of the rest
/// of the logging utilities to perform the logging.
pub struct Logger;

/// A dummy value that allows a static reference to the global logger
pub static LOGGER: Logger = Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut guard = lock();

        // We only log if we actually have a file to log to
        if let Some(log_file) = guard.as_mut() {
            let result = writeln!(
                log_file,
                "{} {:<5} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            );

            // There's nowhere to report a failure to log, so we stop trying instead of failing
            // again on every message.
            if let Err(e) = result {
                *guard = None;
                eprintln!("piecebuf: disabling logging after write error: {}", e);
            }
        }
    }

    fn flush(&self) {
        let mut guard = lock();
        if let Some(file) = guard.as_mut() {
            if file.flush().is_err() {
                *guard = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log};
    use std::fs;

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piecebuf.log");

        set_file_path(&path).unwrap();
        set_level(log::LevelFilter::Info);
        assert!(logging());

        LOGGER.log(
            &Record::builder()
                .args(format_args!("reload finished"))
                .level(Level::Info)
                .target("piecebuf::sync")
                .build(),
        );
        LOGGER.log(
            &Record::builder()
                .args(format_args!("too detailed"))
                .level(Level::Trace)
                .target("piecebuf::sync")
                .build(),
        );
        LOGGER.flush();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("INFO  [piecebuf::sync] reload finished"));
        assert!(!contents.contains("too detailed"));
    }
}
