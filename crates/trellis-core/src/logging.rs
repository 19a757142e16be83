//! Engine logger and thread naming
//!
//! A `log::Log` implementation for the `log` facade the rest of the
//! crate records against. Each line carries a millisecond-precision
//! local timestamp, the level (with optional ANSI color on the
//! console), the current thread's name when one has been set, and the
//! message. An optional file sink receives the same lines without
//! color codes.
//!
//! Backend callback threads are not spawned by us, so their names are
//! kept in a thread-local slot rather than on `std::thread`; the
//! callback handlers label themselves on first entry.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{Level, LevelFilter, Metadata, Record};

thread_local! {
    static THREAD_NAME: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Name the current thread for log output. Safe to call from backend
/// callback threads the engine did not spawn.
pub fn set_thread_name(name: &str) {
    THREAD_NAME.with(|slot| *slot.borrow_mut() = Some(name.to_string()));
}

/// The current thread's log name, if one has been set.
pub fn thread_name() -> Option<String> {
    THREAD_NAME.with(|slot| slot.borrow().clone())
}

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_BOLD: &str = "\x1b[1m";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[32m",
        Level::Debug | Level::Trace => "\x1b[36m",
    }
}

/// Configuration for [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Maximum level to record.
    pub level: LevelFilter,
    /// Write lines to stderr.
    pub console: bool,
    /// ANSI color on the console sink.
    pub colors: bool,
    /// Optional file sink path (appended to).
    pub log_file: Option<std::path::PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            console: true,
            colors: true,
            log_file: None,
        }
    }
}

struct EngineLogger {
    console: bool,
    colors: bool,
    // Single mutex over the sinks; never held across user code.
    file: Option<Mutex<File>>,
    stderr: Mutex<()>,
}

fn format_prefix() -> (String, String) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let thread = thread_name()
        .map(|name| format!("[Thread: {}] ", name))
        .unwrap_or_default();
    (timestamp.to_string(), thread)
}

impl log::Log for EngineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let (timestamp, thread) = format_prefix();
        let level = record.level();

        if self.console {
            let _guard = self.stderr.lock().unwrap();
            if self.colors {
                eprintln!(
                    "[{}] {}[{}]{} {}{}{}{}",
                    timestamp,
                    level_color(level),
                    level,
                    COLOR_RESET,
                    if thread.is_empty() { "" } else { COLOR_BOLD },
                    thread,
                    if thread.is_empty() { "" } else { COLOR_RESET },
                    record.args()
                );
            } else {
                eprintln!("[{}] [{}] {}{}", timestamp, level, thread, record.args());
            }
        }

        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap();
            let _ = writeln!(file, "[{}] [{}] {}{}", timestamp, level, thread, record.args());
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().unwrap().flush();
        }
    }
}

/// Install the engine logger as the process-wide `log` sink.
///
/// Returns an error if a logger is already installed or the log file
/// cannot be opened.
pub fn init(config: LogConfig) -> Result<(), InitError> {
    let file = match &config.log_file {
        Some(path) => Some(Mutex::new(open_log_file(path)?)),
        None => None,
    };

    let logger = EngineLogger {
        console: config.console,
        colors: config.colors,
        file,
        stderr: Mutex::new(()),
    };

    log::set_boxed_logger(Box::new(logger)).map_err(|_| InitError::AlreadyInstalled)?;
    log::set_max_level(config.level);
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File, InitError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| InitError::LogFile {
            path: path.display().to_string(),
            source,
        })
}

/// Errors from [`init`].
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("a logger is already installed for this process")]
    AlreadyInstalled,

    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_name_is_per_thread() {
        set_thread_name("control");
        assert_eq!(thread_name().as_deref(), Some("control"));

        let handle = std::thread::spawn(|| {
            assert_eq!(thread_name(), None);
            set_thread_name("worker");
            thread_name()
        });
        assert_eq!(handle.join().unwrap().as_deref(), Some("worker"));

        // Unchanged on this thread.
        assert_eq!(thread_name().as_deref(), Some("control"));
    }

    #[test]
    fn level_colors_are_distinct() {
        let levels = [Level::Error, Level::Warn, Level::Info, Level::Debug];
        for (i, a) in levels.iter().enumerate() {
            for b in &levels[i + 1..] {
                assert_ne!(level_color(*a), level_color(*b));
            }
        }
    }
}
