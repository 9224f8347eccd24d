//! Human-readable run log
//!
//! The run log is the flat, timestamped list of lines shown to the operator
//! and attached to the report. Workers write into a private [`FileLog`];
//! the coordinator merges a finished file's lines into the shared [`RunLog`]
//! in one step, so lines of concurrent files never interleave.
//!
//! Every emitted line is forwarded to `tracing` as well.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::Serialize;
use sheetload_common::logging::LogLevel;
use tracing::{debug, error, info, trace, warn};

/// Timestamp layout of rendered lines
pub const LINE_TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// One line of the run log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    /// File the line belongs to, `None` for scan-level lines
    pub file: Option<String>,
    pub message: String,
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - ", self.at.format(LINE_TIMESTAMP_FORMAT))?;
        if let Some(ref file) = self.file {
            write!(f, "[{}] ", file)?;
        }
        f.write_str(&self.message)
    }
}

/// Destination for run-log lines
pub trait LogSink: Send + Sync {
    fn emit(&self, level: LogLevel, message: &str);

    fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(LogLevel::Error, message);
    }
}

fn forward(level: LogLevel, file: Option<&str>, message: &str) {
    let file = file.unwrap_or("-");
    match level {
        LogLevel::Trace => trace!(file, "{}", message),
        LogLevel::Debug => debug!(file, "{}", message),
        LogLevel::Info => info!(file, "{}", message),
        LogLevel::Warn => warn!(file, "{}", message),
        LogLevel::Error => error!(file, "{}", message),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicking worker must not take the log down with it
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Lines buffered for a single file while it is being processed
#[derive(Debug)]
pub struct FileLog {
    file: String,
    lines: Mutex<Vec<LogLine>>,
}

impl FileLog {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into(), lines: Mutex::new(Vec::new()) }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Remove and return everything buffered so far
    pub fn take_lines(&self) -> Vec<LogLine> {
        std::mem::take(&mut *lock(&self.lines))
    }

    pub fn len(&self) -> usize {
        lock(&self.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for FileLog {
    fn emit(&self, level: LogLevel, message: &str) {
        forward(level, Some(&self.file), message);
        lock(&self.lines).push(LogLine {
            at: Local::now(),
            level,
            file: Some(self.file.clone()),
            message: message.to_string(),
        });
    }
}

/// Shared, append-only log for a whole scan
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Mutex<Vec<LogLine>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished file's lines as one contiguous block
    ///
    /// The lines were already forwarded to `tracing` when emitted.
    pub fn absorb(&self, lines: &[LogLine]) {
        lock(&self.lines).extend_from_slice(lines);
    }

    pub fn lines(&self) -> Vec<LogLine> {
        lock(&self.lines).clone()
    }

    /// Rendered lines, one per entry
    pub fn render(&self) -> Vec<String> {
        lock(&self.lines).iter().map(ToString::to_string).collect()
    }

    pub fn clear(&self) {
        lock(&self.lines).clear();
    }
}

impl LogSink for RunLog {
    fn emit(&self, level: LogLevel, message: &str) {
        forward(level, None, message);
        lock(&self.lines).push(LogLine {
            at: Local::now(),
            level,
            file: None,
            message: message.to_string(),
        });
    }
}
