use crate::output_manager::OutputManager;
use chrono::{DateTime, Utc};
use std::{
    fmt,
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
};

const LOG_FILENAME: &str = "mandarin-master-debug.log";

/// Severity tag written in front of every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    /// Recoverable failures: storage, generation, rejected navigation.
    Warn,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Debug => "DEBUG",
            Self::Warn => "WARN",
        })
    }
}

/// Append a timestamped line to the shared debug log. Errors are reported to stderr only.
pub fn log_debug(message: &str) {
    log(LogLevel::Debug, message);
}

pub fn log_warn(message: &str) {
    log(LogLevel::Warn, message);
}

fn log(level: LogLevel, message: &str) {
    let line = format_line(Utc::now(), level, message);
    if let Err(err) = append_line(&line) {
        eprintln!("[mandarin_master::log_util] failed to write debug log: {}", err);
    }
}

/// `[<rfc3339>] LEVEL message`, with embedded newlines folded so one event stays on one line.
fn format_line(at: DateTime<Utc>, level: LogLevel, message: &str) -> String {
    let message = message.trim_end().replace('\n', " \u{21b5} ");
    format!("[{}] {:<5} {}", at.to_rfc3339(), level, message)
}

fn append_line(line: &str) -> io::Result<()> {
    let manager = OutputManager::new();
    let path = resolve_log_path(&manager)?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

fn resolve_log_path(manager: &OutputManager) -> io::Result<PathBuf> {
    let mut dir = manager.output_directory().map_err(io::Error::other)?;
    std::fs::create_dir_all(&dir)?;
    dir.push(LOG_FILENAME);
    Ok(dir)
}
