//! Request audit log.
//!
//! One line per decision: who asked (`src`), where the request was headed
//! (`dest`, credentials stripped) and what happened (`msg`).

use std::fmt;
use std::net::SocketAddr;

use chrono::{SecondsFormat, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Source and destination of one inbound request.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub src: SocketAddr,
    pub dest: String,
}

impl LogEntry {
    pub fn new(src: SocketAddr, dest: impl Into<String>) -> Self {
        Self {
            src,
            dest: dest.into(),
        }
    }
}

/// A formatted audit line.
#[derive(Debug, Clone)]
pub struct LogLine<'a> {
    pub datetime: String,
    pub entry: &'a LogEntry,
    pub msg: &'a str,
}

impl fmt::Display for LogLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "datetime: \"{}\", src: \"{}\", dest: \"{}\", msg: \"{}\"",
            self.datetime,
            self.entry.src.ip(),
            self.entry.dest,
            self.msg
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl RequestLogger {
    pub fn line<'a>(&self, entry: &'a LogEntry, msg: &'a str) -> LogLine<'a> {
        LogLine {
            datetime: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entry,
            msg,
        }
    }

    pub fn log(&self, level: LogLevel, entry: &LogEntry, msg: &str) {
        let line = self.line(entry, msg);
        match level {
            LogLevel::Info => tracing::info!(target: "proxilate::request", "{line}"),
            LogLevel::Warn => tracing::warn!(target: "proxilate::request", "{line}"),
            LogLevel::Error => tracing::error!(target: "proxilate::request", "{line}"),
        }
    }
}
