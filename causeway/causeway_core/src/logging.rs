//! Session log records and the sinks they are written to
//!
//! A [`Session`](crate::Session) turns each log call into a [`LogRecord`]
//! tagged with its identity and owning context. The [`Logger`] filters and
//! renders records according to [`LoggingConfig`] and hands the resulting
//! line to a [`LogSink`], which owns the actual destination.

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::config::LoggingConfig;

/// Severity of a session log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    Info,
    /// Something unexpected that was handled
    Warn,
    /// A failed operation
    Error,
    /// A failure that needs immediate attention
    Critical,
}

impl LogLevel {
    /// Upper-case name used in text lines
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// The `tracing` level records at this severity are emitted at
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" | "err" => LogLevel::Error,
            "critical" | "crit" | "fatal" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }
}

/// One log line emitted on behalf of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp in RFC 3339 format
    pub timestamp: String,

    /// Severity
    pub level: LogLevel,

    /// Free-form category, usually the emitting component
    pub category: String,

    /// Message text
    pub message: String,

    /// Identity of the emitting session
    pub session: String,

    /// Ordinal of the context that owns the emitting session
    pub context: u64,

    /// Process boundaries the session has crossed
    #[serde(skip_serializing_if = "is_zero")]
    #[serde(default)]
    pub hops: u32,

    /// Ordinal of the context the session was joined from
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub origin: Option<u64>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl LogRecord {
    /// Create a record stamped with the current time
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            category: category.into(),
            message: message.into(),
            session: String::new(),
            context: 0,
            hops: 0,
            origin: None,
        }
    }

    /// Render the record as a text line
    pub fn to_line(&self, include_hops: bool) -> String {
        let mut line = format!(
            "[{}] {} {} - {} [session:{}] [context:{}]",
            self.timestamp, self.level, self.category, self.message, self.session, self.context
        );

        if include_hops && self.hops > 0 {
            match self.origin {
                Some(origin) => line.push_str(&format!(" [hops:{},origin:{}]", self.hops, origin)),
                None => line.push_str(&format!(" [hops:{}]", self.hops)),
            }
        }

        line
    }

    /// Render the record as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line(true))
    }
}

/// Destination for rendered session log lines.
///
/// Writes are fire-and-forget; a sink deals with its own failures.
pub trait LogSink: Send + Sync {
    /// Write one rendered line
    fn write(&self, level: LogLevel, line: &str);

    /// Get the name of the sink
    fn name(&self) -> &str;
}

/// Sink forwarding lines to `tracing` events
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "causeway::session", "{}", line),
            LogLevel::Info => tracing::info!(target: "causeway::session", "{}", line),
            LogLevel::Warn => tracing::warn!(target: "causeway::session", "{}", line),
            LogLevel::Error | LogLevel::Critical => {
                tracing::error!(target: "causeway::session", "{}", line)
            }
        }
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}

/// Sink that keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Forget all lines
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, _level: LogLevel, line: &str) {
        self.lines.lock().push(line.to_string());
    }

    fn name(&self) -> &str {
        "memory_sink"
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn write(&self, _level: LogLevel, _line: &str) {}

    fn name(&self) -> &str {
        "noop_sink"
    }
}

/// Filters, renders and forwards records to a sink
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    config: LoggingConfig,
}

impl Logger {
    /// Create a logger writing to `sink`
    pub fn new(sink: Arc<dyn LogSink>, config: LoggingConfig) -> Self {
        Self { sink, config }
    }

    /// Whether a record at `level` would be written
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.config.enabled && level >= self.config.level
    }

    /// Render and write a record
    pub fn emit(&self, record: &LogRecord) {
        if !self.enabled(record.level) {
            return;
        }

        let line = if self.config.structured {
            record
                .to_json()
                .unwrap_or_else(|_| record.to_line(self.config.include_hops))
        } else {
            record.to_line(self.config.include_hops)
        };

        self.sink.write(record.level, &line);
    }

    /// Get the name of the underlying sink
    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sink", &self.sink.name())
            .field("config", &self.config)
            .finish()
    }
}
