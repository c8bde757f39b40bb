//! Console sink for session log lines

use std::io::Write;

use causeway_core::{LogLevel, LogSink};

/// Stream a [`ConsoleSink`] writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Writes each session log line to the terminal
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    stream: Stream,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            stream: Stream::Stdout,
        }
    }

    pub fn stderr() -> Self {
        Self {
            stream: Stream::Stderr,
        }
    }
}

impl LogSink for ConsoleSink {
    fn write(&self, _level: LogLevel, line: &str) {
        // A closed pipe must not take the process down.
        let _ = match self.stream {
            Stream::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            Stream::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
        };
    }

    fn name(&self) -> &str {
        match self.stream {
            Stream::Stdout => "console_stdout",
            Stream::Stderr => "console_stderr",
        }
    }
}
