//! Core types for log collection

use chrono::{DateTime, Utc};

/// Stream type (stdout or stderr)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Stdout,
    Stderr,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Stdout => "stdout",
            StreamType::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One non-empty line read from a child stream.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Subsystem the line came from, e.g. `dobrika`.
    pub source: String,
    pub stream: StreamType,
    /// 1-based count of non-empty lines seen on this stream.
    pub line_num: u64,
    pub message: String,
}

impl LogEntry {
    /// Prefix used when mirroring the line, e.g. `[dobrika stderr]`.
    pub fn prefix(&self) -> String {
        format!("[{} {}]", self.source, self.stream)
    }
}
