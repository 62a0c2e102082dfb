//! # Dobrika Log Collection
//!
//! Captures a supervised server's stdout/stderr.
//!
//! Every line is mirrored live to the harness's own output (and optionally a
//! file), while only the most recent lines per stream are retained in memory
//! for post-mortem diagnostics.

pub mod buffer;
pub mod collector;
pub mod output;
pub mod types;

// Re-export main types
pub use buffer::{OutputBuffer, SharedOutputBuffer};
pub use collector::{LogCollector, LogCollectorConfig, DEFAULT_TAIL_CAPACITY};
pub use output::{ConsoleOutputWriter, FileOutputWriter, OutputWriter};
pub use types::{LogEntry, StreamType};
