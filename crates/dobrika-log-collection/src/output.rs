//! Output writers for mirrored server output

use crate::types::{LogEntry, StreamType};
use dobrika_common::HarnessResult;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Trait for mirroring log entries to an output
pub trait OutputWriter: Send {
    /// Write a log entry
    fn write(&mut self, entry: &LogEntry) -> HarnessResult<()>;

    /// Flush any buffered output
    fn flush(&mut self) -> HarnessResult<()>;
}

/// Mirrors each line to the harness's matching standard stream:
/// child stdout to our stdout, child stderr to our stderr.
#[derive(Debug, Default)]
pub struct ConsoleOutputWriter;

impl OutputWriter for ConsoleOutputWriter {
    fn write(&mut self, entry: &LogEntry) -> HarnessResult<()> {
        match entry.stream {
            StreamType::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{} {}", entry.prefix(), entry.message)?;
            }
            StreamType::Stderr => {
                let mut out = std::io::stderr().lock();
                writeln!(out, "{} {}", entry.prefix(), entry.message)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> HarnessResult<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}

/// Appends every line, timestamped, to a file.
pub struct FileOutputWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileOutputWriter {
    /// Create a new file output writer, creating parent directories if needed.
    pub fn new(path: impl Into<PathBuf>) -> HarnessResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputWriter for FileOutputWriter {
    fn write(&mut self, entry: &LogEntry) -> HarnessResult<()> {
        // Format: [timestamp] [source/stream] message
        writeln!(
            self.writer,
            "[{}] [{}/{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.source,
            entry.stream,
            entry.message
        )?;
        Ok(())
    }

    fn flush(&mut self) -> HarnessResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
