//! Per-process log collector.
//!
//! One reader task per attached stream. A reader drains its stream until EOF
//! so the child never blocks on a full pipe, keeps the most recent lines in
//! an [`OutputBuffer`], and hands every line to a mirror thread that owns the
//! configured writers. Readers never block on a slow console or file. They
//! are detached: nothing waits for them during teardown and they end on their
//! own when the child closes its end of the pipe.

use crate::buffer::{OutputBuffer, SharedOutputBuffer};
use crate::output::{ConsoleOutputWriter, FileOutputWriter, OutputWriter};
use crate::types::{LogEntry, StreamType};
use chrono::Utc;
use dobrika_common::HarnessResult;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lines retained per stream unless configured otherwise.
pub const DEFAULT_TAIL_CAPACITY: usize = 200;

enum MirrorMessage {
    Line(LogEntry),
    /// Acknowledged once every line queued before it has been written.
    Flush(oneshot::Sender<()>),
}

/// Configuration for collecting one process's output
#[derive(Debug, Clone)]
pub struct LogCollectorConfig {
    /// Label used in mirrored lines, e.g. `[dobrika stdout] ...`.
    pub source: String,
    pub tail_capacity: usize,
    pub mirror_to_console: bool,
    pub output_file: Option<PathBuf>,
}

impl Default for LogCollectorConfig {
    fn default() -> Self {
        Self {
            source: "dobrika".to_string(),
            tail_capacity: DEFAULT_TAIL_CAPACITY,
            mirror_to_console: true,
            output_file: None,
        }
    }
}

/// Captures one child's stdout and stderr.
pub struct LogCollector {
    source: String,
    stdout: SharedOutputBuffer,
    stderr: SharedOutputBuffer,
    stdout_lines: Arc<AtomicU64>,
    stderr_lines: Arc<AtomicU64>,
    mirror: mpsc::Sender<MirrorMessage>,
    writer_count: usize,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for LogCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCollector")
            .field("source", &self.source)
            .field("stdout_lines", &self.stdout_lines.load(Ordering::Relaxed))
            .field("stderr_lines", &self.stderr_lines.load(Ordering::Relaxed))
            .field("writers", &self.writer_count)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl LogCollector {
    /// Create a collector with the writers named by `config`.
    pub fn new(config: &LogCollectorConfig) -> HarnessResult<Self> {
        let mut writers: Vec<Box<dyn OutputWriter>> = Vec::new();
        if config.mirror_to_console {
            writers.push(Box::new(ConsoleOutputWriter));
        }
        if let Some(path) = &config.output_file {
            writers.push(Box::new(FileOutputWriter::new(path.clone())?));
        }
        Self::with_writers(config.source.clone(), config.tail_capacity, writers)
    }

    /// Create a collector with explicit writers.
    ///
    /// The writers move to a mirror thread that exits once the collector and
    /// all of its readers are gone.
    pub fn with_writers(
        source: impl Into<String>,
        tail_capacity: usize,
        writers: Vec<Box<dyn OutputWriter>>,
    ) -> HarnessResult<Self> {
        let source = source.into();
        let writer_count = writers.len();
        let (mirror, queue) = mpsc::channel();
        std::thread::Builder::new()
            .name(format!("{}-log-mirror", source))
            .spawn(move || mirror_loop(writers, queue))?;

        Ok(Self {
            source,
            stdout: OutputBuffer::shared(tail_capacity),
            stderr: OutputBuffer::shared(tail_capacity),
            stdout_lines: Arc::new(AtomicU64::new(0)),
            stderr_lines: Arc::new(AtomicU64::new(0)),
            mirror,
            writer_count,
            tasks: Vec::new(),
        })
    }

    /// Start draining `stream` on a background task.
    pub fn attach<R>(&mut self, stream: R, stream_type: StreamType)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let task = tokio::spawn(stream_reader(
            stream,
            stream_type,
            self.source.clone(),
            Arc::clone(self.buffer(stream_type)),
            Arc::clone(self.counter(stream_type)),
            self.mirror.clone(),
        ));
        self.tasks.push(task);
        debug!(source = %self.source, stream = %stream_type, "Log reader attached");
    }

    /// Retained lines of one stream, oldest first.
    pub fn tail(&self, stream_type: StreamType) -> Vec<String> {
        self.buffer(stream_type).read().lines()
    }

    /// Total non-empty lines read from one stream so far.
    pub fn lines_seen(&self, stream_type: StreamType) -> u64 {
        self.counter(stream_type).load(Ordering::Relaxed)
    }

    /// Write both retained tails to `out`, stderr first.
    pub fn dump_tail<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for stream_type in [StreamType::Stderr, StreamType::Stdout] {
            let buffer = self.buffer(stream_type).read();
            if buffer.is_empty() {
                continue;
            }
            writeln!(out, "{} server {} (tail):", self.source, stream_type)?;
            if buffer.evicted() > 0 {
                writeln!(out, "  ... {} earlier lines omitted", buffer.evicted())?;
            }
            for line in buffer.iter() {
                writeln!(out, "{}", line)?;
            }
        }
        out.flush()
    }

    /// Dump both tails to the harness's stderr.
    pub fn dump_tail_to_stderr(&self) {
        let mut err = std::io::stderr().lock();
        if let Err(e) = self.dump_tail(&mut err) {
            warn!(source = %self.source, error = %e, "Failed to dump server output");
        }
    }

    /// Wait up to `timeout` for every attached stream to reach EOF and for
    /// the mirror to write out everything read.
    ///
    /// Returns `true` when all readers finished. Teardown never calls this;
    /// it exists for callers that want the final lines before inspecting them.
    pub async fn drained(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while let Some(mut task) = self.tasks.pop() {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                self.tasks.push(task);
                return false;
            }
        }

        let (ack, done) = oneshot::channel();
        if self.mirror.send(MirrorMessage::Flush(ack)).is_err() {
            return false;
        }
        matches!(tokio::time::timeout_at(deadline, done).await, Ok(Ok(())))
    }

    fn buffer(&self, stream_type: StreamType) -> &SharedOutputBuffer {
        match stream_type {
            StreamType::Stdout => &self.stdout,
            StreamType::Stderr => &self.stderr,
        }
    }

    fn counter(&self, stream_type: StreamType) -> &Arc<AtomicU64> {
        match stream_type {
            StreamType::Stdout => &self.stdout_lines,
            StreamType::Stderr => &self.stderr_lines,
        }
    }
}

async fn stream_reader<R>(
    stream: R,
    stream_type: StreamType,
    source: String,
    buffer: SharedOutputBuffer,
    counter: Arc<AtomicU64>,
    mirror: mpsc::Sender<MirrorMessage>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut raw = Vec::new();
    let mut line_num = 0u64;

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                let decoded = String::from_utf8_lossy(&raw);
                let line = decoded.trim_end_matches(|c| c == '\n' || c == '\r');
                if line.is_empty() {
                    continue;
                }

                line_num += 1;
                counter.fetch_add(1, Ordering::Relaxed);
                buffer.write().push(line);

                let entry = LogEntry {
                    timestamp: Utc::now(),
                    source: source.clone(),
                    stream: stream_type,
                    line_num,
                    message: line.to_string(),
                };
                if mirror.send(MirrorMessage::Line(entry)).is_err() {
                    debug!(source = %source, stream = %stream_type, "Log mirror is gone");
                }
            }
            Err(e) => {
                warn!(source = %source, stream = %stream_type, error = %e, "Error reading from stream");
                break;
            }
        }
    }

    debug!(source = %source, stream = %stream_type, lines = line_num, "Stream reader finished");
}

fn mirror_loop(mut writers: Vec<Box<dyn OutputWriter>>, queue: mpsc::Receiver<MirrorMessage>) {
    for message in queue {
        match message {
            MirrorMessage::Line(entry) => {
                for writer in writers.iter_mut() {
                    if let Err(e) = writer.write(&entry).and_then(|_| writer.flush()) {
                        warn!(source = %entry.source, error = %e, "Failed to mirror log line");
                    }
                }
            }
            MirrorMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
