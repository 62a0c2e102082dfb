//! Fixed-capacity ring of recent output lines.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// Buffer shared between its reader task (sole writer) and diagnostics.
pub type SharedOutputBuffer = Arc<RwLock<OutputBuffer>>;

/// The most recent `capacity` lines of one stream, oldest first.
///
/// Invariant: `len() <= capacity()`. Pushing onto a full buffer evicts the
/// oldest line.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    evicted: u64,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    pub fn shared(capacity: usize) -> SharedOutputBuffer {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.evicted += 1;
        }
        self.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of lines dropped from retention so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Snapshot of the retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}
