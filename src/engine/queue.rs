//! Unbounded work queue shared by the engine, its workers and the walker
//!
//! Dequeue uses a bounded wait rather than an indefinite block: a worker that
//! sees nothing for the full timeout exits its loop, which is how the pool
//! winds down without sentinel items or per-worker shutdown signals.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// One pending transfer: a local path and the remote key prefix it lands
/// under. Duplicates are legal and processed independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Local file or directory path
    path: PathBuf,

    /// Remote key prefix (may be empty)
    prefix: String,
}

impl WorkItem {
    pub fn new(prefix: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
        }
    }

    /// The root item a driver enqueues: no prefix yet.
    pub fn root(path: impl Into<PathBuf>) -> Self {
        Self::new("", path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Counters for queue traffic
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued
    pub enqueued: AtomicU64,

    /// Total items dequeued
    pub dequeued: AtomicU64,
}

/// Unbounded thread-safe FIFO of [`WorkItem`]
///
/// Producers (the driver and workers unpacking directories) enqueue without
/// blocking; consumers block on dequeue up to a timeout.
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
    available: Condvar,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Add an item. Never blocks; the item is visible to dequeuers
    /// immediately.
    pub fn enqueue(&self, item: WorkItem) {
        let mut items = self.items.lock().unwrap();
        items.push_back(item);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
    }

    /// Remove and return the head item, waiting up to `timeout` for one to
    /// arrive. Returns `None` on timeout; that is not an error, just "no work
    /// right now".
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<WorkItem> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock().unwrap();

        loop {
            if let Some(item) = items.pop_front() {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                return Some(item);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let (guard, _) = self
                .available
                .wait_timeout(items, deadline - now)
                .unwrap();
            items = guard;
        }
    }

    /// The head item without removing it. Inspection only.
    pub fn peek(&self) -> Option<WorkItem> {
        self.items.lock().unwrap().front().cloned()
    }

    /// Approximate number of queued items
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
