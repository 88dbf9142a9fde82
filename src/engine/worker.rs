//! Transfer worker threads
//!
//! Each worker repeatedly pulls from the shared queue and either uploads a
//! file, expands a directory through the walker, or skips the item. A worker
//! that sees an empty queue for the full dequeue wait exits; the engine
//! decides whether the run is actually over.

use crate::config::EngineConfig;
use crate::engine::queue::{WorkItem, WorkQueue};
use crate::engine::walker::DirectoryWalker;
use crate::engine::Lifecycle;
use crate::error::WorkerError;
use crate::fs_ops::Filesystem;
use crate::store::ObjectStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a worker waits on the queue before concluding its run is over
pub(crate) const DEQUEUE_WAIT: Duration = Duration::from_secs(1);

/// Counters shared by every worker in the pool
#[derive(Debug, Default)]
pub struct TransferStats {
    /// Files uploaded (or pretend-processed)
    pub files_uploaded: AtomicU64,

    /// Bytes uploaded
    pub bytes_uploaded: AtomicU64,

    /// Local files deleted after upload
    pub files_deleted: AtomicU64,

    /// Directories expanded by the walker
    pub dirs_walked: AtomicU64,

    /// Items skipped (missing paths, directories with recursion off)
    pub skipped: AtomicU64,

    /// Per-item failures (transfer, delete, walk entries)
    pub errors: AtomicU64,
}

impl TransferStats {
    pub(crate) fn record_upload(&self, bytes: u64) {
        self.files_uploaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.files_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dir(&self) {
        self.dirs_walked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_uploaded: self.files_uploaded.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
            dirs_walked: self.dirs_walked.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`TransferStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub files_uploaded: u64,
    pub bytes_uploaded: u64,
    pub files_deleted: u64,
    pub dirs_walked: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl StatsSnapshot {
    /// Counter movement between `earlier` and `self`. Stats accumulate for
    /// the engine's lifetime; reports cover one run.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            files_uploaded: self.files_uploaded - earlier.files_uploaded,
            bytes_uploaded: self.bytes_uploaded - earlier.bytes_uploaded,
            files_deleted: self.files_deleted - earlier.files_deleted,
            dirs_walked: self.dirs_walked - earlier.dirs_walked,
            skipped: self.skipped - earlier.skipped,
            errors: self.errors - earlier.errors,
        }
    }
}

/// Everything a worker thread needs, cloned per worker
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub config: Arc<EngineConfig>,
    pub queue: Arc<WorkQueue>,
    pub store: Arc<dyn ObjectStore>,
    pub fs: Arc<dyn Filesystem>,
    pub lifecycle: Arc<Lifecycle>,
    pub stats: Arc<TransferStats>,
}

/// Keeps the live-worker count accurate even if a worker panics
struct LiveGuard<'a> {
    lifecycle: &'a Lifecycle,
}

impl<'a> LiveGuard<'a> {
    fn new(lifecycle: &'a Lifecycle) -> Self {
        lifecycle.worker_started();
        Self { lifecycle }
    }
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.worker_finished();
    }
}

/// Handle to one spawned transfer worker
pub(crate) struct TransferWorker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl TransferWorker {
    pub(crate) fn spawn(id: usize, ctx: WorkerContext) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("hauler-{id}"))
            .spawn(move || worker_loop(id, ctx))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    pub(crate) fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked { id: self.id }),
            None => Ok(()),
        }
    }
}

fn worker_loop(id: usize, ctx: WorkerContext) {
    let _live = LiveGuard::new(&ctx.lifecycle);
    debug!(worker = id, "worker starting");

    while let Some(item) = ctx.queue.dequeue_timeout(DEQUEUE_WAIT) {
        process_item(id, &item, &ctx);
    }

    debug!(worker = id, "queue idle, worker exiting");
}

/// Handle one dequeued item. Nothing here may abort the loop: every failure
/// is logged and counted so the remaining queue still gets processed.
fn process_item(id: usize, item: &WorkItem, ctx: &WorkerContext) {
    let path = item.path();

    if ctx.fs.is_file(path) {
        upload_file(id, item, ctx);
    } else if ctx.fs.is_dir(path) {
        if ctx.config.recurse {
            let walker = DirectoryWalker::new(ctx.fs.as_ref(), &ctx.queue, &ctx.stats);
            if let Err(e) = walker.walk(item) {
                warn!(worker = id, error = %e, "directory walk failed");
                ctx.stats.record_error();
            }
        } else {
            info!(worker = id, "skipping directory {} (recursion disabled)", path.display());
            ctx.stats.record_skip();
        }
    } else {
        info!(worker = id, "skipping {}", path.display());
        ctx.stats.record_skip();
    }
}

fn upload_file(id: usize, item: &WorkItem, ctx: &WorkerContext) {
    let path = item.path();
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => {
            warn!(worker = id, path = %path.display(), "file has no name, skipping");
            ctx.stats.record_skip();
            return;
        }
    };

    let key = object_key(&[&ctx.config.destination, item.prefix(), &name]);
    info!(worker = id, key = %key, "uploading {}", path.display());

    let size = ctx.fs.file_size(path).unwrap_or(0);

    if !ctx.config.pretend {
        if let Err(e) = ctx.store.put_object(&ctx.config.bucket, &key, path) {
            warn!(worker = id, error = %e, "upload failed, continuing with next item");
            ctx.stats.record_error();
            return;
        }
    }

    ctx.stats.record_upload(size);

    if ctx.config.delete_after_upload {
        info!(worker = id, "deleting local copy of {}", path.display());
        if !ctx.config.pretend {
            match ctx.fs.delete_file(path) {
                Ok(()) => ctx.stats.record_delete(),
                Err(e) => {
                    warn!(worker = id, error = %e, "failed to delete local copy");
                    ctx.stats.record_error();
                }
            }
        }
    }
}

/// Join non-empty key segments with '/'. Empty destination or prefix
/// segments contribute nothing, so keys never carry doubled separators.
pub(crate) fn object_key(segments: &[&str]) -> String {
    let mut key = String::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(segment);
    }
    key
}
