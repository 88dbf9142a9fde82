//! Upload engine - configuration locking, worker pool lifecycle and the
//! multi-pass drain loop
//!
//! One engine instance owns one logical run at a time: its configuration,
//! the shared work queue and the live-worker count all sit behind a single
//! coordinating lock. Configuration writes are rejected from the moment
//! `upload()` starts preparing until the engine returns to Idle with zero
//! live workers.
//!
//! The drain loop is multi-pass because a worker expanding a directory can
//! enqueue new file items after its siblings have already given up and
//! exited. Each pass launches a fresh worker batch, waits for the live count
//! to hit zero, joins the batch, and re-checks the queue.

pub mod queue;
pub mod walker;
pub mod worker;

pub use queue::{QueueStats, WorkItem, WorkQueue};
pub use worker::{StatsSnapshot, TransferStats};

use crate::config::EngineConfig;
use crate::error::{Result, StateError};
use crate::fs_ops::Filesystem;
use crate::store::{ObjectStore, StoreConnector};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use worker::{TransferWorker, WorkerContext};

/// How often the drain monitor logs while workers are still live. Waking is
/// driven by live-count notifications; this timeout is only a heartbeat.
const DRAIN_HEARTBEAT: Duration = Duration::from_secs(10);

/// Where the engine is in its run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No run active; configuration may change
    Idle,

    /// Connecting to the store, optionally creating/purging the bucket
    Preparing,

    /// Launching a worker batch
    Running,

    /// Waiting for the current batch's live count to reach zero
    Draining,
}

impl EnginePhase {
    /// True from the start of Preparing through the end of Draining
    pub fn is_running(&self) -> bool {
        !matches!(self, EnginePhase::Idle)
    }
}

/// State guarded by the engine's coordinating lock
struct EngineCore {
    phase: EnginePhase,
    live_workers: usize,
    config: EngineConfig,
}

/// The coordinating lock: phase, live-worker count and configuration move
/// together, and every change notifies waiters.
pub(crate) struct Lifecycle {
    core: Mutex<EngineCore>,
    signal: Condvar,
}

impl Lifecycle {
    fn new(config: EngineConfig) -> Self {
        Self {
            core: Mutex::new(EngineCore {
                phase: EnginePhase::Idle,
                live_workers: 0,
                config,
            }),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn worker_started(&self) {
        let mut core = self.core.lock().unwrap();
        core.live_workers += 1;
        self.signal.notify_all();
    }

    pub(crate) fn worker_finished(&self) {
        let mut core = self.core.lock().unwrap();
        core.live_workers -= 1;
        self.signal.notify_all();
    }

    fn phase(&self) -> EnginePhase {
        self.core.lock().unwrap().phase
    }

    fn live_workers(&self) -> usize {
        self.core.lock().unwrap().live_workers
    }

    fn set_phase(&self, phase: EnginePhase) {
        let mut core = self.core.lock().unwrap();
        core.phase = phase;
        self.signal.notify_all();
    }

    /// Transition Idle -> Preparing, returning a copy of the configuration
    /// the run will use. Fails if a run is active in any phase or stray
    /// workers are still live.
    fn begin(&self) -> std::result::Result<EngineConfig, StateError> {
        let mut core = self.core.lock().unwrap();
        if core.phase.is_running() || core.live_workers > 0 {
            return Err(StateError::AlreadyRunning);
        }
        core.phase = EnginePhase::Preparing;
        Ok(core.config.clone())
    }

    /// Apply a configuration write, checking the not-running predicate under
    /// the same lock as the write itself.
    fn update_config<F>(&self, field: &'static str, f: F) -> std::result::Result<(), StateError>
    where
        F: FnOnce(&mut EngineConfig),
    {
        let mut core = self.core.lock().unwrap();
        if core.phase.is_running() || core.live_workers > 0 {
            return Err(StateError::ConfigLocked { field });
        }
        f(&mut core.config);
        Ok(())
    }

    fn read_config<T>(&self, f: impl FnOnce(&EngineConfig) -> T) -> T {
        f(&self.core.lock().unwrap().config)
    }

    /// Block until the live-worker count reaches zero. Woken on every count
    /// change; the heartbeat timeout exists only to log drain progress.
    fn wait_for_drain(&self) {
        let mut core = self.core.lock().unwrap();
        while core.live_workers > 0 {
            let (guard, timeout) = self.signal.wait_timeout(core, DRAIN_HEARTBEAT).unwrap();
            core = guard;
            if timeout.timed_out() && core.live_workers > 0 {
                info!(active = core.live_workers, "waiting for workers to drain");
            }
        }
    }
}

/// What one `upload()` run did
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// Files uploaded (or pretend-processed)
    pub files_uploaded: u64,

    /// Bytes uploaded
    pub bytes_uploaded: u64,

    /// Local files deleted after upload
    pub files_deleted: u64,

    /// Directories expanded
    pub dirs_walked: u64,

    /// Items skipped
    pub skipped: u64,

    /// Per-item failures
    pub errors: u64,

    /// Worker batches launched before the queue stayed empty
    pub passes: u32,

    /// Wall-clock time of the run
    pub duration: Duration,
}

impl UploadReport {
    fn new(delta: StatsSnapshot, passes: u32, duration: Duration) -> Self {
        Self {
            files_uploaded: delta.files_uploaded,
            bytes_uploaded: delta.bytes_uploaded,
            files_deleted: delta.files_deleted,
            dirs_walked: delta.dirs_walked,
            skipped: delta.skipped,
            errors: delta.errors,
            passes,
            duration,
        }
    }
}

/// The upload engine
pub struct UploadEngine {
    lifecycle: Arc<Lifecycle>,
    queue: Arc<WorkQueue>,
    connector: Box<dyn StoreConnector>,
    fs: Arc<dyn Filesystem>,
    stats: Arc<TransferStats>,
}

impl UploadEngine {
    /// Engine with default configuration; fields are filled in through the
    /// setters before `upload()`.
    pub fn new(connector: Box<dyn StoreConnector>, fs: Arc<dyn Filesystem>) -> Self {
        Self::with_config(EngineConfig::default(), connector, fs)
    }

    pub fn with_config(
        config: EngineConfig,
        connector: Box<dyn StoreConnector>,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        Self {
            lifecycle: Arc::new(Lifecycle::new(config)),
            queue: Arc::new(WorkQueue::new()),
            connector,
            fs,
            stats: Arc::new(TransferStats::default()),
        }
    }

    /// Add an item for the next (or current) run to process
    pub fn enqueue(&self, item: WorkItem) {
        info!("{} added to queue", item.path().display());
        self.queue.enqueue(item);
    }

    /// Head of the queue without removing it
    pub fn peek(&self) -> Option<WorkItem> {
        self.queue.peek()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.phase().is_running()
    }

    pub fn phase(&self) -> EnginePhase {
        self.lifecycle.phase()
    }

    pub fn live_workers(&self) -> usize {
        self.lifecycle.live_workers()
    }

    pub fn stats(&self) -> Arc<TransferStats> {
        Arc::clone(&self.stats)
    }

    // Configuration read accessors

    pub fn bucket(&self) -> String {
        self.lifecycle.read_config(|c| c.bucket.clone())
    }

    pub fn destination(&self) -> String {
        self.lifecycle.read_config(|c| c.destination.clone())
    }

    pub fn credential_path(&self) -> PathBuf {
        self.lifecycle.read_config(|c| c.credential_path.clone())
    }

    pub fn region(&self) -> crate::config::Region {
        self.lifecycle.read_config(|c| c.region.clone())
    }

    pub fn max_workers(&self) -> usize {
        self.lifecycle.read_config(|c| c.max_workers)
    }

    pub fn recurse(&self) -> bool {
        self.lifecycle.read_config(|c| c.recurse)
    }

    pub fn pretend(&self) -> bool {
        self.lifecycle.read_config(|c| c.pretend)
    }

    pub fn delete_after_upload(&self) -> bool {
        self.lifecycle.read_config(|c| c.delete_after_upload)
    }

    pub fn create_bucket(&self) -> bool {
        self.lifecycle.read_config(|c| c.create_bucket)
    }

    pub fn purge_bucket(&self) -> bool {
        self.lifecycle.read_config(|c| c.purge_bucket)
    }

    // Configuration setters. Each one is rejected while the engine is
    // running or any worker is live.

    pub fn set_bucket(&self, bucket: impl Into<String>) -> std::result::Result<(), StateError> {
        let bucket = bucket.into();
        self.lifecycle.update_config("bucket", |c| c.bucket = bucket)
    }

    pub fn set_destination(
        &self,
        destination: impl Into<String>,
    ) -> std::result::Result<(), StateError> {
        let destination = destination.into();
        self.lifecycle
            .update_config("destination", |c| c.destination = destination)
    }

    pub fn set_credential_path(
        &self,
        path: impl Into<PathBuf>,
    ) -> std::result::Result<(), StateError> {
        let path = path.into();
        self.lifecycle
            .update_config("credential path", |c| c.credential_path = path)
    }

    pub fn set_region(&self, region: crate::config::Region) -> std::result::Result<(), StateError> {
        self.lifecycle.update_config("region", |c| c.region = region)
    }

    pub fn set_max_workers(&self, max_workers: usize) -> std::result::Result<(), StateError> {
        self.lifecycle
            .update_config("worker count", |c| c.max_workers = max_workers)
    }

    pub fn set_recurse(&self, recurse: bool) -> std::result::Result<(), StateError> {
        self.lifecycle.update_config("recurse", |c| c.recurse = recurse)
    }

    pub fn set_pretend(&self, pretend: bool) -> std::result::Result<(), StateError> {
        self.lifecycle.update_config("pretend", |c| c.pretend = pretend)
    }

    pub fn set_delete_after_upload(&self, delete: bool) -> std::result::Result<(), StateError> {
        self.lifecycle
            .update_config("delete mode", |c| c.delete_after_upload = delete)
    }

    pub fn set_create_bucket(&self, create: bool) -> std::result::Result<(), StateError> {
        self.lifecycle
            .update_config("create setting", |c| c.create_bucket = create)
    }

    pub fn set_purge_bucket(&self, purge: bool) -> std::result::Result<(), StateError> {
        self.lifecycle
            .update_config("purge setting", |c| c.purge_bucket = purge)
    }

    /// Run the full drain loop to completion.
    ///
    /// Connects to the store, then repeatedly launches worker batches until
    /// the queue stays empty with no workers live. Connection and bucket
    /// creation failures abort before any worker starts; per-item failures
    /// never surface here.
    pub fn upload(&self) -> Result<UploadReport> {
        let config = Arc::new(self.lifecycle.begin()?);
        let started = Instant::now();
        let before = self.stats.snapshot();

        info!("preparing for upload");
        let store = match self.prepare(&config) {
            Ok(store) => store,
            Err(e) => {
                self.lifecycle.set_phase(EnginePhase::Idle);
                return Err(e);
            }
        };

        self.lifecycle.set_phase(EnginePhase::Running);

        let mut passes = 0u32;
        loop {
            passes += 1;
            let workers = match self.launch_pass(passes, &config, &store) {
                Ok(workers) => workers,
                Err(e) => {
                    self.lifecycle.set_phase(EnginePhase::Idle);
                    return Err(e);
                }
            };

            self.lifecycle.set_phase(EnginePhase::Draining);
            self.lifecycle.wait_for_drain();

            // The join is the hard barrier: once every handle has returned,
            // each worker's decrement has happened and the count is truly 0.
            for worker in workers {
                if let Err(e) = worker.join() {
                    warn!(error = %e, "worker did not exit cleanly");
                }
            }

            if self.queue.is_empty() {
                break;
            }

            debug!(
                queued = self.queue.len(),
                pass = passes,
                "queue refilled during drain, launching another pass"
            );
            self.lifecycle.set_phase(EnginePhase::Running);
        }

        self.lifecycle.set_phase(EnginePhase::Idle);

        let report = UploadReport::new(
            self.stats.snapshot().since(&before),
            passes,
            started.elapsed(),
        );
        info!(
            files = report.files_uploaded,
            errors = report.errors,
            passes = report.passes,
            "finished"
        );
        Ok(report)
    }

    /// Connect and run the pre-upload bucket operations. Everything here is
    /// fatal; no worker exists yet.
    fn prepare(&self, config: &EngineConfig) -> Result<Arc<dyn ObjectStore>> {
        let store = self
            .connector
            .connect(&config.credential_path, &config.region)?;

        if config.create_bucket {
            info!(bucket = %config.bucket, "creating bucket");
            if !config.pretend {
                store.create_bucket(&config.bucket, &config.region)?;
            }
        }

        if config.purge_bucket {
            info!(bucket = %config.bucket, "purging bucket");
            if !config.pretend {
                store.purge_bucket(&config.bucket)?;
            }
        }

        Ok(store)
    }

    /// Spawn one batch of workers against the shared queue, never more than
    /// `max_workers`.
    fn launch_pass(
        &self,
        pass: u32,
        config: &Arc<EngineConfig>,
        store: &Arc<dyn ObjectStore>,
    ) -> Result<Vec<TransferWorker>> {
        let mut workers = Vec::with_capacity(config.max_workers);
        let mut last_error = None;

        for id in 0..config.max_workers {
            let ctx = WorkerContext {
                config: Arc::clone(config),
                queue: Arc::clone(&self.queue),
                store: Arc::clone(store),
                fs: Arc::clone(&self.fs),
                lifecycle: Arc::clone(&self.lifecycle),
                stats: Arc::clone(&self.stats),
            };

            match TransferWorker::spawn(id, ctx) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    warn!(worker = id, error = %e, "failed to start worker");
                    last_error = Some(e);
                }
            }
        }

        if workers.is_empty() {
            let err = last_error.unwrap_or(crate::error::WorkerError::InitFailed {
                id: 0,
                reason: "no workers configured".into(),
            });
            return Err(err.into());
        }

        debug!(pass, workers = workers.len(), "pass launched");
        Ok(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_is_running() {
        assert!(!EnginePhase::Idle.is_running());
        assert!(EnginePhase::Preparing.is_running());
        assert!(EnginePhase::Running.is_running());
        assert!(EnginePhase::Draining.is_running());
    }

    #[test]
    fn test_begin_rejects_second_run() {
        let lifecycle = Lifecycle::new(EngineConfig::default());
        lifecycle.begin().unwrap();
        assert_eq!(lifecycle.begin().unwrap_err(), StateError::AlreadyRunning);
    }

    #[test]
    fn test_begin_rejects_live_workers() {
        let lifecycle = Lifecycle::new(EngineConfig::default());
        lifecycle.worker_started();
        assert_eq!(lifecycle.begin().unwrap_err(), StateError::AlreadyRunning);
        lifecycle.worker_finished();
        lifecycle.begin().unwrap();
    }

    #[test]
    fn test_update_config_guards() {
        let lifecycle = Lifecycle::new(EngineConfig::default());

        lifecycle
            .update_config("bucket", |c| c.bucket = "b".into())
            .unwrap();
        assert_eq!(lifecycle.read_config(|c| c.bucket.clone()), "b");

        lifecycle.begin().unwrap();
        let err = lifecycle
            .update_config("bucket", |c| c.bucket = "other".into())
            .unwrap_err();
        assert_eq!(err, StateError::ConfigLocked { field: "bucket" });
        assert_eq!(lifecycle.read_config(|c| c.bucket.clone()), "b");
    }

    #[test]
    fn test_update_config_rejects_stray_worker() {
        let lifecycle = Lifecycle::new(EngineConfig::default());
        lifecycle.worker_started();
        assert!(lifecycle
            .update_config("recurse", |c| c.recurse = true)
            .is_err());
    }

    #[test]
    fn test_wait_for_drain_returns_at_zero() {
        let lifecycle = Lifecycle::new(EngineConfig::default());
        // No workers live: must return immediately rather than heartbeat.
        let start = Instant::now();
        lifecycle.wait_for_drain();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
