//! Integration tests for s3-hauler
//!
//! Runs the full engine against real temp directories and a recording fake
//! store; no network involved.

use s3_hauler::config::{EngineConfig, Region};
use s3_hauler::engine::{UploadEngine, WorkItem};
use s3_hauler::error::{HaulerError, StateError, StoreError};
use s3_hauler::fs_ops::LocalFs;
use s3_hauler::store::{ObjectStore, StoreConnector};
use s3_hauler::ControlSurface;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Records every store call; optionally fails selected keys, or delays puts
/// to measure concurrency.
#[derive(Default)]
struct RecordingStore {
    puts: Mutex<Vec<(String, String, PathBuf)>>,
    buckets_created: Mutex<Vec<String>>,
    purges: Mutex<Vec<String>>,
    fail_keys: HashSet<String>,
    put_delay: Option<Duration>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl RecordingStore {
    fn keys(&self) -> BTreeSet<String> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key, _)| key.clone())
            .collect()
    }

    fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }
}

impl ObjectStore for RecordingStore {
    fn create_bucket(&self, bucket: &str, _region: &Region) -> Result<(), StoreError> {
        self.buckets_created.lock().unwrap().push(bucket.to_string());
        Ok(())
    }

    fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let live = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(live, Ordering::SeqCst);

        if let Some(delay) = self.put_delay {
            thread::sleep(delay);
        }

        let result = if self.fail_keys.contains(key) {
            Err(StoreError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "injected failure".into(),
            })
        } else {
            self.puts
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string(), local_path.to_path_buf()));
            Ok(())
        };

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn purge_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.purges.lock().unwrap().push(bucket.to_string());
        Ok(())
    }
}

/// Hands out a shared store, or refuses to connect at all.
struct FakeConnector {
    store: Arc<dyn ObjectStore>,
    fail: bool,
}

impl FakeConnector {
    fn with_store(store: Arc<dyn ObjectStore>) -> Box<Self> {
        Box::new(Self { store, fail: false })
    }

    fn broken() -> Box<Self> {
        Box::new(Self {
            store: Arc::new(RecordingStore::default()),
            fail: true,
        })
    }
}

impl StoreConnector for FakeConnector {
    fn connect(
        &self,
        _credential_path: &Path,
        _region: &Region,
    ) -> Result<Arc<dyn ObjectStore>, StoreError> {
        if self.fail {
            return Err(StoreError::ConnectionFailed {
                reason: "injected connection failure".into(),
            });
        }
        Ok(Arc::clone(&self.store))
    }
}

/// Store whose puts block until the test opens the gate; used to hold the
/// engine in its running state.
struct GatedStore {
    put_entered: AtomicBool,
    gate: Mutex<bool>,
    opened: Condvar,
    puts: Mutex<Vec<String>>,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            put_entered: AtomicBool::new(false),
            gate: Mutex::new(false),
            opened: Condvar::new(),
            puts: Mutex::new(Vec::new()),
        }
    }

    fn open_gate(&self) {
        *self.gate.lock().unwrap() = true;
        self.opened.notify_all();
    }

    fn wait_until_put_entered(&self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.put_entered.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline, "no put call observed");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl ObjectStore for GatedStore {
    fn create_bucket(&self, _bucket: &str, _region: &Region) -> Result<(), StoreError> {
        Ok(())
    }

    fn put_object(&self, _bucket: &str, key: &str, _local_path: &Path) -> Result<(), StoreError> {
        self.put_entered.store(true, Ordering::SeqCst);
        let mut open = self.gate.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        drop(open);
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn purge_bucket(&self, _bucket: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

fn test_config(workers: usize) -> EngineConfig {
    EngineConfig {
        bucket: "test-bucket".into(),
        max_workers: workers,
        ..EngineConfig::default()
    }
}

fn engine_with(config: EngineConfig, store: Arc<dyn ObjectStore>) -> UploadEngine {
    UploadEngine::with_config(config, FakeConnector::with_store(store), Arc::new(LocalFs))
}

fn write_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect()
}

#[test]
fn test_uploads_each_queued_file_once() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["one.txt", "two.txt", "three.txt"]);

    let store = Arc::new(RecordingStore::default());
    let mut config = test_config(1);
    config.destination = "dest".into();
    let engine = engine_with(config, Arc::clone(&store) as Arc<dyn ObjectStore>);

    engine.enqueue(WorkItem::new("", &files[0]));
    engine.enqueue(WorkItem::new("", &files[1]));
    engine.enqueue(WorkItem::new("logs/app", &files[2]));

    let report = engine.upload().unwrap();

    assert_eq!(report.files_uploaded, 3);
    assert_eq!(report.errors, 0);
    assert_eq!(store.put_count(), 3);

    let expected: BTreeSet<String> = [
        "dest/one.txt".to_string(),
        "dest/two.txt".to_string(),
        "dest/logs/app/three.txt".to_string(),
    ]
    .into_iter()
    .collect();
    assert_eq!(store.keys(), expected);

    assert!(!engine.is_running());
    assert_eq!(engine.live_workers(), 0);
}

fn run_recursive_tree(workers: usize) {
    let dir = tempdir().unwrap();
    write_files(dir.path(), &["root/a.txt", "root/sub/b.txt"]);

    let store = Arc::new(RecordingStore::default());
    let mut config = test_config(workers);
    config.destination = "backup".into();
    config.recurse = true;
    let engine = engine_with(config, Arc::clone(&store) as Arc<dyn ObjectStore>);

    engine.enqueue(WorkItem::root(dir.path().join("root")));
    let report = engine.upload().unwrap();

    let expected: BTreeSet<String> = ["backup/a.txt".to_string(), "backup/sub/b.txt".to_string()]
        .into_iter()
        .collect();
    assert_eq!(store.keys(), expected);
    assert_eq!(report.files_uploaded, 2);
    assert_eq!(report.errors, 0);
    assert!(report.dirs_walked >= 2);
}

#[test]
fn test_recursion_single_worker() {
    run_recursive_tree(1);
}

#[test]
fn test_recursion_many_workers() {
    run_recursive_tree(10);
}

#[test]
fn test_directory_skipped_without_recursion() {
    let dir = tempdir().unwrap();
    write_files(dir.path(), &["root/a.txt"]);

    let store = Arc::new(RecordingStore::default());
    let engine = engine_with(test_config(2), Arc::clone(&store) as Arc<dyn ObjectStore>);

    engine.enqueue(WorkItem::root(dir.path().join("root")));
    let report = engine.upload().unwrap();

    assert_eq!(store.put_count(), 0);
    assert_eq!(report.files_uploaded, 0);
    assert_eq!(report.skipped, 1);
}

#[test]
fn test_pretend_touches_nothing() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["a.txt", "b.txt"]);

    let store = Arc::new(RecordingStore::default());
    let mut config = test_config(2);
    config.pretend = true;
    config.delete_after_upload = true;
    config.create_bucket = true;
    config.purge_bucket = true;
    let engine = engine_with(config, Arc::clone(&store) as Arc<dyn ObjectStore>);

    for file in &files {
        engine.enqueue(WorkItem::new("", file));
    }
    let report = engine.upload().unwrap();

    // Everything is still dequeued and processed, nothing is touched.
    assert_eq!(report.files_uploaded, 2);
    assert_eq!(store.put_count(), 0);
    assert!(store.buckets_created.lock().unwrap().is_empty());
    assert!(store.purges.lock().unwrap().is_empty());
    assert!(files.iter().all(|f| f.exists()));
    assert!(!engine.is_running());
    assert_eq!(engine.queue_len(), 0);
}

#[test]
fn test_create_and_purge_run_during_preparation() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["a.txt"]);

    let store = Arc::new(RecordingStore::default());
    let mut config = test_config(1);
    config.create_bucket = true;
    config.purge_bucket = true;
    let engine = engine_with(config, Arc::clone(&store) as Arc<dyn ObjectStore>);

    engine.enqueue(WorkItem::new("", &files[0]));
    engine.upload().unwrap();

    assert_eq!(*store.buckets_created.lock().unwrap(), vec!["test-bucket"]);
    assert_eq!(*store.purges.lock().unwrap(), vec!["test-bucket"]);
}

#[test]
fn test_delete_after_upload() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["good.txt", "bad.txt"]);

    let store = Arc::new(RecordingStore {
        fail_keys: ["bad.txt".to_string()].into_iter().collect(),
        ..RecordingStore::default()
    });
    let mut config = test_config(1);
    config.delete_after_upload = true;
    let engine = engine_with(config, Arc::clone(&store) as Arc<dyn ObjectStore>);

    engine.enqueue(WorkItem::new("", &files[0]));
    engine.enqueue(WorkItem::new("", &files[1]));
    let report = engine.upload().unwrap();

    // The successful upload is deleted locally; the failed one is kept.
    assert!(!files[0].exists());
    assert!(files[1].exists());
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.files_deleted, 1);
    assert_eq!(report.errors, 1);
}

#[test]
fn test_partial_failure_isolation() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["k1.txt", "k2.txt", "k3.txt", "k4.txt"]);

    let store = Arc::new(RecordingStore {
        fail_keys: ["k2.txt".to_string()].into_iter().collect(),
        ..RecordingStore::default()
    });
    let engine = engine_with(test_config(1), Arc::clone(&store) as Arc<dyn ObjectStore>);

    for file in &files {
        engine.enqueue(WorkItem::new("", file));
    }
    let report = engine.upload().unwrap();

    assert_eq!(report.files_uploaded, 3);
    assert_eq!(report.errors, 1);
    assert_eq!(store.put_count(), 3);
    assert!(!engine.is_running());
    assert_eq!(engine.live_workers(), 0);
}

#[test]
fn test_connection_failure_aborts_before_workers() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["a.txt"]);

    let engine = UploadEngine::with_config(
        test_config(4),
        FakeConnector::broken(),
        Arc::new(LocalFs),
    );
    engine.enqueue(WorkItem::new("", &files[0]));

    let err = engine.upload().unwrap_err();
    assert!(matches!(
        err,
        HaulerError::Store(StoreError::ConnectionFailed { .. })
    ));

    // Aborted before any worker started: the item is still queued and the
    // engine is usable again.
    assert_eq!(engine.queue_len(), 1);
    assert!(!engine.is_running());
    assert_eq!(engine.live_workers(), 0);
}

#[test]
fn test_redrain_on_empty_queue_is_noop() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["a.txt"]);

    let store = Arc::new(RecordingStore::default());
    let engine = engine_with(test_config(1), Arc::clone(&store) as Arc<dyn ObjectStore>);

    engine.enqueue(WorkItem::new("", &files[0]));
    let first = engine.upload().unwrap();
    assert_eq!(first.files_uploaded, 1);

    let second = engine.upload().unwrap();
    assert_eq!(second.files_uploaded, 0);
    assert_eq!(second.errors, 0);
    assert_eq!(store.put_count(), 1);
    assert!(!engine.is_running());
}

#[test]
fn test_bounded_parallelism() {
    let dir = tempdir().unwrap();
    let names: Vec<String> = (0..20).map(|i| format!("f{i}.txt")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let files = write_files(dir.path(), &name_refs);

    let store = Arc::new(RecordingStore {
        put_delay: Some(Duration::from_millis(25)),
        ..RecordingStore::default()
    });
    let engine = engine_with(test_config(4), Arc::clone(&store) as Arc<dyn ObjectStore>);

    for file in &files {
        engine.enqueue(WorkItem::new("", file));
    }
    let report = engine.upload().unwrap();

    assert_eq!(report.files_uploaded, 20);
    assert!(store.max_concurrent.load(Ordering::SeqCst) <= 4);
    assert_eq!(engine.live_workers(), 0);
}

#[test]
fn test_config_locked_while_running() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["a.txt"]);

    let store = Arc::new(GatedStore::new());
    let engine = Arc::new(UploadEngine::with_config(
        test_config(1),
        FakeConnector::with_store(Arc::clone(&store) as Arc<dyn ObjectStore>),
        Arc::new(LocalFs),
    ));
    engine.enqueue(WorkItem::new("", &files[0]));

    let runner = Arc::clone(&engine);
    let handle = thread::spawn(move || runner.upload());

    // Hold the engine mid-transfer and poke every guarded field.
    store.wait_until_put_entered();
    assert!(engine.is_running());

    assert_eq!(
        engine.set_bucket("other"),
        Err(StateError::ConfigLocked { field: "bucket" })
    );
    assert!(engine.set_destination("x").is_err());
    assert!(engine.set_credential_path("/tmp/creds").is_err());
    assert!(engine.set_region(Region::default()).is_err());
    assert!(engine.set_max_workers(2).is_err());
    assert!(engine.set_recurse(true).is_err());
    assert!(engine.set_pretend(true).is_err());
    assert!(engine.set_delete_after_upload(true).is_err());
    assert!(engine.set_create_bucket(true).is_err());
    assert!(engine.set_purge_bucket(true).is_err());

    store.open_gate();
    handle.join().unwrap().unwrap();
    assert_eq!(*store.puts.lock().unwrap(), vec!["a.txt"]);

    // Back to Idle with no live workers: setters work again and take effect.
    assert!(!engine.is_running());
    assert_eq!(engine.live_workers(), 0);
    engine.set_bucket("other").unwrap();
    assert_eq!(engine.bucket(), "other");
    engine.set_recurse(true).unwrap();
    assert!(engine.recurse());
}

#[test]
fn test_control_surface_proxies_engine() {
    let dir = tempdir().unwrap();
    let files = write_files(dir.path(), &["a.txt"]);

    let store = Arc::new(RecordingStore::default());
    let engine = Arc::new(engine_with(
        test_config(2),
        Arc::clone(&store) as Arc<dyn ObjectStore>,
    ));
    let control = ControlSurface::new(Arc::clone(&engine));

    control.set_bucket("remote-bucket").unwrap();
    control.set_destination("via/control").unwrap();
    control.set_max_workers(3).unwrap();

    assert_eq!(control.bucket(), "remote-bucket");
    assert_eq!(control.destination(), "via/control");
    assert_eq!(control.max_workers(), 3);
    assert!(!control.is_running());
    assert_eq!(control.live_workers(), 0);

    control.enqueue(WorkItem::new("", &files[0]));
    let head = control.peek().unwrap();
    assert_eq!(head.path(), files[0].as_path());
    // peek does not consume
    assert_eq!(engine.queue_len(), 1);

    let report = control.upload().unwrap();
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(
        store.keys().into_iter().next().unwrap(),
        "via/control/a.txt"
    );
}
