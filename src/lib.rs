//! s3-hauler - Parallel File Tree Uploader
//!
//! Uploads a local file or directory tree into an object store bucket,
//! spreading individual file transfers across a bounded worker pool and
//! discovering subdirectories while the pool is already draining.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Upload Engine                              │
//! │                                                                  │
//! │  driver / control surface                                        │
//! │        │ enqueue root item                                       │
//! │        ▼                                                         │
//! │  ┌──────────────────────────┐                                    │
//! │  │       Work Queue         │◄──── walker re-enqueues files      │
//! │  │  (unbounded, blocking    │      found under directories       │
//! │  │   dequeue with timeout)  │                                    │
//! │  └────────────┬─────────────┘                                    │
//! │               │                                                  │
//! │  ┌────────┐ ┌────────┐ ┌────────┐        ┌────────┐              │
//! │  │Worker 0│ │Worker 1│ │Worker 2│  ...   │Worker N│  (≤ max)     │
//! │  └───┬────┘ └───┬────┘ └───┬────┘        └───┬────┘              │
//! │      └──────────┴─────┬────┴─────────────────┘                   │
//! │                       ▼                                          │
//! │         pass monitor: wait for live count = 0,                   │
//! │         relaunch while the queue is non-empty                    │
//! └───────────────────────┬──────────────────────────────────────────┘
//!                         │ putObject
//!                         ▼
//!                ┌──────────────────┐
//!                │   Object Store   │
//!                │     (bucket)     │
//!                └──────────────────┘
//! ```
//!
//! The drain loop is multi-pass: a worker unpacking a directory enqueues new
//! file items after the current batch already started winding down, so the
//! engine re-checks the queue each time the live-worker count reaches zero
//! and launches another batch until nothing is left.
//!
//! Configuration is frozen while any transfer activity is live; every setter
//! is rejected between the start of preparation and the return to idle.
//!
//! # Example
//!
//! ```bash
//! # Upload a directory tree, recursing into subdirectories
//! s3-hauler ./dist --bucket releases -c creds.properties -r
//!
//! # Dry run with deletion enabled, 4 workers
//! s3-hauler /var/log/app --bucket archive -c creds.properties \
//!     --delete --pretend -t 4
//! ```

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod fs_ops;
pub mod progress;
pub mod store;

pub use config::{CliArgs, EngineConfig, Region};
pub use control::ControlSurface;
pub use engine::{EnginePhase, UploadEngine, UploadReport, WorkItem, WorkQueue};
pub use error::{HaulerError, Result};
pub use fs_ops::{Filesystem, LocalFs};
pub use store::{ObjectStore, S3Connector, StoreConnector};
