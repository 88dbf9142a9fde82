//! Control surface
//!
//! Thin proxy over a shared engine for an external caller (a control channel
//! or embedding process). Every operation delegates to the engine; the state
//! guards live there, not here.

use crate::config::Region;
use crate::engine::{UploadEngine, UploadReport, WorkItem};
use crate::error::{Result, StateError};
use std::path::PathBuf;
use std::sync::Arc;

/// Remote-control handle to an [`UploadEngine`]
#[derive(Clone)]
pub struct ControlSurface {
    engine: Arc<UploadEngine>,
}

impl ControlSurface {
    pub fn new(engine: Arc<UploadEngine>) -> Self {
        Self { engine }
    }

    // Inspection

    pub fn bucket(&self) -> String {
        self.engine.bucket()
    }

    pub fn destination(&self) -> String {
        self.engine.destination()
    }

    pub fn credential_path(&self) -> PathBuf {
        self.engine.credential_path()
    }

    pub fn region(&self) -> Region {
        self.engine.region()
    }

    pub fn max_workers(&self) -> usize {
        self.engine.max_workers()
    }

    pub fn recurse(&self) -> bool {
        self.engine.recurse()
    }

    pub fn pretend(&self) -> bool {
        self.engine.pretend()
    }

    pub fn delete_after_upload(&self) -> bool {
        self.engine.delete_after_upload()
    }

    pub fn create_bucket(&self) -> bool {
        self.engine.create_bucket()
    }

    pub fn purge_bucket(&self) -> bool {
        self.engine.purge_bucket()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn live_workers(&self) -> usize {
        self.engine.live_workers()
    }

    /// Head of the queue without removing it
    pub fn peek(&self) -> Option<WorkItem> {
        self.engine.peek()
    }

    // Operations

    /// Enqueue an item. The queue is unbounded, so this never blocks the
    /// caller.
    pub fn enqueue(&self, item: WorkItem) {
        self.engine.enqueue(item);
    }

    /// Run the full drain loop to completion; blocks until the engine is
    /// back to Idle.
    pub fn upload(&self) -> Result<UploadReport> {
        self.engine.upload()
    }

    // Configuration

    pub fn set_bucket(&self, bucket: impl Into<String>) -> std::result::Result<(), StateError> {
        self.engine.set_bucket(bucket)
    }

    pub fn set_destination(
        &self,
        destination: impl Into<String>,
    ) -> std::result::Result<(), StateError> {
        self.engine.set_destination(destination)
    }

    pub fn set_credential_path(
        &self,
        path: impl Into<PathBuf>,
    ) -> std::result::Result<(), StateError> {
        self.engine.set_credential_path(path)
    }

    pub fn set_region(&self, region: Region) -> std::result::Result<(), StateError> {
        self.engine.set_region(region)
    }

    pub fn set_max_workers(&self, max_workers: usize) -> std::result::Result<(), StateError> {
        self.engine.set_max_workers(max_workers)
    }

    pub fn set_recurse(&self, recurse: bool) -> std::result::Result<(), StateError> {
        self.engine.set_recurse(recurse)
    }

    pub fn set_pretend(&self, pretend: bool) -> std::result::Result<(), StateError> {
        self.engine.set_pretend(pretend)
    }

    pub fn set_delete_after_upload(&self, delete: bool) -> std::result::Result<(), StateError> {
        self.engine.set_delete_after_upload(delete)
    }

    pub fn set_create_bucket(&self, create: bool) -> std::result::Result<(), StateError> {
        self.engine.set_create_bucket(create)
    }

    pub fn set_purge_bucket(&self, purge: bool) -> std::result::Result<(), StateError> {
        self.engine.set_purge_bucket(purge)
    }
}
