//! Directory walker
//!
//! Expands a queued directory item into file items. The walker descends a
//! subtree fully within one call, so only file items (never directories) are
//! re-enqueued; the multi-pass drain in the engine exists because this can
//! happen while the current worker batch is already winding down.

use crate::engine::queue::{WorkItem, WorkQueue};
use crate::engine::worker::TransferStats;
use crate::error::WalkError;
use crate::fs_ops::Filesystem;
use tracing::{debug, info, warn};

/// Walks one directory item, enqueuing every file found beneath it
pub struct DirectoryWalker<'a> {
    fs: &'a dyn Filesystem,
    queue: &'a WorkQueue,
    stats: &'a TransferStats,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(fs: &'a dyn Filesystem, queue: &'a WorkQueue, stats: &'a TransferStats) -> Self {
        Self { fs, queue, stats }
    }

    /// Walk `item.path`, extending `item.prefix` with each directory level.
    ///
    /// Child directories are descended synchronously in this call. A failure
    /// to resolve one entry is logged and that entry skipped; only a failure
    /// to list `item.path` itself is returned to the caller.
    pub fn walk(&self, item: &WorkItem) -> Result<(), WalkError> {
        if self.fs.is_file(item.path()) {
            return Err(WalkError::NotADirectory {
                path: item.path().to_path_buf(),
            });
        }

        info!("walking directory {}", item.path().display());

        let children =
            self.fs
                .list_children(item.path())
                .map_err(|e| WalkError::ListDir {
                    path: item.path().to_path_buf(),
                    reason: e.to_string(),
                })?;

        for child in children {
            let name = match child.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => {
                    debug!(path = %child.display(), "child has no file name, skipping");
                    continue;
                }
            };

            if self.fs.is_dir(&child) {
                let sub_prefix = extend_prefix(item.prefix(), &name);
                match self.fs.canonicalize(&child) {
                    Ok(path) => {
                        if let Err(e) = self.walk(&WorkItem::new(sub_prefix, path)) {
                            warn!(error = %e, "skipping unreadable subdirectory");
                            self.stats.record_error();
                        }
                    }
                    Err(e) => {
                        warn!(path = %child.display(), error = %e, "cannot resolve subdirectory, skipping");
                        self.stats.record_error();
                    }
                }
            } else {
                match self.fs.canonicalize(&child) {
                    Ok(path) => {
                        info!("{} added to queue", path.display());
                        self.queue.enqueue(WorkItem::new(item.prefix(), path));
                    }
                    Err(e) => {
                        warn!(path = %child.display(), error = %e, "cannot resolve file, skipping");
                        self.stats.record_error();
                    }
                }
            }
        }

        self.stats.record_dir();
        Ok(())
    }
}

/// Append one path level to a running key prefix. An empty running prefix
/// contributes nothing, so keys never start with '/'.
pub(crate) fn extend_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
