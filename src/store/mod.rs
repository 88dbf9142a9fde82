//! Object store capability
//!
//! The engine consumes the remote store through these traits only. The
//! session is established once during preparation and treated as
//! shared-immutable for the rest of the run; workers never reconnect.

use crate::config::Region;
use crate::error::StoreError;
use std::path::Path;
use std::sync::Arc;

mod s3;

pub use s3::{S3Connector, S3Store};

/// Operations the upload engine performs against a bucket
pub trait ObjectStore: Send + Sync {
    /// Create the bucket in the given region. Failures are fatal to the run.
    fn create_bucket(&self, bucket: &str, region: &Region) -> Result<(), StoreError>;

    /// Upload one local file under the given key, overwriting any existing
    /// object. Failures are caught per item by the calling worker.
    fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError>;

    /// Remove every object from the bucket. Purge semantics are undefined in
    /// this system; the shipped implementation is a documented no-op.
    fn purge_bucket(&self, bucket: &str) -> Result<(), StoreError>;
}

/// Establishes an [`ObjectStore`] session from credentials and a region.
///
/// The engine holds a connector rather than a client so that connecting
/// happens inside `upload()` (where a failure aborts the run before any
/// worker starts) and so tests can inject recording fakes.
pub trait StoreConnector: Send + Sync {
    fn connect(
        &self,
        credential_path: &Path,
        region: &Region,
    ) -> Result<Arc<dyn ObjectStore>, StoreError>;
}
