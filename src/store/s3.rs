//! S3-backed object store
//!
//! Wraps the async AWS SDK behind the synchronous [`ObjectStore`] trait: the
//! store owns a small multi-thread tokio runtime and blocks on each call.
//! Worker threads may call into it concurrently; `Runtime::block_on` is safe
//! from multiple threads.
//!
//! Credentials come from a properties file with `accessKey=` and `secretKey=`
//! lines, not from the ambient AWS environment.

use crate::config::Region;
use crate::error::StoreError;
use crate::store::{ObjectStore, StoreConnector};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region as SdkRegion};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Connects to S3 using a credentials properties file
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Connector;

impl StoreConnector for S3Connector {
    fn connect(
        &self,
        credential_path: &Path,
        region: &Region,
    ) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let (access_key, secret_key) = read_credentials(credential_path)?;

        let runtime = Runtime::new().map_err(|e| StoreError::ConnectionFailed {
            reason: format!("failed to start store runtime: {e}"),
        })?;

        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(SdkRegion::new(region.name().to_string()))
            .credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "credential-file",
            ))
            .build();

        info!(region = region.name(), "opened S3 session");

        Ok(Arc::new(S3Store {
            client: aws_sdk_s3::Client::from_conf(conf),
            runtime,
        }))
    }
}

/// An established S3 session
pub struct S3Store {
    client: aws_sdk_s3::Client,
    runtime: Runtime,
}

impl ObjectStore for S3Store {
    fn create_bucket(&self, bucket: &str, region: &Region) -> Result<(), StoreError> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if region.name() != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.name()))
                    .build(),
            );
        }

        self.runtime
            .block_on(request.send())
            .map(|_| ())
            .map_err(|e| StoreError::CreateBucket {
                bucket: bucket.to_string(),
                reason: format!("{}", DisplayErrorContext(&e)),
            })
    }

    fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            let body =
                ByteStream::from_path(local_path)
                    .await
                    .map_err(|e| StoreError::Put {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        reason: e.to_string(),
                    })?;

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| StoreError::Put {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: format!("{}", DisplayErrorContext(&e)),
                })?;

            debug!(bucket, key, "object stored");
            Ok(())
        })
    }

    fn purge_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        // Purge semantics are undefined for this system; leave the bucket
        // untouched rather than guessing a deletion policy.
        warn!(bucket, "bucket purge is not implemented, skipping");
        Ok(())
    }
}

/// Parse an `accessKey=` / `secretKey=` properties file.
fn read_credentials(path: &Path) -> Result<(String, String), StoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| StoreError::BadCredentials {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut access_key = None;
    let mut secret_key = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, value)) = line.split_once('=') {
            match name.trim() {
                "accessKey" => access_key = Some(value.trim().to_string()),
                "secretKey" => secret_key = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    match (access_key, secret_key) {
        (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
            Ok((access, secret))
        }
        _ => Err(StoreError::BadCredentials {
            path: path.to_path_buf(),
            reason: "missing accessKey or secretKey entry".into(),
        }),
    }
}
