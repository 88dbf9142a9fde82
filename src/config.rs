//! Configuration types for s3-hauler
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The engine configuration with validation
//! - Region name parsing

use crate::error::ConfigError;
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of transfer workers
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Region names accepted by `Region::from_str`
const KNOWN_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "sa-east-1",
    "us-gov-west-1",
    "cn-north-1",
];

/// Parallel file tree uploader for S3-compatible object stores
#[derive(Parser, Debug, Clone)]
#[command(
    name = "s3-hauler",
    version,
    about = "Parallel file tree uploader for S3-compatible object stores",
    long_about = "Uploads a local file or directory tree into an object store bucket,\n\
                  spreading individual transfers across a bounded worker pool.\n\n\
                  WARNING: matching keys in the target bucket are always overwritten.",
    after_help = "EXAMPLES:\n    \
        s3-hauler ./dist --bucket releases --credential ~/.aws/upload.properties\n    \
        s3-hauler /var/log/app --bucket archive -c creds.properties -r --delete\n    \
        s3-hauler ./site --bucket www -c creds.properties -p static/v2 --pretend"
)]
pub struct CliArgs {
    /// Local file or directory to upload
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Bucket to upload file(s) into
    #[arg(short, long, value_name = "BUCKET")]
    pub bucket: String,

    /// Credentials properties file (accessKey= / secretKey= lines)
    #[arg(short, long, value_name = "FILE")]
    pub credential: PathBuf,

    /// Key prefix prepended to every uploaded object
    #[arg(short, long, default_value = "", value_name = "PREFIX")]
    pub prefix: String,

    /// Region name
    #[arg(long, default_value = "us-west-2", value_name = "REGION")]
    pub region: String,

    /// Recurse into sub-directories
    #[arg(short, long)]
    pub recurse: bool,

    /// Log what would be uploaded without touching the store
    #[arg(long)]
    pub pretend: bool,

    /// Delete local files after a successful upload
    #[arg(long)]
    pub delete: bool,

    /// Create the bucket if it does not exist
    #[arg(long)]
    pub create: bool,

    /// Purge the bucket before uploading
    #[arg(long)]
    pub purge: bool,

    /// Maximum parallel upload workers
    #[arg(
        short = 't',
        long,
        default_value_t = DEFAULT_MAX_WORKERS,
        value_name = "NUM"
    )]
    pub threads: usize,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose output (show per-item activity)
    #[arg(short, long)]
    pub verbose: bool,
}

/// A validated region name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region(String);

impl Region {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if KNOWN_REGIONS.contains(&s) {
            Ok(Region(s.to_string()))
        } else {
            Err(ConfigError::UnknownRegion {
                name: s.to_string(),
            })
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Region("us-west-2".to_string())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engine configuration.
///
/// Owned by the engine and frozen for the duration of any transfer activity;
/// every setter on the engine enforces the not-running guard per field.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Target bucket
    pub bucket: String,

    /// Remote key prefix prepended to every object key (may be empty)
    pub destination: String,

    /// Path to the credentials properties file
    pub credential_path: PathBuf,

    /// Region the store session is opened against
    pub region: Region,

    /// Upper bound on concurrently live transfer workers
    pub max_workers: usize,

    /// Descend into subdirectories of queued directory items
    pub recurse: bool,

    /// Log all activity without calling the store or deleting anything
    pub pretend: bool,

    /// Remove the local copy after a successful upload
    pub delete_after_upload: bool,

    /// Create the bucket during preparation
    pub create_bucket: bool,

    /// Purge the bucket during preparation
    pub purge_bucket: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            destination: String::new(),
            credential_path: PathBuf::new(),
            region: Region::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            recurse: false,
            pretend: false,
            delete_after_upload: false,
            create_bucket: false,
            purge_bucket: false,
        }
    }
}

impl EngineConfig {
    /// Create and validate configuration from CLI arguments.
    ///
    /// Checks everything the run depends on before any worker starts: the
    /// source and credentials files must exist, the region must be known and
    /// the worker count must be in range.
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        if !args.source.exists() {
            return Err(ConfigError::SourceMissing {
                path: args.source.clone(),
            });
        }

        if !args.credential.exists() {
            return Err(ConfigError::CredentialMissing {
                path: args.credential.clone(),
            });
        }

        let region = Region::from_str(&args.region)?;

        if args.threads == 0 || args.threads > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.threads,
                max: MAX_WORKERS,
            });
        }

        Ok(Self {
            bucket: args.bucket.clone(),
            destination: args.prefix.clone(),
            credential_path: args.credential.clone(),
            region,
            max_workers: args.threads,
            recurse: args.recurse,
            pretend: args.pretend,
            delete_after_upload: args.delete,
            create_bucket: args.create,
            purge_bucket: args.purge,
        })
    }
}
