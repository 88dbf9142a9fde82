//! Error types for s3-hauler
//!
//! The hierarchy separates failures by blast radius:
//! - `StateError` and `StoreError::ConnectionFailed` stop the call that
//!   triggered them
//! - per-item transfer and walk failures are logged by the worker and never
//!   escalate past it
//!
//! All library errors use thiserror; `anyhow` is reserved for the binary.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the s3-hauler application
#[derive(Error, Debug)]
pub enum HaulerError {
    /// Engine state guard violations
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Configuration and CLI validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Object store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Directory walk errors
    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected attempts to mutate the engine while transfer activity is live.
///
/// Configuration is frozen from the moment `upload()` enters Preparing until
/// the engine returns to Idle with zero live workers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A configuration setter was called mid-run
    #[error("cannot change {field} while uploading")]
    ConfigLocked { field: &'static str },

    /// `upload()` was called on an engine that is already running
    #[error("an upload is already in progress")]
    AlreadyRunning,
}

/// Structurally invalid input, surfaced before any transfer work begins
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Region name not in the known region set
    #[error("unknown region '{name}'")]
    UnknownRegion { name: String },

    /// Worker count outside the accepted range
    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Source path does not exist
    #[error("{path} does not exist")]
    SourceMissing { path: PathBuf },

    /// Credentials file does not exist
    #[error("credentials file {path} does not exist")]
    CredentialMissing { path: PathBuf },
}

/// Object store and connection errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not establish a store session. Fatal to the whole run; raised
    /// during Preparing before any worker starts.
    #[error("failed to connect to object store: {reason}")]
    ConnectionFailed { reason: String },

    /// Credentials file unreadable or missing required keys
    #[error("unusable credentials file '{path}': {reason}")]
    BadCredentials { path: PathBuf, reason: String },

    /// Bucket creation failed (fatal during Preparing)
    #[error("failed to create bucket '{bucket}': {reason}")]
    CreateBucket { bucket: String, reason: String },

    /// Single object upload failed (non-fatal, logged per item)
    #[error("failed to put '{key}' into bucket '{bucket}': {reason}")]
    Put {
        bucket: String,
        key: String,
        reason: String,
    },
}

/// Directory walk errors
#[derive(Error, Debug)]
pub enum WalkError {
    /// The item handed to the walker points at a file
    #[error("'{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    /// Could not list the directory's children
    #[error("failed to list directory '{path}': {reason}")]
    ListDir { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker thread could not be spawned
    #[error("failed to start worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Worker panicked
    #[error("worker {id} panicked")]
    Panicked { id: usize },
}

/// Result type alias for HaulerError
pub type Result<T> = std::result::Result<T, HaulerError>;

impl StoreError {
    /// True for failures that abort the whole run during Preparing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. }
                | StoreError::BadCredentials { .. }
                | StoreError::CreateBucket { .. }
        )
    }
}
