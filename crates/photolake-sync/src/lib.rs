//! Photolake Sync - Reconciliation engine
//!
//! Provides:
//! - Deterministic content hashing for dedup
//! - Folder scanning and sync planning against an album
//! - A bounded, cancellable worker pool running per-photo jobs
//! - State provisioning and persistence across the local file and the lake
//!
//! ## Modules
//!
//! - [`hasher`] - Fuzzy content hash (base64 reduction + name-based UUID)
//! - [`scanner`] - Non-recursive photo discovery in a source folder
//! - [`differ`] - Creation / removal plan for one album
//! - [`pool`] - Semaphore-gated worker pool with cancellation
//! - [`pipeline`] - Create, remove and download runs over the pool
//! - [`persistence`] - Local/remote state document protocol
//! - [`retry`] - Exponential backoff for connection failures

pub mod differ;
pub mod hasher;
pub mod persistence;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod scanner;

use std::path::PathBuf;

use photolake_core::domain::DomainError;
use photolake_core::ports::StorageError;
use thiserror::Error;

pub use differ::{compute_sync_plan, SyncPlan};
pub use persistence::{StateSource, StateStore};
pub use pipeline::{AlbumRemoval, JobFailure, JobKind, JobStage, PipelineExecutor, RunReport};
pub use pool::{PoolReport, WorkerPool};
pub use retry::RetryPolicy;

/// Errors that can occur during reconciliation
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A source file could not be read for hashing
    #[error("Failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state document could not be parsed
    #[error("State document is corrupt: {0}")]
    CorruptState(String),

    /// The storage provider could not be reached
    #[error("Unable to connect to storage: {0}")]
    BadConnection(String),

    /// Any other storage failure
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// No album matches the given name or identifier
    #[error("Album not found: {0}")]
    AlbumNotFound(String),

    /// A download destination already exists
    #[error("Directory already exists: {0}")]
    DirectoryExists(PathBuf),

    /// An operation that requires every job to succeed had failures
    #[error("{failed} of {total} jobs failed")]
    AggregateFailure { failed: usize, total: usize },

    /// A domain-level error propagated from photolake-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BadConnection(msg) => SyncError::BadConnection(msg),
            other => SyncError::Storage(other),
        }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_keep_connection_failures_distinct() {
        let err: SyncError = StorageError::BadConnection("dns".into()).into();
        assert!(matches!(err, SyncError::BadConnection(_)));

        let err: SyncError = StorageError::NotExist("x".into()).into();
        assert!(matches!(err, SyncError::Storage(StorageError::NotExist(_))));
    }

    #[test]
    fn aggregate_failure_message() {
        let err = SyncError::AggregateFailure {
            failed: 2,
            total: 12,
        };
        assert_eq!(err.to_string(), "2 of 12 jobs failed");
    }
}
