//! Storage provider port (driven/secondary port)
//!
//! This module defines the interface for the remote object store that backs
//! a workspace. The trait is provider-agnostic: one adapter talks to a real
//! bucket service, another keeps lakes as local directories.
//!
//! ## Design Notes
//!
//! - Unlike adapter errors elsewhere, storage errors are classified:
//!   [`StorageError::NotExist`] drives control flow (no remote state yet,
//!   object already deleted) and [`StorageError::BadConnection`] is the only
//!   retryable kind.
//! - A provider is bound to one lake at a time via [`IStorageProvider::bind_lake`];
//!   object operations address the bound lake.

use thiserror::Error;

use crate::domain::newtypes::LakeName;

/// Errors surfaced by a storage provider
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested lake or object does not exist
    #[error("Not found: {0}")]
    NotExist(String),

    /// The provider could not be reached (network, credentials)
    #[error("Could not connect to storage provider: {0}")]
    BadConnection(String),

    /// Any other provider failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Returns true for the benign "does not exist" case
    #[must_use]
    pub fn is_not_exist(&self) -> bool {
        matches!(self, StorageError::NotExist(_))
    }

    /// Returns true when retrying the call may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::BadConnection(_))
    }
}

/// Port trait for remote object storage
#[async_trait::async_trait]
pub trait IStorageProvider: Send + Sync {
    /// Finds an existing lake whose name follows the `<prefix>-...` convention
    ///
    /// # Errors
    /// Returns `StorageError::NotExist` when no such lake exists.
    async fn find_lake_name(&self, prefix: &str) -> Result<LakeName, StorageError>;

    /// Binds subsequent object operations to `lake`
    fn bind_lake(&self, lake: &LakeName);

    /// Creates the backing container for `lake` and binds to it
    async fn create_lake(&self, lake: &LakeName) -> Result<(), StorageError>;

    /// Stores an object in the bound lake and returns its public URL
    async fn upload_file(&self, name: &str, data: &[u8]) -> Result<String, StorageError>;

    /// Fetches an object from the bound lake
    ///
    /// # Errors
    /// Returns `StorageError::NotExist` when the object is absent.
    async fn download_file(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Deletes an object from the bound lake
    ///
    /// # Errors
    /// Returns `StorageError::NotExist` when the object is already absent.
    async fn remove_file(&self, name: &str) -> Result<(), StorageError>;

    /// Public URL under which objects of the bound lake are reachable
    fn lake_base_url(&self) -> String;
}
