//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A required backend setting is absent. Raised before any remote call.
    #[error("Missing storage configuration: {0}")]
    MissingConfiguration(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of object bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Reference to a stored object.
///
/// `key` is the object name (`company/ACME1/logo/original/...`). `file_id` is
/// the backend-assigned id, set only by backends that have one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub key: String,
    pub file_id: Option<String>,
}

impl ObjectRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            file_id: None,
        }
    }

    pub fn with_file_id(key: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            file_id: Some(file_id.into()),
        }
    }
}

/// Storage abstraction trait
///
/// The orchestrator and file service only ever see `Arc<dyn Storage>`; the
/// concrete backend is chosen once at startup by [`crate::create_storage`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens a write session for one upload batch.
    ///
    /// Backends that need authorization perform it here, once, and fail with
    /// `MissingConfiguration` when their settings are incomplete.
    async fn open_session(&self) -> StorageResult<Arc<dyn StorageSession>>;

    /// Stream an object's bytes.
    async fn read_object(&self, object: &ObjectRef) -> StorageResult<ByteStream>;

    /// Delete an object.
    async fn delete_object(&self, object: &ObjectRef) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Authorized write handle shared by every file of a batch.
#[async_trait]
pub trait StorageSession: Send + Sync {
    /// Write `data` under `key`. Fails with `AlreadyExists` if the backend can
    /// detect that the key is taken.
    async fn write_object(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<ObjectRef>;

    /// Publicly reachable URL of a stored object.
    fn public_url(&self, object: &ObjectRef) -> String;
}
