#[cfg(feature = "storage-b2")]
use crate::B2Storage;
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use fleetdocs_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-b2")]
        StorageBackend::B2 => {
            let storage = B2Storage::new(config.b2().clone())?;
            tracing::info!(api_url = %config.b2().api_url, "Using B2 storage backend");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-b2"))]
        StorageBackend::B2 => Err(StorageError::ConfigError(
            "B2 storage backend not available (storage-b2 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path();
            if base_path.trim().is_empty() {
                return Err(StorageError::ConfigError(
                    "LOCAL_STORAGE_PATH not configured".to_string(),
                ));
            }

            let storage =
                LocalStorage::new(base_path, config.public_mount().to_string()).await?;
            tracing::info!(path = %base_path, "Using local storage backend");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
