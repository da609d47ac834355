//! File management over stored assets: lookups, downloads, metadata edits and deletion.

use std::sync::Arc;

use fleetdocs_core::models::{
    EntityType, FileFilters, FileRecord, FileStats, Page, RecordScope,
};
use fleetdocs_core::AppError;
use fleetdocs_db::FileRecordStore;
use fleetdocs_storage::{ByteStream, ObjectRef, Storage, StorageError};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Record-level operations plus the object operations that follow from them.
#[derive(Clone)]
pub struct FileService {
    storage: Arc<dyn Storage>,
    records: Arc<dyn FileRecordStore>,
}

impl FileService {
    pub fn new(storage: Arc<dyn Storage>, records: Arc<dyn FileRecordStore>) -> Self {
        Self { storage, records }
    }

    /// Active record by id.
    pub async fn get(&self, id: Uuid) -> Result<FileRecord, AppError> {
        self.records
            .find_by_id(id, RecordScope::ActiveOnly)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list_company(
        &self,
        company_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.records.find_by_company(company_id, page).await
    }

    pub async fn list_entity(
        &self,
        company_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.records
            .find_by_entity(company_id, entity_type, entity_id, page)
            .await
    }

    pub async fn list_document_type(
        &self,
        company_id: &str,
        document_type: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.records
            .find_by_document_type(company_id, document_type, page)
            .await
    }

    pub async fn company_logos(&self, company_id: &str) -> Result<Vec<FileRecord>, AppError> {
        self.records.find_company_logos(company_id).await
    }

    pub async fn search(
        &self,
        filters: &FileFilters,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.records.search(filters, page).await
    }

    pub async fn stats(&self, company_id: &str) -> Result<FileStats, AppError> {
        self.records.stats(company_id).await
    }

    /// Replace the metadata map of a record. Must be a JSON object.
    pub async fn update_metadata(
        &self,
        id: Uuid,
        metadata: JsonValue,
    ) -> Result<FileRecord, AppError> {
        if !metadata.is_object() {
            return Err(AppError::InvalidInput(
                "Metadata must be a JSON object".to_string(),
            ));
        }

        self.records
            .update_metadata(id, metadata)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Stream the original bytes of an active record.
    pub async fn download(&self, id: Uuid) -> Result<(FileRecord, ByteStream), AppError> {
        let record = self.get(id).await?;
        let object = original_ref(&record);

        let stream = self
            .storage
            .read_object(&object)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(key) => {
                    AppError::NotFound(format!("Stored object not found: {}", key))
                }
                other => AppError::Storage(other.to_string()),
            })?;

        Ok((record, stream))
    }

    /// Soft delete: the record is kept but hidden from active queries.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if self.records.soft_delete(id).await? {
            tracing::info!(file_id = %id, "File soft deleted");
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    /// Remove the record, then its stored objects.
    ///
    /// Object deletion failures are logged and do not fail the call.
    pub async fn hard_delete(&self, id: Uuid) -> Result<(), AppError> {
        let record = self
            .records
            .find_by_id(id, RecordScope::IncludeInactive)
            .await?
            .ok_or_else(|| not_found(id))?;

        if !self.records.hard_delete(id).await? {
            return Err(not_found(id));
        }

        let mut objects = vec![original_ref(&record)];
        if let Some(ref thumbnail_key) = record.thumbnail_key {
            objects.push(ObjectRef::new(thumbnail_key.clone()));
        }

        for object in objects {
            if let Err(e) = self.storage.delete_object(&object).await {
                tracing::warn!(
                    error = %e,
                    key = %object.key,
                    file_id = %id,
                    "Failed to delete stored object"
                );
            }
        }

        tracing::info!(file_id = %id, "File hard deleted");
        Ok(())
    }
}

fn original_ref(record: &FileRecord) -> ObjectRef {
    match record.file_id {
        Some(ref file_id) => ObjectRef::with_file_id(record.storage_key.clone(), file_id.clone()),
        None => ObjectRef::new(record.storage_key.clone()),
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("File not found: {}", id))
}
