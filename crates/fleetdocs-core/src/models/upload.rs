//! Upload batch request, per-file outcome and the aggregated response shapes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::file::EntityType;
use crate::error::{FileFailure, UploadStage};

/// Reported in `dbError` when the metadata write of a stored file fails.
pub const METADATA_PERSIST_ERROR: &str = "Unable to save file metadata to the database";

/// One raw payload handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    /// Declared MIME type, as sent by the client.
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A batch of payloads plus the routing parameters shared by all of them.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub company_id: String,
    /// Raw entity type; parsed during validation.
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub document_type: String,
    pub files: Vec<UploadedFile>,
}

/// Transient result of one file's pipeline. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub original_name: String,
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
    pub storage_key: Option<String>,
    pub file_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub file_id: Option<String>,
    pub db_id: Option<Uuid>,
    pub stored_to_backend: bool,
    pub persisted_to_metadata_store: bool,
    pub error: Option<FileFailure>,
}

impl UploadOutcome {
    /// Outcome of a file that never reached the backend.
    pub fn failed(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        size: usize,
        failure: FileFailure,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            filename: String::new(),
            mime_type: mime_type.into(),
            size,
            storage_key: None,
            file_url: None,
            thumbnail_url: None,
            file_id: None,
            db_id: None,
            stored_to_backend: false,
            persisted_to_metadata_store: false,
            error: Some(failure),
        }
    }

    pub fn to_file_data(&self) -> Option<FileData> {
        if !self.stored_to_backend {
            return None;
        }
        let file_url = self.file_url.clone()?;
        Some(FileData {
            original_name: self.original_name.clone(),
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            file_url,
            thumbnail_url: self.thumbnail_url.clone(),
            file_id: self.file_id.clone(),
            db_id: self.db_id,
            saved_to_db: self.persisted_to_metadata_store,
            db_error: match self.error {
                Some(FileFailure::MetadataPersist(_)) => Some(METADATA_PERSIST_ERROR.to_string()),
                _ => None,
            },
        })
    }

    pub fn to_failed_file(&self) -> Option<FailedFile> {
        if self.stored_to_backend {
            return None;
        }
        let error = self.error.as_ref()?;
        Some(FailedFile {
            original_name: self.original_name.clone(),
            stage: error.stage(),
            error: error.to_string(),
        })
    }

    pub fn to_stored_object(&self) -> Option<StoredObjectData> {
        if !self.stored_to_backend {
            return None;
        }
        Some(StoredObjectData {
            original_name: self.original_name.clone(),
            filename: self.filename.clone(),
            file_url: self.file_url.clone()?,
            thumbnail_url: self.thumbnail_url.clone(),
            file_id: self.file_id.clone(),
        })
    }
}

/// Response entry for a file whose original was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub original_name: String,
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
    pub file_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_id: Option<Uuid>,
    #[serde(rename = "savedToDB")]
    pub saved_to_db: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

/// Response entry for a file that could not be stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub original_name: String,
    pub stage: UploadStage,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub company_id: String,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub document_type: String,
}

/// Aggregated response of an entity-scoped upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// True iff every file reached the backend.
    pub success: bool,
    pub files_data: Vec<FileData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_files: Vec<FailedFile>,
    pub message: String,
    pub organization: Organization,
}

impl UploadResponse {
    pub fn from_outcomes(outcomes: &[UploadOutcome], organization: Organization) -> Self {
        let files_data: Vec<FileData> = outcomes.iter().filter_map(|o| o.to_file_data()).collect();
        let failed_files: Vec<FailedFile> =
            outcomes.iter().filter_map(|o| o.to_failed_file()).collect();
        Self {
            success: failed_files.is_empty(),
            message: batch_message(files_data.len(), outcomes.len()),
            files_data,
            failed_files,
            organization,
        }
    }
}

/// Response entry of a generic folder upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObjectData {
    pub original_name: String,
    pub filename: String,
    pub file_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

/// Aggregated response of a generic folder upload (no metadata records).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderUploadResponse {
    pub success: bool,
    pub folder: String,
    pub files_data: Vec<StoredObjectData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_files: Vec<FailedFile>,
    pub message: String,
}

impl FolderUploadResponse {
    pub fn from_outcomes(outcomes: &[UploadOutcome], folder: String) -> Self {
        let files_data: Vec<StoredObjectData> = outcomes
            .iter()
            .filter_map(|o| o.to_stored_object())
            .collect();
        let failed_files: Vec<FailedFile> =
            outcomes.iter().filter_map(|o| o.to_failed_file()).collect();
        Self {
            success: failed_files.is_empty(),
            message: batch_message(files_data.len(), outcomes.len()),
            folder,
            files_data,
            failed_files,
        }
    }
}

fn batch_message(stored: usize, total: usize) -> String {
    if stored == total {
        "Files saved successfully".to_string()
    } else {
        format!("{} of {} files saved", stored, total)
    }
}
