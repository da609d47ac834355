//! Error types module
//!
//! `UploadError` covers every reason a whole upload batch is rejected before any
//! I/O happens. `FileFailure` describes what went wrong for a single file once the
//! batch is running; it never escapes the orchestrator as an `Err`. `AppError`
//! unifies database, storage and validation failures for everything else.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

use serde::Serialize;

use crate::models::EntityType;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "MISSING_COMPANY_ID")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Batch-level rejection. Raised before any byte is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Company id is required")]
    MissingCompanyId,

    #[error("Unsupported entity type: {0}")]
    UnsupportedEntityType(String),

    #[error("Entity id is required for entity type {0}")]
    MissingEntityId(EntityType),

    #[error("Invalid document type for {entity_type}: {document_type}")]
    InvalidDocumentType {
        entity_type: String,
        document_type: String,
    },

    #[error("No files provided for upload")]
    NoFilesProvided,

    #[error("Too many files: {count} (max: {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("File {name} is empty")]
    EmptyFile { name: String },

    #[error("File {name} is too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { name: String, size: usize, max: usize },

    #[error("Unsupported file type for {name}: {mime_type}")]
    UnsupportedMimeType { name: String, mime_type: String },

    #[error("Storage backend configuration missing: {0}")]
    BackendConfigurationMissing(String),

    #[error("Invalid path segment: {0:?}")]
    InvalidPathSegment(String),

    #[error("Folder not allowed: {0}")]
    InvalidFolder(String),
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn upload_error_static_metadata(
    err: &UploadError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        UploadError::MissingCompanyId => (
            400,
            "MISSING_COMPANY_ID",
            false,
            Some("Provide a non-empty company id"),
            false,
            LogLevel::Debug,
        ),
        UploadError::UnsupportedEntityType(_) => (
            400,
            "UNSUPPORTED_ENTITY_TYPE",
            false,
            Some("Use one of: company, staff, driver, passenger"),
            false,
            LogLevel::Debug,
        ),
        UploadError::MissingEntityId(_) => (
            400,
            "MISSING_ENTITY_ID",
            false,
            Some("Provide the staff, driver or passenger id"),
            false,
            LogLevel::Debug,
        ),
        UploadError::InvalidDocumentType { .. } => (
            400,
            "INVALID_DOCUMENT_TYPE",
            false,
            Some("Use a document type allowed for this entity type"),
            false,
            LogLevel::Debug,
        ),
        UploadError::NoFilesProvided => (
            400,
            "NO_FILES_PROVIDED",
            false,
            Some("Attach at least one file"),
            false,
            LogLevel::Debug,
        ),
        UploadError::TooManyFiles { .. } => (
            400,
            "TOO_MANY_FILES",
            false,
            Some("Split the upload into smaller batches"),
            false,
            LogLevel::Debug,
        ),
        UploadError::EmptyFile { .. } => (
            400,
            "EMPTY_FILE",
            false,
            Some("Check the file content and try again"),
            false,
            LogLevel::Debug,
        ),
        UploadError::FileTooLarge { .. } => (
            413,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce the file size and try again"),
            false,
            LogLevel::Debug,
        ),
        UploadError::UnsupportedMimeType { .. } => (
            415,
            "UNSUPPORTED_MIME_TYPE",
            false,
            Some("Upload an image, PDF, Office or text document"),
            false,
            LogLevel::Debug,
        ),
        UploadError::BackendConfigurationMissing(_) => (
            500,
            "BACKEND_CONFIGURATION_MISSING",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        UploadError::InvalidPathSegment(_) => (
            400,
            "INVALID_PATH_SEGMENT",
            false,
            Some("Identifiers must not contain path separators"),
            false,
            LogLevel::Warn,
        ),
        UploadError::InvalidFolder(_) => (
            400,
            "INVALID_FOLDER",
            false,
            Some("Use a known folder or a company/ sub-folder"),
            false,
            LogLevel::Debug,
        ),
    }
}

impl ErrorMetadata for UploadError {
    fn http_status_code(&self) -> u16 {
        upload_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        upload_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        upload_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::BackendConfigurationMissing(_) => {
                "File storage is not configured".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Pipeline stage a per-file failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    Storage,
    Thumbnail,
    Metadata,
    Task,
}

/// Failure of one file inside a running batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileFailure {
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Thumbnail generation failed: {0}")]
    ThumbnailGeneration(String),

    #[error("Metadata persist failed: {0}")]
    MetadataPersist(String),

    #[error("Upload task aborted: {0}")]
    Aborted(String),
}

impl FileFailure {
    pub fn stage(&self) -> UploadStage {
        match self {
            FileFailure::StorageWrite(_) => UploadStage::Storage,
            FileFailure::ThumbnailGeneration(_) => UploadStage::Thumbnail,
            FileFailure::MetadataPersist(_) => UploadStage::Metadata,
            FileFailure::Aborted(_) => UploadStage::Task,
        }
    }

    /// Whether the file is lost for the batch (nothing usable was stored).
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileFailure::StorageWrite(_) | FileFailure::Aborted(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Upload(inner) => upload_error_static_metadata(inner),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file id exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            true,
            Some("Retry the upload"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Upload(_) => "Upload",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Upload(inner) => inner.client_message(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_upload_error_metadata_missing_entity_id() {
        let err = UploadError::MissingEntityId(EntityType::Staff);
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "MISSING_ENTITY_ID");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("staff"));
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_upload_error_metadata_file_too_large() {
        let err = UploadError::FileTooLarge {
            name: "scan.pdf".to_string(),
            size: 6_000_000,
            max: 5_242_880,
        };
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "FILE_TOO_LARGE");
        assert!(err.client_message().contains("scan.pdf"));
        assert!(err.client_message().contains("5242880"));
    }

    #[test]
    fn test_backend_configuration_missing_hides_details() {
        let err = AppError::from(UploadError::BackendConfigurationMissing(
            "B2_BUCKET_ID".to_string(),
        ));
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "BACKEND_CONFIGURATION_MISSING");
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("B2_BUCKET_ID"));
        assert_eq!(err.error_type(), "Upload");
    }

    #[test]
    fn test_error_metadata_suggested_actions() {
        let err1 = AppError::NotFound("test".to_string());
        assert_eq!(err1.suggested_action(), Some("Verify the file id exists"));

        let err2 = AppError::InvalidInput("test".to_string());
        assert_eq!(
            err2.suggested_action(),
            Some("Check request parameters and try again")
        );

        let err3 = UploadError::NoFilesProvided;
        assert_eq!(err3.suggested_action(), Some("Attach at least one file"));
    }

    #[test]
    fn test_file_failure_stages() {
        assert_eq!(
            FileFailure::StorageWrite("disk full".into()).stage(),
            UploadStage::Storage
        );
        assert!(FileFailure::StorageWrite("x".into()).is_terminal());
        assert!(FileFailure::Aborted("panic".into()).is_terminal());
        assert!(!FileFailure::MetadataPersist("x".into()).is_terminal());
        assert!(!FileFailure::ThumbnailGeneration("x".into()).is_terminal());
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("outer"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("outer"));
    }
}
