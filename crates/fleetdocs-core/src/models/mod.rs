//! Data models for the application
//!
//! `file` holds the persisted metadata record and its query types; `upload`
//! holds the transient request/outcome/response types of an upload batch.

mod file;
mod upload;

pub use file::{
    EntityType, FileFilters, FileRecord, FileStats, NewFileRecord, Page, PublicFileRecord,
    RecordScope, DEFAULT_PAGE_LIMIT,
};
pub use upload::{
    FailedFile, FileData, FolderUploadResponse, Organization, StoredObjectData, UploadOutcome,
    UploadRequest, UploadResponse, UploadedFile, METADATA_PERSIST_ERROR,
};
