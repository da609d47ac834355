//! File metadata store.
//!
//! `FileRecordStore` is the seam the orchestrator and file service depend on.
//! `FileRecordRepository` backs it with Postgres; `InMemoryFileRecordStore`
//! keeps records in process memory.
//!
//! Listing queries return active records only, newest upload first.

mod memory;
mod postgres;

pub use memory::InMemoryFileRecordStore;
pub use postgres::FileRecordRepository;

use async_trait::async_trait;
use fleetdocs_core::models::{
    EntityType, FileFilters, FileRecord, FileStats, NewFileRecord, Page, RecordScope,
};
use fleetdocs_core::AppError;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[async_trait]
pub trait FileRecordStore: Send + Sync {
    /// Insert one record. A duplicate `filename` yields `AppError::Conflict`.
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError>;

    /// Insert all records or none.
    async fn create_many(&self, records: Vec<NewFileRecord>) -> Result<Vec<FileRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope)
        -> Result<Option<FileRecord>, AppError>;

    async fn find_by_filename(
        &self,
        filename: &str,
        scope: RecordScope,
    ) -> Result<Option<FileRecord>, AppError>;

    async fn find_by_company(&self, company_id: &str, page: Page)
        -> Result<Vec<FileRecord>, AppError>;

    async fn find_by_entity(
        &self,
        company_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError>;

    async fn find_by_document_type(
        &self,
        company_id: &str,
        document_type: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError>;

    async fn find_company_logos(&self, company_id: &str) -> Result<Vec<FileRecord>, AppError>;

    async fn search(&self, filters: &FileFilters, page: Page) -> Result<Vec<FileRecord>, AppError>;

    /// Replace the metadata map. `None` when the id is unknown.
    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: JsonValue,
    ) -> Result<Option<FileRecord>, AppError>;

    /// True iff an active record was deactivated.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn stats(&self, company_id: &str) -> Result<FileStats, AppError>;
}
