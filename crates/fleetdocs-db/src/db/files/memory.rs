//! In-process file record store.
//!
//! Same contract as the Postgres repository, without persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fleetdocs_core::models::{
    EntityType, FileFilters, FileRecord, FileStats, NewFileRecord, Page, RecordScope,
};
use fleetdocs_core::AppError;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::FileRecordStore;

#[derive(Default)]
struct MemoryState {
    records: HashMap<Uuid, FileRecord>,
}

impl MemoryState {
    fn filename_taken(&self, filename: &str) -> bool {
        self.records.values().any(|r| r.filename == filename)
    }

    /// Records inserted together share `now`, like rows of one Postgres transaction.
    fn insert(&mut self, record: NewFileRecord, now: DateTime<Utc>) -> FileRecord {
        let created = FileRecord {
            id: Uuid::new_v4(),
            company_id: record.company_id,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            document_type: record.document_type,
            original_name: record.original_name,
            filename: record.filename,
            mime_type: record.mime_type,
            size: record.size,
            file_url: record.file_url,
            thumbnail_url: record.thumbnail_url,
            file_id: record.file_id,
            storage_key: record.storage_key,
            thumbnail_key: record.thumbnail_key,
            upload_date: now,
            is_active: true,
            metadata: record.metadata,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(created.id, created.clone());
        created
    }

    /// Active records matching `keep`, newest first, paged.
    fn select<F>(&self, page: Option<Page>, keep: F) -> Vec<FileRecord>
    where
        F: Fn(&FileRecord) -> bool,
    {
        let mut matched: Vec<FileRecord> = self
            .records
            .values()
            .filter(|r| r.is_active && keep(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.upload_date
                .cmp(&a.upload_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        match page {
            Some(page) => matched
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect(),
            None => matched,
        }
    }
}

fn conflict(filename: &str) -> AppError {
    AppError::Conflict(format!("File name already recorded: {}", filename))
}

/// Record store kept in process memory.
#[derive(Clone, Default)]
pub struct InMemoryFileRecordStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryFileRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, active or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FileRecordStore for InMemoryFileRecordStore {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let mut state = self.state.lock().await;
        if state.filename_taken(&record.filename) {
            return Err(conflict(&record.filename));
        }
        Ok(state.insert(record, Utc::now()))
    }

    async fn create_many(&self, records: Vec<NewFileRecord>) -> Result<Vec<FileRecord>, AppError> {
        let mut state = self.state.lock().await;

        // Check the whole batch before touching state so a conflict leaves nothing behind.
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            if state.filename_taken(&record.filename) || !seen.insert(record.filename.as_str()) {
                return Err(conflict(&record.filename));
            }
        }

        let now = Utc::now();
        Ok(records.into_iter().map(|r| state.insert(r, now)).collect())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> Result<Option<FileRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .get(&id)
            .filter(|r| r.is_active || scope.includes_inactive())
            .cloned())
    }

    async fn find_by_filename(
        &self,
        filename: &str,
        scope: RecordScope,
    ) -> Result<Option<FileRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .find(|r| r.filename == filename && (r.is_active || scope.includes_inactive()))
            .cloned())
    }

    async fn find_by_company(
        &self,
        company_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state.select(Some(page), |r| r.company_id == company_id))
    }

    async fn find_by_entity(
        &self,
        company_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state.select(Some(page), |r| {
            r.company_id == company_id
                && r.entity_type == entity_type
                && r.entity_id.as_deref() == Some(entity_id)
        }))
    }

    async fn find_by_document_type(
        &self,
        company_id: &str,
        document_type: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state.select(Some(page), |r| {
            r.company_id == company_id && r.document_type == document_type
        }))
    }

    async fn find_company_logos(&self, company_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state.select(None, |r| {
            r.company_id == company_id
                && r.entity_type == EntityType::Company
                && r.document_type == "logo"
        }))
    }

    async fn search(&self, filters: &FileFilters, page: Page) -> Result<Vec<FileRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state.select(Some(page), |r| filters.matches(r)))
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: JsonValue,
    ) -> Result<Option<FileRecord>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.records.get_mut(&id).map(|record| {
            record.metadata = metadata;
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.records.get_mut(&id) {
            Some(record) if record.is_active => {
                record.is_active = false;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.records.remove(&id).is_some())
    }

    async fn stats(&self, company_id: &str) -> Result<FileStats, AppError> {
        let state = self.state.lock().await;
        let since = Utc::now() - Duration::hours(24);

        let mut stats = FileStats::default();
        for record in state.select(None, |r| r.company_id == company_id) {
            stats.total_files += 1;
            stats.total_size += record.size;
            *stats
                .files_by_type
                .entry(record.document_type.clone())
                .or_insert(0) += 1;
            *stats
                .files_by_entity
                .entry(record.entity_type.as_str().to_string())
                .or_insert(0) += 1;
            if record.upload_date >= since {
                stats.recent_uploads += 1;
            }
        }

        Ok(stats)
    }
}
