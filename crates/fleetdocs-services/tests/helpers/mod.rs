//! Test helpers: local storage in a temp dir, an in-memory record store and
//! fakes that fail on demand.
//!
//! Run from workspace root: `cargo test -p fleetdocs-services`.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fleetdocs_core::models::{
    EntityType, FileFilters, FileRecord, FileStats, NewFileRecord, Page, RecordScope,
    UploadRequest, UploadedFile,
};
use fleetdocs_core::AppError;
use fleetdocs_services::{
    ByteStream, FileRecordStore, InMemoryFileRecordStore, LocalStorage, ObjectRef, Storage,
    StorageBackend, StorageError, StorageResult, StorageSession, UploadOrchestrator,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value as JsonValue;
use tempfile::TempDir;
use uuid::Uuid;

/// Test application: orchestrator plus the collaborators behind it.
pub struct TestApp {
    pub orchestrator: UploadOrchestrator,
    pub storage: Arc<LocalStorage>,
    pub records: Arc<InMemoryFileRecordStore>,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Setup an orchestrator over local storage and an in-memory store.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage = Arc::new(
        LocalStorage::new(temp_dir.path(), "/public".to_string())
            .await
            .expect("Failed to create local storage"),
    );
    let records = Arc::new(InMemoryFileRecordStore::new());
    let orchestrator = UploadOrchestrator::new(storage.clone(), records.clone());

    TestApp {
        orchestrator,
        storage,
        records,
        temp_dir,
    }
}

/// Encoded PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([20, 120, 200])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode png");
    Bytes::from(buf)
}

pub fn pdf_bytes() -> Bytes {
    Bytes::from_static(b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n")
}

pub fn png_file(name: &str) -> UploadedFile {
    UploadedFile::new(name, "image/png", png_bytes(640, 480))
}

pub fn pdf_file(name: &str) -> UploadedFile {
    UploadedFile::new(name, "application/pdf", pdf_bytes())
}

pub fn request(
    company_id: &str,
    entity_type: &str,
    entity_id: Option<&str>,
    document_type: &str,
    files: Vec<UploadedFile>,
) -> UploadRequest {
    UploadRequest {
        company_id: company_id.to_string(),
        entity_type: entity_type.to_string(),
        entity_id: entity_id.map(str::to_string),
        document_type: document_type.to_string(),
        files,
    }
}

/// Count regular files below `dir`, recursively. Missing dirs count as empty.
pub fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// Record store whose `create` fails for originals whose name contains `fail_marker`.
#[derive(Clone)]
pub struct FlakyRecordStore {
    pub inner: InMemoryFileRecordStore,
    fail_marker: String,
}

impl FlakyRecordStore {
    pub fn new(fail_marker: &str) -> Self {
        Self {
            inner: InMemoryFileRecordStore::new(),
            fail_marker: fail_marker.to_string(),
        }
    }
}

#[async_trait]
impl FileRecordStore for FlakyRecordStore {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        if record.original_name.contains(&self.fail_marker) {
            return Err(AppError::Internal("connection reset".to_string()));
        }
        self.inner.create(record).await
    }

    async fn create_many(&self, records: Vec<NewFileRecord>) -> Result<Vec<FileRecord>, AppError> {
        self.inner.create_many(records).await
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> Result<Option<FileRecord>, AppError> {
        self.inner.find_by_id(id, scope).await
    }

    async fn find_by_filename(
        &self,
        filename: &str,
        scope: RecordScope,
    ) -> Result<Option<FileRecord>, AppError> {
        self.inner.find_by_filename(filename, scope).await
    }

    async fn find_by_company(
        &self,
        company_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.inner.find_by_company(company_id, page).await
    }

    async fn find_by_entity(
        &self,
        company_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.inner
            .find_by_entity(company_id, entity_type, entity_id, page)
            .await
    }

    async fn find_by_document_type(
        &self,
        company_id: &str,
        document_type: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.inner
            .find_by_document_type(company_id, document_type, page)
            .await
    }

    async fn find_company_logos(&self, company_id: &str) -> Result<Vec<FileRecord>, AppError> {
        self.inner.find_company_logos(company_id).await
    }

    async fn search(&self, filters: &FileFilters, page: Page) -> Result<Vec<FileRecord>, AppError> {
        self.inner.search(filters, page).await
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: JsonValue,
    ) -> Result<Option<FileRecord>, AppError> {
        self.inner.update_metadata(id, metadata).await
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.soft_delete(id).await
    }

    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.hard_delete(id).await
    }

    async fn stats(&self, company_id: &str) -> Result<FileStats, AppError> {
        self.inner.stats(company_id).await
    }
}

/// How a `FlakyStorage` session misbehaves for keys containing its marker.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    /// Fail the write with a backend error.
    WriteError,
    /// Panic inside the upload task.
    Panic,
    /// Report the key as taken this many times before accepting it.
    Taken(usize),
}

/// Local storage with injectable write faults.
#[derive(Clone)]
pub struct FlakyStorage {
    inner: LocalStorage,
    marker: String,
    fault: Fault,
    taken_reports: Arc<AtomicUsize>,
}

impl FlakyStorage {
    pub fn new(inner: LocalStorage, marker: &str, fault: Fault) -> Self {
        Self {
            inner,
            marker: marker.to_string(),
            fault,
            taken_reports: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn taken_reports(&self) -> usize {
        self.taken_reports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn open_session(&self) -> StorageResult<Arc<dyn StorageSession>> {
        Ok(Arc::new(self.clone()))
    }

    async fn read_object(&self, object: &ObjectRef) -> StorageResult<ByteStream> {
        self.inner.read_object(object).await
    }

    async fn delete_object(&self, object: &ObjectRef) -> StorageResult<()> {
        if object.key.contains(&self.marker) {
            return Err(StorageError::DeleteFailed("backend unavailable".to_string()));
        }
        self.inner.delete_object(object).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[async_trait]
impl StorageSession for FlakyStorage {
    async fn write_object(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<ObjectRef> {
        if key.contains(&self.marker) {
            match self.fault {
                Fault::WriteError => {
                    return Err(StorageError::UploadFailed("disk full".to_string()))
                }
                Fault::Panic => panic!("storage driver crashed"),
                Fault::Taken(times) => {
                    if self.taken_reports.fetch_add(1, Ordering::SeqCst) < times {
                        return Err(StorageError::AlreadyExists(key.to_string()));
                    }
                }
            }
        }
        StorageSession::write_object(&self.inner, key, content_type, data).await
    }

    fn public_url(&self, object: &ObjectRef) -> String {
        StorageSession::public_url(&self.inner, object)
    }
}

/// Storage whose session can never be opened.
pub struct UnreachableStorage;

#[async_trait]
impl Storage for UnreachableStorage {
    async fn open_session(&self) -> StorageResult<Arc<dyn StorageSession>> {
        Err(StorageError::BackendError("authorization failed: 401".to_string()))
    }

    async fn read_object(&self, object: &ObjectRef) -> StorageResult<ByteStream> {
        Err(StorageError::NotFound(object.key.clone()))
    }

    async fn delete_object(&self, _object: &ObjectRef) -> StorageResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::B2
    }
}
