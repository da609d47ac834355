//! Upload orchestration
//!
//! A batch is validated as a whole before any I/O. Each file then runs its own
//! pipeline as a spawned task: store original → thumbnail (images only) →
//! metadata record. Failures are isolated per file and reported in the
//! aggregated response, in input order.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use fleetdocs_core::models::{
    EntityType, FolderUploadResponse, NewFileRecord, Organization, UploadOutcome, UploadRequest,
    UploadResponse, UploadedFile,
};
use fleetdocs_core::{
    Config, FileFailure, FilenameGenerator, PathResolver, StorageLocation, UploadError,
};
use fleetdocs_db::FileRecordStore;
use fleetdocs_processing::{
    normalize_mime_type, ThumbnailGenerator, UploadCategory, UploadValidator,
};
use fleetdocs_storage::{ObjectRef, Storage, StorageError, StorageSession};
use serde_json::json;
use tokio::sync::Semaphore;

/// Default number of files of one batch processed at the same time.
pub const DEFAULT_MAX_UPLOAD_CONCURRENCY: usize = 8;

/// Name generation attempts when the backend reports the key as taken.
const MAX_NAME_ATTEMPTS: usize = 3;

/// Drives upload batches through storage, thumbnailing and metadata persistence.
#[derive(Clone)]
pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    records: Arc<dyn FileRecordStore>,
    resolver: PathResolver,
    names: Arc<FilenameGenerator>,
    validator: UploadValidator,
    thumbnails: ThumbnailGenerator,
    max_concurrency: usize,
}

impl UploadOrchestrator {
    pub fn new(storage: Arc<dyn Storage>, records: Arc<dyn FileRecordStore>) -> Self {
        Self {
            storage,
            records,
            resolver: PathResolver::new(),
            names: Arc::new(FilenameGenerator::new()),
            validator: UploadValidator::default(),
            thumbnails: ThumbnailGenerator::default(),
            max_concurrency: DEFAULT_MAX_UPLOAD_CONCURRENCY,
        }
    }

    /// Orchestrator with the limits, thumbnail settings and concurrency from config.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        records: Arc<dyn FileRecordStore>,
    ) -> Self {
        Self::new(storage, records)
            .with_validator(UploadValidator::new(config.upload_limits()))
            .with_thumbnails(ThumbnailGenerator::new(
                config.thumbnail_width(),
                config.thumbnail_quality(),
            ))
            .with_max_concurrency(config.max_upload_concurrency())
    }

    pub fn with_validator(mut self, validator: UploadValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_thumbnails(mut self, thumbnails: ThumbnailGenerator) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Share a name generator across orchestrators of the same process.
    pub fn with_filename_generator(mut self, names: Arc<FilenameGenerator>) -> Self {
        self.names = names;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Upload a batch for one company entity and record every stored file.
    ///
    /// Returns `Err` only when the whole batch is rejected up front; once files
    /// start flowing, failures are reported per file in the response.
    #[tracing::instrument(
        skip(self, request),
        fields(
            company_id = %request.company_id,
            entity_type = %request.entity_type,
            document_type = %request.document_type,
            file_count = request.files.len()
        )
    )]
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        let start = Instant::now();
        let UploadRequest {
            company_id,
            entity_type,
            entity_id,
            document_type,
            files,
        } = request;

        let location = self.resolver.resolve(
            &entity_type,
            &company_id,
            entity_id.as_deref(),
            Some(&document_type),
        )?;
        let entity_type: EntityType = entity_type.parse()?;
        if !PathResolver::allowed_document_types(entity_type).contains(&document_type.as_str()) {
            return Err(UploadError::InvalidDocumentType {
                entity_type: entity_type.to_string(),
                document_type,
            });
        }

        let category = UploadCategory::for_document(entity_type, &document_type);
        self.validator.validate_batch(category, &files)?;

        let organization = Organization {
            company_id: company_id.trim().to_string(),
            entity_type,
            entity_id: if entity_type.requires_entity_id() {
                entity_id.map(|id| id.trim().to_string())
            } else {
                None
            },
            document_type,
        };

        let outcomes = self
            .process(location, files, Some(organization.clone()))
            .await?;
        let response = UploadResponse::from_outcomes(&outcomes, organization);

        tracing::info!(
            stored = response.files_data.len(),
            failed = response.failed_files.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload batch completed"
        );

        Ok(response)
    }

    /// Upload a batch to a generic folder. No metadata records are written.
    #[tracing::instrument(skip(self, files), fields(folder = %folder, file_count = files.len()))]
    pub async fn upload_to_folder(
        &self,
        folder: &str,
        files: Vec<UploadedFile>,
    ) -> Result<FolderUploadResponse, UploadError> {
        let start = Instant::now();
        let location = self.resolver.resolve_folder(folder)?;
        self.validator
            .validate_batch(UploadCategory::Generic, &files)?;

        let folder = location.folder().to_string();
        let outcomes = self.process(location, files, None).await?;
        let response = FolderUploadResponse::from_outcomes(&outcomes, folder);

        tracing::info!(
            stored = response.files_data.len(),
            failed = response.failed_files.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Folder upload batch completed"
        );

        Ok(response)
    }

    /// Open the batch session and run every file through its pipeline.
    ///
    /// Missing backend settings reject the batch. Any other session failure is
    /// reported as a storage failure of each file.
    async fn process(
        &self,
        location: StorageLocation,
        files: Vec<UploadedFile>,
        organization: Option<Organization>,
    ) -> Result<Vec<UploadOutcome>, UploadError> {
        match self.storage.open_session().await {
            Ok(session) => Ok(self.run_batch(session, location, files, organization).await),
            Err(StorageError::MissingConfiguration(setting)) => {
                Err(UploadError::BackendConfigurationMissing(setting))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to open storage session");
                let reason = e.to_string();
                Ok(files
                    .into_iter()
                    .map(|file| {
                        let size = file.size();
                        UploadOutcome::failed(
                            file.original_name,
                            normalize_mime_type(&file.mime_type),
                            size,
                            FileFailure::StorageWrite(reason.clone()),
                        )
                    })
                    .collect())
            }
        }
    }

    /// Spawn one task per file, bounded by a per-batch semaphore, and join in input order.
    async fn run_batch(
        &self,
        session: Arc<dyn StorageSession>,
        location: StorageLocation,
        files: Vec<UploadedFile>,
        organization: Option<Organization>,
    ) -> Vec<UploadOutcome> {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let job = FileJob {
                session: Arc::clone(&session),
                records: Arc::clone(&self.records),
                names: Arc::clone(&self.names),
                thumbnails: self.thumbnails,
                location: location.clone(),
                organization: organization.clone(),
            };
            let permits = Arc::clone(&permits);
            let summary = (file.original_name.clone(), file.mime_type.clone(), file.size());

            let handle = tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return UploadOutcome::failed(
                            file.original_name,
                            file.mime_type,
                            file.data.len(),
                            FileFailure::Aborted(e.to_string()),
                        )
                    }
                };
                job.run(file).await
            });
            handles.push((summary, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for ((original_name, mime_type, size), handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        original_name = %original_name,
                        "Upload task aborted"
                    );
                    UploadOutcome::failed(
                        original_name,
                        mime_type,
                        size,
                        FileFailure::Aborted(e.to_string()),
                    )
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// Everything one file's pipeline needs, owned so it can move into a task.
struct FileJob {
    session: Arc<dyn StorageSession>,
    records: Arc<dyn FileRecordStore>,
    names: Arc<FilenameGenerator>,
    thumbnails: ThumbnailGenerator,
    location: StorageLocation,
    organization: Option<Organization>,
}

struct StoredThumbnail {
    key: String,
    url: String,
}

impl FileJob {
    async fn run(self, file: UploadedFile) -> UploadOutcome {
        let mime_type = normalize_mime_type(&file.mime_type);
        let size = file.size();

        let (filename, original) = match self.store_original(&file, &mime_type).await {
            Ok(stored) => stored,
            Err(failure) => {
                tracing::warn!(
                    error = %failure,
                    original_name = %file.original_name,
                    "File not stored"
                );
                return UploadOutcome::failed(file.original_name, mime_type, size, failure);
            }
        };
        let file_url = self.session.public_url(&original);

        let thumbnail = if self.thumbnails.should_generate(&mime_type) {
            match self.store_thumbnail(&filename, file.data.clone()).await {
                Ok(thumbnail) => Some(thumbnail),
                Err(failure) => {
                    tracing::warn!(
                        error = %failure,
                        key = %original.key,
                        "Thumbnail omitted"
                    );
                    None
                }
            }
        } else {
            None
        };

        let mut outcome = UploadOutcome {
            original_name: file.original_name,
            filename,
            mime_type,
            size,
            storage_key: Some(original.key.clone()),
            file_url: Some(file_url),
            thumbnail_url: thumbnail.as_ref().map(|t| t.url.clone()),
            file_id: original.file_id.clone(),
            db_id: None,
            stored_to_backend: true,
            persisted_to_metadata_store: false,
            error: None,
        };

        if let Some(ref organization) = self.organization {
            let record = self.new_record(organization, &outcome, &original, thumbnail.as_ref());
            match self.records.create(record).await {
                Ok(created) => {
                    outcome.db_id = Some(created.id);
                    outcome.persisted_to_metadata_store = true;
                }
                Err(e) => {
                    // The object stays in storage; the response flags the missing record.
                    tracing::error!(
                        error = %e,
                        key = %original.key,
                        "Failed to persist file metadata"
                    );
                    outcome.error = Some(FileFailure::MetadataPersist(e.to_string()));
                }
            }
        }

        outcome
    }

    /// Write the original, regenerating the name while the key is taken.
    async fn store_original(
        &self,
        file: &UploadedFile,
        mime_type: &str,
    ) -> Result<(String, ObjectRef), FileFailure> {
        let mut attempt = 1;
        loop {
            let filename = self.names.generate(&file.original_name);
            let key = self.location.original_key(&filename);

            match self
                .session
                .write_object(&key, mime_type, file.data.clone())
                .await
            {
                Ok(object) => return Ok((filename, object)),
                Err(StorageError::AlreadyExists(_)) if attempt < MAX_NAME_ATTEMPTS => {
                    tracing::debug!(key = %key, attempt, "Object key taken, regenerating name");
                    attempt += 1;
                }
                Err(e) => return Err(FileFailure::StorageWrite(e.to_string())),
            }
        }
    }

    async fn store_thumbnail(
        &self,
        filename: &str,
        data: Bytes,
    ) -> Result<StoredThumbnail, FileFailure> {
        let thumbnail = self
            .thumbnails
            .generate(data)
            .await
            .map_err(|e| FileFailure::ThumbnailGeneration(e.to_string()))?;

        let key = self.location.thumb_key(filename);
        let object = self
            .session
            .write_object(&key, thumbnail.content_type, thumbnail.data)
            .await
            .map_err(|e| FileFailure::ThumbnailGeneration(e.to_string()))?;

        Ok(StoredThumbnail {
            url: self.session.public_url(&object),
            key,
        })
    }

    fn new_record(
        &self,
        organization: &Organization,
        outcome: &UploadOutcome,
        original: &ObjectRef,
        thumbnail: Option<&StoredThumbnail>,
    ) -> NewFileRecord {
        NewFileRecord {
            company_id: organization.company_id.clone(),
            entity_type: organization.entity_type,
            entity_id: organization.entity_id.clone(),
            document_type: organization.document_type.clone(),
            original_name: outcome.original_name.clone(),
            filename: outcome.filename.clone(),
            mime_type: outcome.mime_type.clone(),
            size: outcome.size as i64,
            file_url: outcome.file_url.clone().unwrap_or_default(),
            thumbnail_url: outcome.thumbnail_url.clone(),
            file_id: original.file_id.clone(),
            storage_key: original.key.clone(),
            thumbnail_key: thumbnail.map(|t| t.key.clone()),
            metadata: json!({
                "folderPath": self.location.folder(),
                "isImage": outcome.mime_type.starts_with("image/"),
                "uploadedAt": Utc::now().to_rfc3339(),
                "storageKey": original.key,
            }),
        }
    }
}
