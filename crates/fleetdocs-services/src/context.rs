//! Application bootstrap
//!
//! Validates configuration, connects and migrates the database and selects the
//! storage backend once. The resulting context is shared by every command.

use std::sync::Arc;

use anyhow::{Context, Result};
use fleetdocs_core::Config;
use fleetdocs_db::{setup_database, FileRecordRepository, FileRecordStore};
use fleetdocs_storage::{create_storage, Storage};

use crate::files::FileService;
use crate::upload::UploadOrchestrator;

/// Shared services built from one configuration.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub records: Arc<dyn FileRecordStore>,
    pub uploads: UploadOrchestrator,
    pub files: FileService,
}

impl AppContext {
    /// Initialize the application from configuration.
    pub async fn initialize(config: Config) -> Result<Self> {
        // Fail fast on misconfiguration
        config
            .validate()
            .context("Configuration validation failed")?;
        tracing::info!(
            environment = %config.environment(),
            "Configuration loaded and validated successfully"
        );

        let pool = setup_database(&config).await?;
        let records: Arc<dyn FileRecordStore> = Arc::new(FileRecordRepository::new(pool));

        let storage = create_storage(&config)
            .await
            .context("Failed to initialize storage backend")?;

        Ok(Self::from_parts(config, storage, records))
    }

    /// Assemble a context from already-built collaborators.
    pub fn from_parts(
        config: Config,
        storage: Arc<dyn Storage>,
        records: Arc<dyn FileRecordStore>,
    ) -> Self {
        let uploads =
            UploadOrchestrator::from_config(&config, Arc::clone(&storage), Arc::clone(&records));
        let files = FileService::new(Arc::clone(&storage), Arc::clone(&records));

        Self {
            config: Arc::new(config),
            storage,
            records,
            uploads,
            files,
        }
    }
}
