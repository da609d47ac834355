//! Configuration module
//!
//! Settings are read from the process environment once at startup; a `.env`
//! file is loaded first when present.

use std::env;

use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_CONCURRENCY: usize = 8;
const THUMBNAIL_WIDTH: u32 = 200;
const THUMBNAIL_QUALITY: u8 = 70;
const B2_API_URL: &str = "https://api.backblazeb2.com";
const B2_TIMEOUT_SECS: u64 = 60;
const LOCAL_STORAGE_PATH: &str = "public";
const PUBLIC_MOUNT: &str = "/public";

const LOGO_MAX_FILE_SIZE_MB: usize = 2;
const LOGO_MAX_FILES: usize = 1;
const IDENTITY_MAX_FILE_SIZE_MB: usize = 5;
const IDENTITY_MAX_FILES: usize = 3;
const GENERAL_MAX_FILE_SIZE_MB: usize = 10;
const GENERAL_MAX_FILES: usize = 5;
const GENERIC_MAX_FILE_SIZE_MB: usize = 10;
const GENERIC_MAX_FILES: usize = 10;

const MB: usize = 1024 * 1024;

/// Size and count bounds of one upload category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryLimits {
    pub max_file_size_bytes: usize,
    pub max_files: usize,
}

impl CategoryLimits {
    pub const fn new(max_file_size_mb: usize, max_files: usize) -> Self {
        Self {
            max_file_size_bytes: max_file_size_mb.saturating_mul(MB),
            max_files,
        }
    }
}

/// Limits per upload category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub logo: CategoryLimits,
    pub identity: CategoryLimits,
    pub general: CategoryLimits,
    pub generic: CategoryLimits,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            logo: CategoryLimits::new(LOGO_MAX_FILE_SIZE_MB, LOGO_MAX_FILES),
            identity: CategoryLimits::new(IDENTITY_MAX_FILE_SIZE_MB, IDENTITY_MAX_FILES),
            general: CategoryLimits::new(GENERAL_MAX_FILE_SIZE_MB, GENERAL_MAX_FILES),
            generic: CategoryLimits::new(GENERIC_MAX_FILE_SIZE_MB, GENERIC_MAX_FILES),
        }
    }
}

/// Backblaze B2 settings. Credentials stay optional here: they are checked when
/// a batch opens a storage session, so a local-only deployment never needs them.
#[derive(Clone, Debug)]
pub struct B2Config {
    pub key_id: Option<String>,
    pub application_key: Option<String>,
    pub bucket_id: Option<String>,
    pub bucket_name: Option<String>,
    pub api_url: String,
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct FleetDocsConfig {
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub public_mount: String,
    pub b2: B2Config,
    pub max_upload_concurrency: usize,
    pub thumbnail_width: u32,
    pub thumbnail_quality: u8,
    pub upload_limits: UploadLimits,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<FleetDocsConfig>);

impl Config {
    fn as_fleetdocs(&self) -> &FleetDocsConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = FleetDocsConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_fleetdocs().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_fleetdocs().environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn environment(&self) -> &str {
        &self.as_fleetdocs().environment
    }

    pub fn database_url(&self) -> &str {
        &self.as_fleetdocs().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_fleetdocs().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_fleetdocs().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_fleetdocs().storage_backend
    }

    pub fn local_storage_path(&self) -> &str {
        &self.as_fleetdocs().local_storage_path
    }

    pub fn public_mount(&self) -> &str {
        &self.as_fleetdocs().public_mount
    }

    pub fn b2(&self) -> &B2Config {
        &self.as_fleetdocs().b2
    }

    pub fn max_upload_concurrency(&self) -> usize {
        self.as_fleetdocs().max_upload_concurrency
    }

    pub fn thumbnail_width(&self) -> u32 {
        self.as_fleetdocs().thumbnail_width
    }

    pub fn thumbnail_quality(&self) -> u8 {
        self.as_fleetdocs().thumbnail_quality
    }

    pub fn upload_limits(&self) -> UploadLimits {
        self.as_fleetdocs().upload_limits
    }
}

impl FleetDocsConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |primary: &str, alias: &str| lookup(primary).or_else(|| lookup(alias));

        let storage_backend = match var("STORAGE_BACKEND", "FILE_STORAGE") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let category = |prefix: &str, size_mb: usize, files: usize| CategoryLimits {
            max_file_size_bytes: lookup(&format!("{}_MAX_FILE_SIZE_MB", prefix))
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(size_mb)
                .saturating_mul(MB),
            max_files: lookup(&format!("{}_MAX_FILES", prefix))
                .and_then(|s| s.parse().ok())
                .unwrap_or(files),
        };

        let upload_limits = UploadLimits {
            logo: category("LOGO", LOGO_MAX_FILE_SIZE_MB, LOGO_MAX_FILES),
            identity: category("IDENTITY", IDENTITY_MAX_FILE_SIZE_MB, IDENTITY_MAX_FILES),
            general: category("GENERAL", GENERAL_MAX_FILE_SIZE_MB, GENERAL_MAX_FILES),
            generic: category("GENERIC", GENERIC_MAX_FILE_SIZE_MB, GENERIC_MAX_FILES),
        };

        let b2 = B2Config {
            key_id: var("B2_KEY_ID", "KEY_ID"),
            application_key: var("B2_APPLICATION_KEY", "APP_KEY"),
            bucket_id: var("B2_BUCKET_ID", "BUCKET_ID"),
            bucket_name: var("B2_BUCKET_NAME", "BUCKET_NAME"),
            api_url: lookup("B2_API_URL")
                .unwrap_or_else(|| B2_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout_seconds: lookup("B2_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(B2_TIMEOUT_SECS),
        };

        Ok(FleetDocsConfig {
            environment: var("ENVIRONMENT", "APP_ENV").unwrap_or_else(|| "development".to_string()),
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: lookup("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| LOCAL_STORAGE_PATH.to_string()),
            public_mount: lookup("PUBLIC_MOUNT")
                .unwrap_or_else(|| PUBLIC_MOUNT.to_string())
                .trim_end_matches('/')
                .to_string(),
            b2,
            max_upload_concurrency: lookup("MAX_UPLOAD_CONCURRENCY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_UPLOAD_CONCURRENCY),
            thumbnail_width: lookup("THUMBNAIL_WIDTH")
                .and_then(|s| s.parse().ok())
                .unwrap_or(THUMBNAIL_WIDTH),
            thumbnail_quality: lookup("THUMBNAIL_QUALITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(THUMBNAIL_QUALITY),
            upload_limits,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.max_upload_concurrency == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_CONCURRENCY must be at least 1"));
        }

        if self.thumbnail_width == 0 {
            return Err(anyhow::anyhow!("THUMBNAIL_WIDTH must be at least 1"));
        }

        if !(1..=100).contains(&self.thumbnail_quality) {
            return Err(anyhow::anyhow!("THUMBNAIL_QUALITY must be between 1 and 100"));
        }

        let limits = self.upload_limits;
        for (name, category) in [
            ("LOGO", limits.logo),
            ("IDENTITY", limits.identity),
            ("GENERAL", limits.general),
            ("GENERIC", limits.generic),
        ] {
            if category.max_files == 0 || category.max_file_size_bytes == 0 {
                return Err(anyhow::anyhow!(
                    "{}_MAX_FILES and {}_MAX_FILE_SIZE_MB must be at least 1",
                    name,
                    name
                ));
            }
        }

        // B2 credentials are checked per batch; only the local root must be usable here.
        if self.storage_backend == StorageBackend::Local && self.local_storage_path.trim().is_empty()
        {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must not be empty when using local storage backend"
            ));
        }

        Ok(())
    }
}
