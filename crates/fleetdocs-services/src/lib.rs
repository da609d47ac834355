//! fleetdocs services layer
//!
//! This crate is the **business service layer**: upload orchestration and file
//! management, plus the bootstrap that wires configuration, database and
//! storage together. It re-exports the pieces callers need so that binaries
//! depend on a single service facade.

pub mod context;
pub mod files;
pub mod upload;

pub use context::AppContext;
pub use files::FileService;
pub use upload::{UploadOrchestrator, DEFAULT_MAX_UPLOAD_CONCURRENCY};

pub use fleetdocs_db::{FileRecordRepository, FileRecordStore, InMemoryFileRecordStore};
pub use fleetdocs_processing::{ThumbnailGenerator, UploadValidator};
pub use fleetdocs_storage::{
    create_storage, ByteStream, ObjectRef, Storage, StorageBackend, StorageError, StorageResult,
    StorageSession,
};
#[cfg(feature = "storage-b2")]
pub use fleetdocs_storage::B2Storage;
#[cfg(feature = "storage-local")]
pub use fleetdocs_storage::LocalStorage;
