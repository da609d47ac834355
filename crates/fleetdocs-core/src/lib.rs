//! fleetdocs core library
//!
//! Domain models, error types, configuration and the pure naming/path rules
//! shared by every fleetdocs component.

pub mod config;
pub mod error;
pub mod models;
pub mod naming;
pub mod paths;
pub mod storage_types;

// Re-export commonly used types
pub use config::{B2Config, CategoryLimits, Config, FleetDocsConfig, UploadLimits};
pub use error::{AppError, ErrorMetadata, FileFailure, LogLevel, UploadError, UploadStage};
pub use naming::FilenameGenerator;
pub use paths::{PathResolver, StorageLocation};
pub use storage_types::StorageBackend;
