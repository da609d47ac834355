//! fleetdocs storage library
//!
//! This crate provides the storage abstraction and its implementations for
//! fleetdocs: the local filesystem and Backblaze B2.
//!
//! # Object keys
//!
//! Keys are relative object names shared by every backend:
//!
//! - **Original**: `{folder}/original/{filename}`
//! - **Thumbnail**: `{folder}/thumb/{filename}`
//!
//! where `{folder}` comes from `fleetdocs_core::PathResolver`. Keys must not
//! contain `..` or a leading `/`.

#[cfg(feature = "storage-b2")]
pub mod b2;
pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-b2")]
pub use b2::B2Storage;
pub use factory::create_storage;
pub use fleetdocs_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use traits::{ByteStream, ObjectRef, Storage, StorageError, StorageResult, StorageSession};
