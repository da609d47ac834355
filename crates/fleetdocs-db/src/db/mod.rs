//! Database repositories for data access layer
//!
//! `files` holds the metadata store seam and its two implementations.
pub mod files;

pub use files::{FileRecordRepository, FileRecordStore, InMemoryFileRecordStore};
