//! Batch upload pipeline.

mod orchestrator;

pub use orchestrator::{UploadOrchestrator, DEFAULT_MAX_UPLOAD_CONCURRENCY};
