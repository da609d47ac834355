//! fleetdocs processing library
//!
//! Pre-storage checks of upload batches and thumbnail rendering for images.

pub mod thumbnail;
pub mod validator;

pub use thumbnail::{
    Thumbnail, ThumbnailError, ThumbnailGenerator, DEFAULT_THUMBNAIL_QUALITY,
    DEFAULT_THUMBNAIL_WIDTH,
};
pub use validator::{
    is_allowed_mime_type, normalize_mime_type, UploadCategory, UploadValidator,
    ALLOWED_MIME_TYPES,
};
