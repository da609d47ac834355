//! Shared object key rules for storage backends.
//!
//! Keys are relative, `/`-separated object names such as
//! `company/ACME1/logo/original/1700000000000_ab12cd34_logo.png`.

use crate::traits::{StorageError, StorageResult};

/// Reject keys that are empty, absolute or could escape the storage root.
///
/// Dots inside a segment are fine (`photo..jpg`); only `.` and `..` segments
/// and empty segments are refused.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains('\\') {
        return Err(invalid_key());
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid_key());
    }
    Ok(())
}

fn invalid_key() -> StorageError {
    StorageError::InvalidKey("Storage key contains invalid characters".to_string())
}

/// Percent-encode every segment of a key, keeping the `/` separators.
#[cfg_attr(not(feature = "storage-b2"), allow(dead_code))]
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
