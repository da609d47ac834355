use fleetdocs_core::models::{EntityType, UploadedFile};
use fleetdocs_core::{CategoryLimits, UploadError, UploadLimits};

/// MIME types accepted for any upload, after normalization.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpg",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/csv",
];

const IDENTITY_DOCUMENT_TYPES: &[&str] = &[
    "cni",
    "cmu",
    "carte_sejour",
    "photo",
    "permis_conduite",
    "passeport",
];

/// Strip parameters and lower-case: `Image/PNG; q=1` becomes `image/png`.
pub fn normalize_mime_type(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    let normalized = normalize_mime_type(mime_type);
    ALLOWED_MIME_TYPES.contains(&normalized.as_str())
}

/// Limit category of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    Logo,
    Identity,
    General,
    /// Generic folder uploads.
    Generic,
}

impl UploadCategory {
    pub fn for_document(entity_type: EntityType, document_type: &str) -> Self {
        if entity_type == EntityType::Company && document_type == "logo" {
            UploadCategory::Logo
        } else if IDENTITY_DOCUMENT_TYPES.contains(&document_type) {
            UploadCategory::Identity
        } else {
            UploadCategory::General
        }
    }

    fn images_only(&self) -> bool {
        matches!(self, UploadCategory::Logo)
    }
}

/// Upload batch validator
///
/// Checks file count, per-file size and MIME type for a category. Runs before
/// any I/O so a rejected batch leaves nothing behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadValidator {
    limits: UploadLimits,
}

impl UploadValidator {
    pub fn new(limits: UploadLimits) -> Self {
        Self { limits }
    }

    pub fn limits_for(&self, category: UploadCategory) -> CategoryLimits {
        match category {
            UploadCategory::Logo => self.limits.logo,
            UploadCategory::Identity => self.limits.identity,
            UploadCategory::General => self.limits.general,
            UploadCategory::Generic => self.limits.generic,
        }
    }

    pub fn validate_batch(
        &self,
        category: UploadCategory,
        files: &[UploadedFile],
    ) -> Result<(), UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFilesProvided);
        }

        let limits = self.limits_for(category);
        if files.len() > limits.max_files {
            return Err(UploadError::TooManyFiles {
                count: files.len(),
                max: limits.max_files,
            });
        }

        for file in files {
            self.validate_file(category, limits, file)?;
        }

        Ok(())
    }

    fn validate_file(
        &self,
        category: UploadCategory,
        limits: CategoryLimits,
        file: &UploadedFile,
    ) -> Result<(), UploadError> {
        let size = file.size();
        if size == 0 {
            return Err(UploadError::EmptyFile {
                name: file.original_name.clone(),
            });
        }

        if size > limits.max_file_size_bytes {
            return Err(UploadError::FileTooLarge {
                name: file.original_name.clone(),
                size,
                max: limits.max_file_size_bytes,
            });
        }

        let normalized = normalize_mime_type(&file.mime_type);
        let allowed = ALLOWED_MIME_TYPES.contains(&normalized.as_str())
            && (!category.images_only() || normalized.starts_with("image/"));
        if !allowed {
            return Err(UploadError::UnsupportedMimeType {
                name: file.original_name.clone(),
                mime_type: file.mime_type.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, size: usize) -> UploadedFile {
        UploadedFile::new(name, mime, vec![7u8; size])
    }

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(normalize_mime_type("Image/PNG; q=1"), "image/png");
        assert_eq!(normalize_mime_type(" text/csv "), "text/csv");
        assert!(is_allowed_mime_type("application/PDF"));
        assert!(!is_allowed_mime_type("application/zip"));
    }

    #[test]
    fn test_category_selection() {
        assert_eq!(
            UploadCategory::for_document(EntityType::Company, "logo"),
            UploadCategory::Logo
        );
        assert_eq!(
            UploadCategory::for_document(EntityType::Driver, "permis_conduite"),
            UploadCategory::Identity
        );
        assert_eq!(
            UploadCategory::for_document(EntityType::Passenger, "billet"),
            UploadCategory::General
        );
        assert_eq!(
            UploadCategory::for_document(EntityType::Staff, "contrat"),
            UploadCategory::General
        );
    }

    #[test]
    fn test_empty_batch_rejected() {
        let validator = UploadValidator::default();
        assert_eq!(
            validator.validate_batch(UploadCategory::General, &[]),
            Err(UploadError::NoFilesProvided)
        );
    }

    #[test]
    fn test_too_many_files() {
        let validator = UploadValidator::default();
        let files: Vec<_> = (0..4).map(|i| file(&format!("{}.pdf", i), "application/pdf", 10)).collect();
        assert_eq!(
            validator.validate_batch(UploadCategory::Identity, &files),
            Err(UploadError::TooManyFiles { count: 4, max: 3 })
        );
    }

    #[test]
    fn test_file_too_large() {
        let validator = UploadValidator::default();
        let files = vec![file("big.png", "image/png", 2 * 1024 * 1024 + 1)];
        assert!(matches!(
            validator.validate_batch(UploadCategory::Logo, &files),
            Err(UploadError::FileTooLarge { ref name, .. }) if name == "big.png"
        ));
    }

    #[test]
    fn test_empty_file() {
        let validator = UploadValidator::default();
        let files = vec![file("a.pdf", "application/pdf", 10), file("b.pdf", "application/pdf", 0)];
        assert_eq!(
            validator.validate_batch(UploadCategory::General, &files),
            Err(UploadError::EmptyFile {
                name: "b.pdf".to_string()
            })
        );
    }

    #[test]
    fn test_logo_accepts_images_only() {
        let validator = UploadValidator::default();
        assert!(validator
            .validate_batch(UploadCategory::Logo, &[file("logo.png", "image/png", 10)])
            .is_ok());
        assert!(matches!(
            validator.validate_batch(UploadCategory::Logo, &[file("logo.pdf", "application/pdf", 10)]),
            Err(UploadError::UnsupportedMimeType { .. })
        ));
    }

    #[test]
    fn test_unknown_mime_rejected() {
        let validator = UploadValidator::default();
        assert!(matches!(
            validator.validate_batch(UploadCategory::General, &[file("a.zip", "application/zip", 10)]),
            Err(UploadError::UnsupportedMimeType { ref mime_type, .. }) if mime_type == "application/zip"
        ));
    }

    #[test]
    fn test_custom_limits() {
        let mut limits = UploadLimits::default();
        limits.general = CategoryLimits::new(1, 50);
        let validator = UploadValidator::new(limits);
        let files: Vec<_> = (0..50).map(|i| file(&format!("{}.txt", i), "text/plain", 5)).collect();
        assert!(validator.validate_batch(UploadCategory::General, &files).is_ok());
    }
}
