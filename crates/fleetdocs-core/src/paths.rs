//! Folder hierarchy of stored documents and the document-type taxonomy.
//!
//! Every object lives under a folder derived from its owner:
//!
//! ```text
//! company/{companyId}
//! company/{companyId}/logo
//! company/{companyId}/staff/{entityId}/documents
//! company/{companyId}/drivers/{entityId}/documents
//! company/{companyId}/passengers/{entityId}/documents
//! ```
//!
//! with `original/` and `thumb/` appended at write time.

use crate::error::UploadError;
use crate::models::EntityType;

const COMPANY_DOCUMENT_TYPES: &[&str] = &["logo"];
const STAFF_DOCUMENT_TYPES: &[&str] = &["cni", "cmu", "carte_sejour", "contrat", "photo", "autre"];
const DRIVER_DOCUMENT_TYPES: &[&str] = &[
    "permis_conduite",
    "cni",
    "cmu",
    "carte_sejour",
    "certificat_medical",
    "photo",
    "autre",
];
const PASSENGER_DOCUMENT_TYPES: &[&str] = &["cni", "passeport", "billet", "photo", "autre"];

/// Top-level folders accepted by generic folder uploads.
const GENERIC_ROOT_FOLDERS: &[&str] = &["company", "drivers", "vehicles", "other"];

const ORIGINAL_VARIANT: &str = "original";
const THUMB_VARIANT: &str = "thumb";

/// Resolved folder of a batch. Object keys are built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    folder: String,
}

impl StorageLocation {
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Key of the primary asset.
    pub fn original_key(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.folder, ORIGINAL_VARIANT, filename)
    }

    /// Key of the derived thumbnail. Same file name as the original.
    pub fn thumb_key(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.folder, THUMB_VARIANT, filename)
    }
}

/// Stateless resolver of storage folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn allowed_document_types(entity_type: EntityType) -> &'static [&'static str] {
        match entity_type {
            EntityType::Company => COMPANY_DOCUMENT_TYPES,
            EntityType::Staff => STAFF_DOCUMENT_TYPES,
            EntityType::Driver => DRIVER_DOCUMENT_TYPES,
            EntityType::Passenger => PASSENGER_DOCUMENT_TYPES,
        }
    }

    /// True iff `document_type` is declared for `entity_type`. Unknown entity types are never valid.
    pub fn is_document_type_valid(&self, entity_type: &str, document_type: &str) -> bool {
        entity_type
            .parse::<EntityType>()
            .map(|et| Self::allowed_document_types(et).contains(&document_type))
            .unwrap_or(false)
    }

    pub fn resolve(
        &self,
        entity_type: &str,
        company_id: &str,
        entity_id: Option<&str>,
        document_type: Option<&str>,
    ) -> Result<StorageLocation, UploadError> {
        let company_id = company_id.trim();
        if company_id.is_empty() {
            return Err(UploadError::MissingCompanyId);
        }
        let entity_type: EntityType = entity_type.parse()?;
        check_segment(company_id)?;

        let folder = match entity_type.collection_segment() {
            None => match document_type {
                Some("logo") => format!("company/{}/logo", company_id),
                _ => format!("company/{}", company_id),
            },
            Some(collection) => {
                let entity_id = entity_id
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or(UploadError::MissingEntityId(entity_type))?;
                check_segment(entity_id)?;
                format!(
                    "company/{}/{}/{}/documents",
                    company_id, collection, entity_id
                )
            }
        };

        Ok(StorageLocation { folder })
    }

    /// Validates the target of a generic folder upload.
    pub fn resolve_folder(&self, folder: &str) -> Result<StorageLocation, UploadError> {
        let folder = folder.trim().trim_end_matches('/');
        let invalid = || UploadError::InvalidFolder(folder.to_string());

        let allowed = GENERIC_ROOT_FOLDERS.contains(&folder) || folder.starts_with("company/");
        if !allowed || folder.contains('\\') {
            return Err(invalid());
        }
        if folder
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid());
        }

        Ok(StorageLocation {
            folder: folder.to_string(),
        })
    }
}

fn check_segment(segment: &str) -> Result<(), UploadError> {
    if segment == "." || segment == ".." || segment.contains('/') || segment.contains('\\') {
        return Err(UploadError::InvalidPathSegment(segment.to_string()));
    }
    Ok(())
}
