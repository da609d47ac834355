//! File metadata record: the persisted description of one stored asset.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::UploadError;

/// Default page size for listing queries.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_PAGE_LIMIT: i64 = 500;

/// Owner category of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "entity_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Company,
    Staff,
    Driver,
    Passenger,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Company,
        EntityType::Staff,
        EntityType::Driver,
        EntityType::Passenger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Company => "company",
            EntityType::Staff => "staff",
            EntityType::Driver => "driver",
            EntityType::Passenger => "passenger",
        }
    }

    /// Sub-entities live under their own collection and need an id.
    pub fn requires_entity_id(&self) -> bool {
        !matches!(self, EntityType::Company)
    }

    /// Folder segment of the entity collection under a company.
    pub fn collection_segment(&self) -> Option<&'static str> {
        match self {
            EntityType::Company => None,
            EntityType::Staff => Some("staff"),
            EntityType::Driver => Some("drivers"),
            EntityType::Passenger => Some("passengers"),
        }
    }
}

impl FromStr for EntityType {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(EntityType::Company),
            "staff" => Ok(EntityType::Staff),
            "driver" => Ok(EntityType::Driver),
            "passenger" => Ok(EntityType::Passenger),
            other => Err(UploadError::UnsupportedEntityType(other.to_string())),
        }
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Whether a record lookup may return soft-deleted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordScope {
    #[default]
    ActiveOnly,
    IncludeInactive,
}

impl RecordScope {
    pub fn includes_inactive(&self) -> bool {
        matches!(self, RecordScope::IncludeInactive)
    }
}

/// Limit/offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            offset: offset.max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT, 0)
    }
}

/// A persisted file metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub company_id: String,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub document_type: String,
    pub original_name: String,
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    /// Backend object id; only the remote backend assigns one.
    pub file_id: Option<String>,
    pub storage_key: String,
    pub thumbnail_key: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub is_active: bool,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Lower-cased extension of the original name, with its leading dot.
    pub fn extension(&self) -> String {
        Path::new(&self.original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default()
    }

    pub fn to_public(&self) -> PublicFileRecord {
        PublicFileRecord {
            is_image: self.is_image(),
            extension: self.extension(),
            record: self.clone(),
        }
    }
}

/// JSON view of a record with the derived display fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicFileRecord {
    #[serde(flatten)]
    pub record: FileRecord,
    pub is_image: bool,
    pub extension: String,
}

/// Insert payload for a new record. Id, flags and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFileRecord {
    pub company_id: String,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub document_type: String,
    pub original_name: String,
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    pub file_id: Option<String>,
    pub storage_key: String,
    pub thumbnail_key: Option<String>,
    pub metadata: JsonValue,
}

/// Search filters. Every field is optional; set fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFilters {
    pub company_id: Option<String>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub document_type: Option<String>,
    /// Inclusive lower bound on the upload date.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the upload date.
    pub date_to: Option<DateTime<Utc>>,
}

impl FileFilters {
    /// In-memory evaluation of the filters, activity excluded.
    pub fn matches(&self, record: &FileRecord) -> bool {
        if let Some(ref company_id) = self.company_id {
            if &record.company_id != company_id {
                return false;
            }
        }
        if let Some(entity_type) = self.entity_type {
            if record.entity_type != entity_type {
                return false;
            }
        }
        if let Some(ref entity_id) = self.entity_id {
            if record.entity_id.as_ref() != Some(entity_id) {
                return false;
            }
        }
        if let Some(ref document_type) = self.document_type {
            if &record.document_type != document_type {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if record.upload_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if record.upload_date > to {
                return false;
            }
        }
        true
    }
}

/// Aggregation over the active records of one company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub total_files: i64,
    pub total_size: i64,
    pub files_by_type: BTreeMap<String, i64>,
    pub files_by_entity: BTreeMap<String, i64>,
    /// Uploads in the last 24 hours.
    pub recent_uploads: i64,
}
