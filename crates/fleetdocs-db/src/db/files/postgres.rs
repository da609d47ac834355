//! Postgres file record repository: CRUD and aggregation over the files table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetdocs_core::models::{
    EntityType, FileFilters, FileRecord, FileStats, NewFileRecord, Page, RecordScope,
};
use fleetdocs_core::AppError;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::FileRecordStore;

const FILE_COLUMNS: &str = "id, company_id, entity_type, entity_id, document_type, original_name, \
     filename, mime_type, size, file_url, thumbnail_url, file_id, storage_key, thumbnail_key, \
     upload_date, is_active, metadata, created_at, updated_at";

/// Row type for the files table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileRow {
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
    pub file_id: Option<String>,
    pub storage_key: String,
    pub thumbnail_key: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub is_active: bool,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRow {
    pub fn to_file_record(self) -> FileRecord {
        FileRecord {
            id: self.id,
            company_id: self.company_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            document_type: self.document_type,
            original_name: self.original_name,
            filename: self.filename,
            mime_type: self.mime_type,
            size: self.size,
            file_url: self.file_url,
            thumbnail_url: self.thumbnail_url,
            file_id: self.file_id,
            storage_key: self.storage_key,
            thumbnail_key: self.thumbnail_key,
            upload_date: self.upload_date,
            is_active: self.is_active,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Map insert failures: a duplicate stored name is a conflict, not a database fault.
fn map_insert_error(err: sqlx::Error, filename: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("File name already recorded: {}", filename))
        }
        other => AppError::Database(other),
    }
}

/// Repository for the files table.
#[derive(Clone)]
pub struct FileRecordRepository {
    pool: PgPool,
}

impl FileRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        record: &NewFileRecord,
    ) -> Result<FileRecord, AppError> {
        let row: FileRow = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            INSERT INTO files (
                id, company_id, entity_type, entity_id, document_type, original_name,
                filename, mime_type, size, file_url, thumbnail_url, file_id,
                storage_key, thumbnail_key, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&record.company_id)
        .bind(record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.document_type)
        .bind(&record.original_name)
        .bind(&record.filename)
        .bind(&record.mime_type)
        .bind(record.size)
        .bind(&record.file_url)
        .bind(&record.thumbnail_url)
        .bind(&record.file_id)
        .bind(&record.storage_key)
        .bind(&record.thumbnail_key)
        .bind(&record.metadata)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_insert_error(e, &record.filename))?;

        Ok(row.to_file_record())
    }
}

#[async_trait]
impl FileRecordStore for FileRecordRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.operation = "insert", filename = %record.filename))]
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        let created = Self::insert_tx(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(created)
    }

    #[tracing::instrument(skip(self, records), fields(db.table = "files", db.operation = "insert", count = records.len()))]
    async fn create_many(&self, records: Vec<NewFileRecord>) -> Result<Vec<FileRecord>, AppError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(records.len());
        for record in &records {
            // Dropping the transaction on error rolls every insert back.
            created.push(Self::insert_tx(&mut tx, record).await?);
        }
        tx.commit().await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = $1 AND ($2 OR is_active = TRUE)",
            FILE_COLUMNS
        ))
        .bind(id)
        .bind(scope.includes_inactive())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRow::to_file_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_by_filename(
        &self,
        filename: &str,
        scope: RecordScope,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files WHERE filename = $1 AND ($2 OR is_active = TRUE)",
            FILE_COLUMNS
        ))
        .bind(filename)
        .bind(scope.includes_inactive())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRow::to_file_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_by_company(
        &self,
        company_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            SELECT {} FROM files
            WHERE company_id = $1 AND is_active = TRUE
            ORDER BY upload_date DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            FILE_COLUMNS
        ))
        .bind(company_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRow::to_file_record).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_by_entity(
        &self,
        company_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            SELECT {} FROM files
            WHERE company_id = $1 AND entity_type = $2 AND entity_id = $3 AND is_active = TRUE
            ORDER BY upload_date DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
            FILE_COLUMNS
        ))
        .bind(company_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRow::to_file_record).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_by_document_type(
        &self,
        company_id: &str,
        document_type: &str,
        page: Page,
    ) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            SELECT {} FROM files
            WHERE company_id = $1 AND document_type = $2 AND is_active = TRUE
            ORDER BY upload_date DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            FILE_COLUMNS
        ))
        .bind(company_id)
        .bind(document_type)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRow::to_file_record).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_company_logos(&self, company_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            SELECT {} FROM files
            WHERE company_id = $1 AND entity_type = 'company' AND document_type = 'logo'
              AND is_active = TRUE
            ORDER BY upload_date DESC, id DESC
            "#,
            FILE_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRow::to_file_record).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn search(&self, filters: &FileFilters, page: Page) -> Result<Vec<FileRecord>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM files WHERE is_active = TRUE",
            FILE_COLUMNS
        ));

        if let Some(ref company_id) = filters.company_id {
            query.push(" AND company_id = ").push_bind(company_id.clone());
        }
        if let Some(entity_type) = filters.entity_type {
            query.push(" AND entity_type = ").push_bind(entity_type);
        }
        if let Some(ref entity_id) = filters.entity_id {
            query.push(" AND entity_id = ").push_bind(entity_id.clone());
        }
        if let Some(ref document_type) = filters.document_type {
            query
                .push(" AND document_type = ")
                .push_bind(document_type.clone());
        }
        if let Some(date_from) = filters.date_from {
            query.push(" AND upload_date >= ").push_bind(date_from);
        }
        if let Some(date_to) = filters.date_to {
            query.push(" AND upload_date <= ").push_bind(date_to);
        }

        query
            .push(" ORDER BY upload_date DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows: Vec<FileRow> = query
            .build_query_as::<FileRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(FileRow::to_file_record).collect())
    }

    #[tracing::instrument(skip(self, metadata), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: JsonValue,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            UPDATE files SET metadata = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(id)
        .bind(&metadata)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRow::to_file_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE files SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = %id))]
    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    async fn stats(&self, company_id: &str) -> Result<FileStats, AppError> {
        let (total_files, total_size, recent_uploads): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*)::BIGINT,
                COALESCE(SUM(size), 0)::BIGINT,
                (COUNT(*) FILTER (WHERE upload_date >= NOW() - INTERVAL '24 hours'))::BIGINT
            FROM files
            WHERE company_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT document_type, COUNT(*)::BIGINT
            FROM files
            WHERE company_id = $1 AND is_active = TRUE
            GROUP BY document_type
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        let by_entity: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT entity_type::TEXT, COUNT(*)::BIGINT
            FROM files
            WHERE company_id = $1 AND is_active = TRUE
            GROUP BY entity_type
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(FileStats {
            total_files,
            total_size,
            files_by_type: by_type.into_iter().collect(),
            files_by_entity: by_entity.into_iter().collect(),
            recent_uploads,
        })
    }
}
