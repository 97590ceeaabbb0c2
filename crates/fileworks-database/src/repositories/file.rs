//! File record repository implementation.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use fileworks_core::error::{AppError, ErrorKind};
use fileworks_core::result::AppResult;
use fileworks_core::types::id::{FileId, UserId};
use fileworks_core::types::pagination::{PageRequest, PageResponse};
use fileworks_entity::file::{CreateFileRecord, ExtractedData, FileRecord, FileStatus, StatusChange};

use super::{from_millis, to_millis};

/// Raw `files` row.
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: String,
    user_id: String,
    original_filename: String,
    storage_path: String,
    title: Option<String>,
    description: Option<String>,
    status: String,
    extracted_data: Option<String>,
    uploaded_at: i64,
    created_at: i64,
    updated_at: i64,
}

fn decode_time(ms: i64) -> AppResult<DateTime<Utc>> {
    from_millis(ms).ok_or_else(|| AppError::internal(format!("Stored timestamp out of range: {ms}")))
}

impl TryFrom<FileRow> for FileRecord {
    type Error = AppError;

    fn try_from(row: FileRow) -> AppResult<Self> {
        let invalid_id = |e: uuid::Error| {
            AppError::with_source(ErrorKind::Internal, "Stored file row has an invalid id", e)
        };

        Ok(FileRecord {
            id: row.id.parse().map_err(invalid_id)?,
            user_id: row.user_id.parse().map_err(invalid_id)?,
            original_filename: row.original_filename,
            storage_path: row.storage_path,
            title: row.title,
            description: row.description,
            status: row.status.parse()?,
            extracted_data: row
                .extracted_data
                .as_deref()
                .map(serde_json::from_str::<ExtractedData>)
                .transpose()?,
            uploaded_at: decode_time(row.uploaded_at)?,
            created_at: decode_time(row.created_at)?,
            updated_at: decode_time(row.updated_at)?,
        })
    }
}

/// Repository for file record CRUD and guarded status updates.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new file record with status `uploaded`.
    pub async fn create(&self, data: &CreateFileRecord) -> AppResult<FileRecord> {
        let now = to_millis(Utc::now());
        let title = data
            .title
            .clone()
            .unwrap_or_else(|| data.original_filename.clone());

        sqlx::query_as::<_, FileRow>(
            "INSERT INTO files (id, user_id, original_filename, storage_path, title, description, \
             status, uploaded_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 'uploaded', ?, ?, ?) RETURNING *",
        )
        .bind(FileId::new().to_string())
        .bind(data.user_id.to_string())
        .bind(&data.original_filename)
        .bind(&data.storage_path)
        .bind(title)
        .bind(data.description.clone().unwrap_or_default())
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create file record", e))?
        .try_into()
    }

    /// Find a file record by ID.
    pub async fn find_by_id(&self, id: FileId) -> AppResult<Option<FileRecord>> {
        sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))?
            .map(FileRecord::try_from)
            .transpose()
    }

    /// Find a file record owned by `user_id`.
    pub async fn find_for_user(&self, id: FileId, user_id: UserId) -> AppResult<Option<FileRecord>> {
        sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))?
            .map(FileRecord::try_from)
            .transpose()
    }

    /// List a user's file records, newest first.
    pub async fn find_by_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<FileRecord>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count files", e))?;

        let files = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM files WHERE user_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id.to_string())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))?
        .into_iter()
        .map(FileRecord::try_from)
        .collect::<AppResult<Vec<_>>>()?;

        Ok(PageResponse::new(
            files,
            page.page,
            page.page_size,
            total.max(0) as u64,
        ))
    }

    /// Delete a file record owned by `user_id`. Returns whether a row was removed.
    pub async fn delete_for_user(&self, id: FileId, user_id: UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete file", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a record to `status` if it currently sits in one of
    /// `allowed_from`, replacing `extracted_data` when one is given.
    ///
    /// The check and the write are one statement. Returns
    /// [`StatusChange::Skipped`] when the guard rejects the move and a
    /// not-found error when the record does not exist.
    pub async fn update_status(
        &self,
        id: FileId,
        status: FileStatus,
        extracted_data: Option<&ExtractedData>,
        allowed_from: &[FileStatus],
    ) -> AppResult<StatusChange> {
        let allowed = allowed_from
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        if allowed.is_empty() {
            return Err(AppError::validation(format!(
                "No source status given for a move to '{status}'"
            )));
        }

        let extracted_json = extracted_data.map(serde_json::to_string).transpose()?;
        let sql = format!(
            "UPDATE files SET status = ?, \
             extracted_data = COALESCE(?, extracted_data), updated_at = ? \
             WHERE id = ? AND status IN ({allowed}) RETURNING *"
        );

        let row = sqlx::query_as::<_, FileRow>(&sql)
            .bind(status.as_str())
            .bind(extracted_json)
            .bind(to_millis(Utc::now()))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update file status", e)
            })?;

        if let Some(row) = row {
            return Ok(StatusChange::Applied(row.try_into()?));
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM files WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read file status", e))?;

        match current {
            Some(current) => Ok(StatusChange::Skipped {
                current: current.parse()?,
            }),
            None => Err(AppError::not_found(format!("File with ID {id} not found"))),
        }
    }
}
