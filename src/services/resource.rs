//! PDF study resources.
//!
//! Uploads land under `pdfs/{ts}_{filename}`; the document row is written
//! only after the bytes are stored. Delete removes the object first so a
//! failed storage call never leaves a row pointing at nothing.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::Ownership;
use crate::services::course::CourseDraft;
use crate::services::session::SessionUser;
use crate::services::storage::{ObjectKey, ObjectStore, StorageError};
use crate::services::upload::StoredObject;
use crate::validate::ValidationError;

pub const CATEGORY: &str = "pdfs";

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource not found: {0}")]
    NotFound(Uuid),
    #[error("only the uploader may do that")]
    Forbidden,
    #[error("only teachers can upload resources")]
    TeachersOnly,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ResourceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_RESOURCE_NOT_FOUND",
            Self::Forbidden | Self::TeachersOnly => "E_FORBIDDEN",
            Self::Validation(_) => "E_VALIDATION",
            Self::Storage(e) => crate::frame::ErrorCode::error_code(e),
            Self::Db(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Pdf {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub pdf_url: String,
    #[serde(skip)]
    pub storage_key: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const PDF_COLUMNS: &str = "id, name, category, description, pdf_url, storage_key, user_id, created_at";

/// Same three fields as the course form.
pub type PdfDraft = CourseDraft;

/// # Errors
///
/// `TeachersOnly` or validation errors, before any bytes are read.
pub fn check_upload(author: &SessionUser, draft: &PdfDraft) -> Result<PdfDraft, ResourceError> {
    if !author.is_teacher() {
        return Err(ResourceError::TeachersOnly);
    }
    Ok(draft.validate()?)
}

/// Key for a new upload, named after the original filename.
#[must_use]
pub fn object_key(filename: &str, ts_ms: i64) -> ObjectKey {
    ObjectKey::timestamped(CATEGORY, filename, ts_ms)
}

/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_pdf(pool: &PgPool, author_id: Uuid, draft: &PdfDraft, file: &StoredObject) -> Result<Pdf, ResourceError> {
    let pdf = sqlx::query_as::<_, Pdf>(&format!(
        "INSERT INTO pdfs (id, name, category, description, pdf_url, storage_key, user_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {PDF_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&draft.name)
    .bind(&draft.category)
    .bind(&draft.description)
    .bind(&file.url)
    .bind(&file.key)
    .bind(author_id)
    .fetch_one(pool)
    .await?;
    Ok(pdf)
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_pdfs(pool: &PgPool) -> Result<Vec<Pdf>, ResourceError> {
    let rows = sqlx::query_as::<_, Pdf>(&format!("SELECT {PDF_COLUMNS} FROM pdfs ORDER BY created_at DESC, id ASC"))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// `NotFound` if missing.
pub async fn get_pdf(pool: &PgPool, pdf_id: Uuid) -> Result<Pdf, ResourceError> {
    sqlx::query_as::<_, Pdf>(&format!("SELECT {PDF_COLUMNS} FROM pdfs WHERE id = $1"))
        .bind(pdf_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ResourceError::NotFound(pdf_id))
}

async fn ensure_owner(pool: &PgPool, pdf_id: Uuid, user_id: Uuid) -> Result<(), ResourceError> {
    Ownership::check(pool, "pdfs", pdf_id, user_id)
        .await?
        .require(ResourceError::Forbidden, ResourceError::NotFound)
}

/// Edit the metadata; the file itself is immutable.
///
/// # Errors
///
/// Validation, `NotFound` or `Forbidden`.
pub async fn update_pdf(pool: &PgPool, pdf_id: Uuid, user_id: Uuid, draft: &PdfDraft) -> Result<Pdf, ResourceError> {
    let draft = draft.validate()?;
    ensure_owner(pool, pdf_id, user_id).await?;
    sqlx::query_as::<_, Pdf>(&format!(
        "UPDATE pdfs SET name = $2, category = $3, description = $4 WHERE id = $1 RETURNING {PDF_COLUMNS}"
    ))
    .bind(pdf_id)
    .bind(&draft.name)
    .bind(&draft.category)
    .bind(&draft.description)
    .fetch_optional(pool)
    .await?
    .ok_or(ResourceError::NotFound(pdf_id))
}

/// Remove the stored file, then the row.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, or the storage/database failure.
pub async fn delete_pdf(pool: &PgPool, store: &dyn ObjectStore, pdf_id: Uuid, user_id: Uuid) -> Result<(), ResourceError> {
    ensure_owner(pool, pdf_id, user_id).await?;
    let pdf = get_pdf(pool, pdf_id).await?;
    store.delete(&ObjectKey::parse(&pdf.storage_key)?).await?;
    sqlx::query("DELETE FROM pdfs WHERE id = $1")
        .bind(pdf_id)
        .execute(pool)
        .await?;
    tracing::info!(%pdf_id, %user_id, "resource: deleted");
    Ok(())
}

#[cfg(test)]
#[path = "resource_test.rs"]
mod tests;
