//! Lecture videos uploaded by teachers.
//!
//! A lecture row is written only after its video has been stored; deleting a
//! lecture removes the stored object first, then the row.

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

pub const CATEGORY: &str = "lectures";

#[derive(Debug, thiserror::Error)]
pub enum LectureError {
    #[error("lecture not found: {0}")]
    NotFound(Uuid),
    #[error("only the lecture owner may do that")]
    Forbidden,
    #[error("only teachers can upload lectures")]
    TeachersOnly,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for LectureError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_LECTURE_NOT_FOUND",
            Self::Forbidden | Self::TeachersOnly => "E_FORBIDDEN",
            Self::Validation(_) => "E_VALIDATION",
            Self::Storage(e) => crate::frame::ErrorCode::error_code(e),
            Self::Db(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Lecture {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub video_url: String,
    #[serde(skip)]
    pub storage_key: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const LECTURE_COLUMNS: &str = "id, name, category, description, video_url, storage_key, user_id, created_at";

/// Lectures use the same three-field form as courses.
pub type LectureDraft = CourseDraft;

/// Gate checked before any bytes are accepted.
///
/// # Errors
///
/// `TeachersOnly` for students, validation errors for blank fields.
pub fn check_upload(author: &SessionUser, draft: &LectureDraft) -> Result<LectureDraft, LectureError> {
    if !author.is_teacher() {
        return Err(LectureError::TeachersOnly);
    }
    Ok(draft.validate()?)
}

/// `lectures/{ts}_{filename}`.
#[must_use]
pub fn object_key(filename: &str, ts_ms: i64) -> ObjectKey {
    ObjectKey::timestamped(CATEGORY, filename, ts_ms)
}

/// Insert the lecture row for an already stored video.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_lecture(
    pool: &PgPool,
    author_id: Uuid,
    draft: &LectureDraft,
    video: &StoredObject,
) -> Result<Lecture, LectureError> {
    let lecture = sqlx::query_as::<_, Lecture>(&format!(
        "INSERT INTO lectures (id, name, category, description, video_url, storage_key, user_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {LECTURE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&draft.name)
    .bind(&draft.category)
    .bind(&draft.description)
    .bind(&video.url)
    .bind(&video.key)
    .bind(author_id)
    .fetch_one(pool)
    .await?;
    Ok(lecture)
}

/// All lectures, or only `owner`'s when given.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_lectures(pool: &PgPool, owner: Option<Uuid>) -> Result<Vec<Lecture>, LectureError> {
    let rows = sqlx::query_as::<_, Lecture>(&format!(
        "SELECT {LECTURE_COLUMNS} FROM lectures
         WHERE $1::uuid IS NULL OR user_id = $1
         ORDER BY created_at DESC, id ASC"
    ))
    .bind(owner)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// `NotFound` if missing.
pub async fn get_lecture(pool: &PgPool, lecture_id: Uuid) -> Result<Lecture, LectureError> {
    sqlx::query_as::<_, Lecture>(&format!("SELECT {LECTURE_COLUMNS} FROM lectures WHERE id = $1"))
        .bind(lecture_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LectureError::NotFound(lecture_id))
}

async fn ensure_owner(pool: &PgPool, lecture_id: Uuid, user_id: Uuid) -> Result<(), LectureError> {
    Ownership::check(pool, "lectures", lecture_id, user_id)
        .await?
        .require(LectureError::Forbidden, LectureError::NotFound)
}

/// Edit name, category and description.
///
/// # Errors
///
/// Validation, `NotFound` or `Forbidden`.
pub async fn update_lecture(
    pool: &PgPool,
    lecture_id: Uuid,
    user_id: Uuid,
    draft: &LectureDraft,
) -> Result<Lecture, LectureError> {
    let draft = draft.validate()?;
    ensure_owner(pool, lecture_id, user_id).await?;
    sqlx::query_as::<_, Lecture>(&format!(
        "UPDATE lectures SET name = $2, category = $3, description = $4 WHERE id = $1 RETURNING {LECTURE_COLUMNS}"
    ))
    .bind(lecture_id)
    .bind(&draft.name)
    .bind(&draft.category)
    .bind(&draft.description)
    .fetch_optional(pool)
    .await?
    .ok_or(LectureError::NotFound(lecture_id))
}

/// Remove the video object, then the row.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, or the storage/database failure. A storage
/// failure leaves the row in place.
pub async fn delete_lecture(
    pool: &PgPool,
    store: &dyn ObjectStore,
    lecture_id: Uuid,
    user_id: Uuid,
) -> Result<(), LectureError> {
    ensure_owner(pool, lecture_id, user_id).await?;
    let lecture = get_lecture(pool, lecture_id).await?;
    store.delete(&ObjectKey::parse(&lecture.storage_key)?).await?;
    sqlx::query("DELETE FROM lectures WHERE id = $1")
        .bind(lecture_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "lecture_test.rs"]
mod tests;
