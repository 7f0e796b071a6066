//! Courses authored by teachers.
//!
//! A course is created unpublished. Only its owner may edit, publish,
//! delete, or attach videos. Uploaded video URLs are appended with
//! `array_append` so concurrent uploads never overwrite each other.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::Ownership;
use crate::services::session::SessionUser;
use crate::services::storage::ObjectKey;
use crate::validate::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    #[error("course not found: {0}")]
    NotFound(Uuid),
    #[error("only the course owner may do that")]
    Forbidden,
    #[error("only teachers can create courses")]
    TeachersOnly,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for CourseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_COURSE_NOT_FOUND",
            Self::Forbidden | Self::TeachersOnly => "E_FORBIDDEN",
            Self::Validation(_) => "E_VALIDATION",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub user_id: Uuid,
    pub video_urls: Vec<String>,
    pub published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const COURSE_COLUMNS: &str = "id, name, category, description, user_id, video_urls, published, created_at";

/// Name, category and description as submitted by the course form.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseDraft {
    pub name: String,
    pub category: String,
    pub description: String,
}

impl CourseDraft {
    /// Trim every field; all are required.
    ///
    /// # Errors
    ///
    /// Names the first blank field.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: validate::required("name", &self.name)?,
            category: validate::required("category", &self.category)?,
            description: validate::required("description", &self.description)?,
        })
    }
}

/// Fail unless `user_id` owns the course.
///
/// # Errors
///
/// `NotFound` or `Forbidden`.
pub async fn ensure_owner(pool: &PgPool, course_id: Uuid, user_id: Uuid) -> Result<(), CourseError> {
    Ownership::check(pool, "courses", course_id, user_id)
        .await?
        .require(CourseError::Forbidden, CourseError::NotFound)
}

/// Create an unpublished course owned by `author`.
///
/// # Errors
///
/// `TeachersOnly` for students, validation errors for blank fields.
pub async fn create_course(pool: &PgPool, author: &SessionUser, draft: &CourseDraft) -> Result<Course, CourseError> {
    if !author.is_teacher() {
        return Err(CourseError::TeachersOnly);
    }
    let draft = draft.validate()?;
    let course = sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (id, name, category, description, user_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&draft.name)
    .bind(&draft.category)
    .bind(&draft.description)
    .bind(author.id)
    .fetch_one(pool)
    .await?;
    Ok(course)
}

/// Published courses plus the viewer's own drafts.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_courses(pool: &PgPool, viewer: Uuid) -> Result<Vec<Course>, CourseError> {
    let rows = sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses
         WHERE published OR user_id = $1
         ORDER BY created_at DESC, id ASC"
    ))
    .bind(viewer)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// `NotFound` if missing or an unpublished course of someone else.
pub async fn get_course(pool: &PgPool, course_id: Uuid, viewer: Uuid) -> Result<Course, CourseError> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 AND (published OR user_id = $2)"
    ))
    .bind(course_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await?
    .ok_or(CourseError::NotFound(course_id))
}

/// # Errors
///
/// Validation, `NotFound` or `Forbidden`.
pub async fn update_course(
    pool: &PgPool,
    course_id: Uuid,
    user_id: Uuid,
    draft: &CourseDraft,
) -> Result<Course, CourseError> {
    let draft = draft.validate()?;
    ensure_owner(pool, course_id, user_id).await?;
    let course = sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET name = $2, category = $3, description = $4
         WHERE id = $1
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(course_id)
    .bind(&draft.name)
    .bind(&draft.category)
    .bind(&draft.description)
    .fetch_optional(pool)
    .await?;
    course.ok_or(CourseError::NotFound(course_id))
}

/// # Errors
///
/// `NotFound` or `Forbidden`.
pub async fn set_published(pool: &PgPool, course_id: Uuid, user_id: Uuid, published: bool) -> Result<Course, CourseError> {
    ensure_owner(pool, course_id, user_id).await?;
    sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET published = $2 WHERE id = $1 RETURNING {COURSE_COLUMNS}"
    ))
    .bind(course_id)
    .bind(published)
    .fetch_optional(pool)
    .await?
    .ok_or(CourseError::NotFound(course_id))
}

/// # Errors
///
/// `NotFound` or `Forbidden`.
pub async fn delete_course(pool: &PgPool, course_id: Uuid, user_id: Uuid) -> Result<(), CourseError> {
    ensure_owner(pool, course_id, user_id).await?;
    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(course_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// `courses/{course_id}/videos/{ts}_{filename}`.
#[must_use]
pub fn video_key(course_id: Uuid, filename: &str, ts_ms: i64) -> ObjectKey {
    ObjectKey::timestamped(&format!("courses/{course_id}/videos"), filename, ts_ms)
}

/// Append one uploaded video URL in a single statement.
///
/// # Errors
///
/// `NotFound` if the course disappeared between upload and write.
pub async fn append_video_url(pool: &PgPool, course_id: Uuid, url: &str) -> Result<Course, CourseError> {
    sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET video_urls = array_append(video_urls, $2) WHERE id = $1 RETURNING {COURSE_COLUMNS}"
    ))
    .bind(course_id)
    .bind(url)
    .fetch_optional(pool)
    .await?
    .ok_or(CourseError::NotFound(course_id))
}

#[cfg(test)]
#[path = "course_test.rs"]
mod tests;
