//! Community forum: open questions with replies.
//!
//! A question needs text, an image, or both. Images are stored under
//! `communityImages/{question_id}_{timestamp}`; the question id is minted
//! before the upload so the key and the row agree. Deleting a question
//! removes its replies through the foreign-key cascade in the same
//! statement, then drops the image.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::Ownership;
use crate::services::storage::{ObjectKey, ObjectStore};
use crate::services::upload::StoredObject;
use crate::validate::{self, ValidationError};

pub const IMAGE_CATEGORY: &str = "communityImages";

#[derive(Debug, thiserror::Error)]
pub enum CommunityError {
    #[error("question not found: {0}")]
    NotFound(Uuid),
    #[error("only the author may do that")]
    Forbidden,
    #[error("a question needs text or an image")]
    Empty,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for CommunityError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_QUESTION_NOT_FOUND",
            Self::Forbidden => "E_FORBIDDEN",
            Self::Empty | Self::Validation(_) => "E_VALIDATION",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CommunityQuestion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_name: Option<String>,
    pub question: String,
    pub image_url: Option<String>,
    #[serde(skip)]
    pub storage_key: Option<String>,
    pub reply_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Reply {
    pub id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub author_name: Option<String>,
    pub reply: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostText {
    #[serde(default)]
    pub question: String,
}

const QUESTION_SELECT: &str = "SELECT q.id, q.user_id, u.full_name AS author_name, q.question, q.image_url, q.storage_key,
        (SELECT COUNT(*) FROM replies r WHERE r.question_id = q.id) AS reply_count,
        q.created_at, q.updated_at
 FROM community_questions q
 LEFT JOIN users u ON u.id = q.user_id";

/// Key for a question image uploaded at `ts_ms`.
#[must_use]
pub fn image_key(question_id: Uuid, ts_ms: i64) -> ObjectKey {
    ObjectKey::paired(IMAGE_CATEGORY, question_id, ts_ms)
}

/// Trimmed question text, or `Empty` when there is neither text nor image.
///
/// # Errors
///
/// `Empty`.
pub fn check_post(text: &str, has_image: bool) -> Result<String, CommunityError> {
    let text = text.trim();
    if text.is_empty() && !has_image {
        return Err(CommunityError::Empty);
    }
    Ok(text.to_owned())
}

/// Insert a question with a pre-minted id and an optional stored image.
///
/// # Errors
///
/// `Empty`, or a database failure.
pub async fn post_question(
    pool: &PgPool,
    question_id: Uuid,
    user_id: Uuid,
    text: &str,
    image: Option<&StoredObject>,
) -> Result<CommunityQuestion, CommunityError> {
    let text = check_post(text, image.is_some())?;
    sqlx::query(
        "INSERT INTO community_questions (id, user_id, question, image_url, storage_key) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(question_id)
    .bind(user_id)
    .bind(&text)
    .bind(image.map(|i| i.url.as_str()))
    .bind(image.map(|i| i.key.as_str()))
    .execute(pool)
    .await?;
    get_question(pool, question_id).await
}

/// # Errors
///
/// `NotFound` if missing.
pub async fn get_question(pool: &PgPool, question_id: Uuid) -> Result<CommunityQuestion, CommunityError> {
    sqlx::query_as::<_, CommunityQuestion>(&format!("{QUESTION_SELECT} WHERE q.id = $1"))
        .bind(question_id)
        .fetch_optional(pool)
        .await?
        .ok_or(CommunityError::NotFound(question_id))
}

/// Newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_questions(pool: &PgPool) -> Result<Vec<CommunityQuestion>, CommunityError> {
    let rows = sqlx::query_as::<_, CommunityQuestion>(&format!("{QUESTION_SELECT} ORDER BY q.created_at DESC, q.id ASC"))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn ensure_author(pool: &PgPool, question_id: Uuid, user_id: Uuid) -> Result<(), CommunityError> {
    Ownership::check(pool, "community_questions", question_id, user_id)
        .await?
        .require(CommunityError::Forbidden, CommunityError::NotFound)
}

/// Replace the text and bump `updated_at`.
///
/// # Errors
///
/// Blank text, `NotFound` or `Forbidden`.
pub async fn edit_question(
    pool: &PgPool,
    question_id: Uuid,
    user_id: Uuid,
    text: &str,
) -> Result<CommunityQuestion, CommunityError> {
    let text = validate::required("question", text)?;
    ensure_author(pool, question_id, user_id).await?;
    sqlx::query("UPDATE community_questions SET question = $2, updated_at = now() WHERE id = $1")
        .bind(question_id)
        .bind(&text)
        .execute(pool)
        .await?;
    get_question(pool, question_id).await
}

/// Delete the question and its replies, then its image.
///
/// # Errors
///
/// `NotFound` or `Forbidden`. Image cleanup failures are logged only.
pub async fn delete_question(
    pool: &PgPool,
    store: &dyn ObjectStore,
    question_id: Uuid,
    user_id: Uuid,
) -> Result<(), CommunityError> {
    ensure_author(pool, question_id, user_id).await?;
    let storage_key: Option<Option<String>> =
        sqlx::query_scalar("DELETE FROM community_questions WHERE id = $1 RETURNING storage_key")
            .bind(question_id)
            .fetch_optional(pool)
            .await?;
    let Some(storage_key) = storage_key else {
        return Err(CommunityError::NotFound(question_id));
    };

    if let Some(raw) = storage_key {
        let removed = match ObjectKey::parse(&raw) {
            Ok(key) => store.delete(&key).await,
            Err(e) => Err(e),
        };
        if let Err(e) = removed {
            tracing::warn!(%question_id, key = %raw, error = %e, "community: image cleanup failed");
        }
    }
    Ok(())
}

/// # Errors
///
/// Blank text or `NotFound`.
pub async fn reply(pool: &PgPool, question_id: Uuid, user_id: Uuid, text: &str) -> Result<Reply, CommunityError> {
    let text = validate::required("reply", text)?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM community_questions WHERE id = $1)")
        .bind(question_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(CommunityError::NotFound(question_id));
    }

    let reply_id = Uuid::new_v4();
    sqlx::query("INSERT INTO replies (id, question_id, user_id, reply) VALUES ($1, $2, $3, $4)")
        .bind(reply_id)
        .bind(question_id)
        .bind(user_id)
        .bind(&text)
        .execute(pool)
        .await?;

    let row = sqlx::query_as::<_, Reply>(
        "SELECT r.id, r.question_id, r.user_id, u.full_name AS author_name, r.reply, r.created_at
         FROM replies r LEFT JOIN users u ON u.id = r.user_id
         WHERE r.id = $1",
    )
    .bind(reply_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Oldest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_replies(pool: &PgPool, question_id: Uuid) -> Result<Vec<Reply>, CommunityError> {
    let rows = sqlx::query_as::<_, Reply>(
        "SELECT r.id, r.question_id, r.user_id, u.full_name AS author_name, r.reply, r.created_at
         FROM replies r LEFT JOIN users u ON u.id = r.user_id
         WHERE r.question_id = $1
         ORDER BY r.created_at ASC, r.id ASC",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
#[path = "community_test.rs"]
mod tests;
