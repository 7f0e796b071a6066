//! User profiles and the persisted quiz score.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::validate::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for UserError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_USER_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

/// Public profile. Credentials never leave the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: String,
    pub account_type: String,
    pub score: i64,
    pub is_anonymous: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const PROFILE_COLUMNS: &str = "id, full_name, email, phone_number, account_type, score, is_anonymous, created_at";

/// Fetch one profile.
///
/// # Errors
///
/// `NotFound` if the user does not exist.
pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<UserProfile, UserError> {
    sqlx::query_as::<_, UserProfile>(&format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::NotFound(user_id))
}

/// Other users to start a chat with, optionally filtered by name.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_users(pool: &PgPool, exclude: Uuid, search: Option<&str>) -> Result<Vec<UserProfile>, UserError> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

    let rows = sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users
         WHERE id <> $1 AND ($2::text IS NULL OR full_name ILIKE $2)
         ORDER BY full_name ASC, id ASC"
    ))
    .bind(exclude)
    .bind(pattern)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Edit the caller's own name and phone number.
///
/// # Errors
///
/// Validation errors for blank fields, `NotFound` if the user vanished.
pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    full_name: &str,
    phone_number: &str,
) -> Result<UserProfile, UserError> {
    let full_name = validate::required("full_name", full_name)?;
    let phone_number = validate::required("phone_number", phone_number)?;

    sqlx::query_as::<_, UserProfile>(&format!(
        "UPDATE users SET full_name = $2, phone_number = $3 WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(user_id)
    .bind(full_name)
    .bind(phone_number)
    .fetch_optional(pool)
    .await?
    .ok_or(UserError::NotFound(user_id))
}

/// Add `delta` to the stored score in one statement. Returns the new total.
///
/// # Errors
///
/// `NotFound` if the user does not exist.
pub async fn add_score(pool: &PgPool, user_id: Uuid, delta: i64) -> Result<i64, UserError> {
    let score: Option<i64> = sqlx::query_scalar("UPDATE users SET score = score + $2 WHERE id = $1 RETURNING score")
        .bind(user_id)
        .bind(delta)
        .fetch_optional(pool)
        .await?;
    score.ok_or(UserError::NotFound(user_id))
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "user_test.rs"]
mod tests;
