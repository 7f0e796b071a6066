//! User profile, directory and leaderboard routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiError;
use super::auth::AuthUser;
use crate::services::leaderboard::{self, Leaderboard};
use crate::services::user::{self, UserError, UserProfile};
use crate::state::AppState;

pub(crate) fn user_status(err: &UserError) -> StatusCode {
    match err {
        UserError::NotFound(_) => StatusCode::NOT_FOUND,
        UserError::Validation(_) => StatusCode::BAD_REQUEST,
        UserError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        Self::from_service(user_status(&err), &err)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// `GET /api/users?search=`: everyone but the caller, for starting chats.
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = user::list_users(&state.pool, auth.user.id, query.search.as_deref()).await?;
    Ok(Json(users))
}

/// `GET /api/users/me`
pub async fn my_profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(user::get_profile(&state.pool, auth.user.id).await?))
}

/// `PATCH /api/users/me`
pub async fn update_my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfileBody>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = user::update_profile(&state.pool, auth.user.id, &body.full_name, &body.phone_number).await?;
    Ok(Json(profile))
}

/// `GET /api/users/:id`
pub async fn user_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(user::get_profile(&state.pool, user_id).await?))
}

/// `GET /api/leaderboard?limit=`: podium plus the ranked remainder.
pub async fn leaderboard(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>, ApiError> {
    let limit = leaderboard::effective_limit(query.limit, state.config.leaderboard_limit);
    let board = leaderboard::load(&state.pool, limit).await.map_err(ApiError::internal)?;
    Ok(Json(board))
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
