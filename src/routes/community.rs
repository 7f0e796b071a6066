//! Community forum routes.
//!
//! Question changes go to the `community` topic; replies go to
//! `replies:{question_id}` so only readers of that thread are woken.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ApiError, body_stream, content_length, publish};
use crate::frame::now_ms;
use crate::hub::Topic;
use crate::services::community::{self, CommunityError, CommunityQuestion, PostText, Reply};
use crate::services::storage::compensate;
use crate::services::upload;
use crate::state::AppState;

pub(crate) fn community_status(err: &CommunityError) -> StatusCode {
    match err {
        CommunityError::NotFound(_) => StatusCode::NOT_FOUND,
        CommunityError::Forbidden => StatusCode::FORBIDDEN,
        CommunityError::Empty | CommunityError::Validation(_) => StatusCode::BAD_REQUEST,
        CommunityError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CommunityError> for ApiError {
    fn from(err: CommunityError) -> Self {
        Self::from_service(community_status(&err), &err)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ImagePostQuery {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    #[serde(default)]
    pub reply: String,
}

/// `GET /api/community/questions`: newest first.
pub async fn list_questions(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<CommunityQuestion>>, ApiError> {
    Ok(Json(community::list_questions(&state.pool).await?))
}

/// `POST /api/community/questions`: text-only question.
pub async fn post_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PostText>,
) -> Result<(StatusCode, Json<CommunityQuestion>), ApiError> {
    let posted = community::post_question(&state.pool, Uuid::new_v4(), auth.user.id, &body.question, None).await?;
    publish(&state, &Topic::Community, "community:created", &posted);
    Ok((StatusCode::CREATED, Json(posted)))
}

/// `POST /api/community/questions/image?question=`: the raw body is the
/// image; the text is optional.
pub async fn post_question_with_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ImagePostQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<CommunityQuestion>), ApiError> {
    let question_id = Uuid::new_v4();
    let key = community::image_key(question_id, now_ms());
    let stored = upload::upload(&state, auth.user.id, &key, body_stream(body), content_length(&headers)).await?;
    let written = community::post_question(&state.pool, question_id, auth.user.id, &query.question, Some(&stored)).await;
    let posted = compensate(state.storage.as_ref(), &key, written).await?;

    publish(&state, &Topic::Community, "community:created", &posted);
    Ok((StatusCode::CREATED, Json(posted)))
}

/// `GET /api/community/questions/:id`
pub async fn get_question(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(question_id): Path<Uuid>,
) -> Result<Json<CommunityQuestion>, ApiError> {
    Ok(Json(community::get_question(&state.pool, question_id).await?))
}

/// `PATCH /api/community/questions/:id`
pub async fn edit_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(question_id): Path<Uuid>,
    Json(body): Json<PostText>,
) -> Result<Json<CommunityQuestion>, ApiError> {
    let edited = community::edit_question(&state.pool, question_id, auth.user.id, &body.question).await?;
    publish(&state, &Topic::Community, "community:updated", &edited);
    Ok(Json(edited))
}

/// `DELETE /api/community/questions/:id`: removes replies too.
pub async fn delete_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(question_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    community::delete_question(&state.pool, state.storage.as_ref(), question_id, auth.user.id).await?;
    publish(&state, &Topic::Community, "community:deleted", &serde_json::json!({ "id": question_id }));
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/community/questions/:id/replies`: oldest first.
pub async fn list_replies(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(question_id): Path<Uuid>,
) -> Result<Json<Vec<Reply>>, ApiError> {
    Ok(Json(community::list_replies(&state.pool, question_id).await?))
}

/// `POST /api/community/questions/:id/replies`
pub async fn reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(question_id): Path<Uuid>,
    Json(body): Json<ReplyBody>,
) -> Result<(StatusCode, Json<Reply>), ApiError> {
    let posted = community::reply(&state.pool, question_id, auth.user.id, &body.reply).await?;
    publish(&state, &Topic::Replies(question_id), "reply:created", &posted);
    Ok((StatusCode::CREATED, Json(posted)))
}

#[cfg(test)]
#[path = "community_test.rs"]
mod tests;
