//! Lecture video routes.

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
use crate::services::lecture::{self, Lecture, LectureDraft, LectureError};
use crate::services::storage::compensate;
use crate::services::upload;
use crate::state::AppState;

pub(crate) fn lecture_status(err: &LectureError) -> StatusCode {
    match err {
        LectureError::NotFound(_) => StatusCode::NOT_FOUND,
        LectureError::Forbidden | LectureError::TeachersOnly => StatusCode::FORBIDDEN,
        LectureError::Validation(_) => StatusCode::BAD_REQUEST,
        LectureError::Storage(e) => super::storage_status(e),
        LectureError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LectureError> for ApiError {
    fn from(err: LectureError) -> Self {
        Self::from_service(lecture_status(&err), &err)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub owner: Option<Uuid>,
}

/// Form fields travel in the query string; the body is the video itself.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(flatten)]
    pub draft: LectureDraft,
    pub filename: String,
}

/// `GET /api/lectures?owner=`
pub async fn list_lectures(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Lecture>>, ApiError> {
    Ok(Json(lecture::list_lectures(&state.pool, query.owner).await?))
}

/// `POST /api/lectures?name=&category=&description=&filename=`
pub async fn upload_lecture(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<Lecture>), ApiError> {
    let draft = lecture::check_upload(&auth.user, &query.draft)?;

    let key = lecture::object_key(&query.filename, now_ms());
    let stored = upload::upload(&state, auth.user.id, &key, body_stream(body), content_length(&headers)).await?;
    let written = lecture::create_lecture(&state.pool, auth.user.id, &draft, &stored).await;
    let created = compensate(state.storage.as_ref(), &key, written).await?;

    tracing::info!(lecture_id = %created.id, user_id = %auth.user.id, size = stored.size, "lecture: uploaded");
    publish(&state, &Topic::Lectures, "lecture:created", &created);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/lectures/:id`
pub async fn get_lecture(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(lecture_id): Path<Uuid>,
) -> Result<Json<Lecture>, ApiError> {
    Ok(Json(lecture::get_lecture(&state.pool, lecture_id).await?))
}

/// `PATCH /api/lectures/:id`
pub async fn update_lecture(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(lecture_id): Path<Uuid>,
    Json(draft): Json<LectureDraft>,
) -> Result<Json<Lecture>, ApiError> {
    let updated = lecture::update_lecture(&state.pool, lecture_id, auth.user.id, &draft).await?;
    publish(&state, &Topic::Lectures, "lecture:updated", &updated);
    Ok(Json(updated))
}

/// `DELETE /api/lectures/:id`
pub async fn delete_lecture(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(lecture_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    lecture::delete_lecture(&state.pool, state.storage.as_ref(), lecture_id, auth.user.id).await?;
    publish(&state, &Topic::Lectures, "lecture:deleted", &serde_json::json!({ "id": lecture_id }));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "lectures_test.rs"]
mod tests;
