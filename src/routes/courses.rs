//! Course routes, including streamed video uploads.
//!
//! Changes are pushed to the `courses` topic as `course:created`,
//! `course:updated` and `course:deleted` so open course lists refresh.

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
use crate::services::course::{self, Course, CourseDraft, CourseError};
use crate::services::storage::compensate;
use crate::services::upload;
use crate::state::AppState;

pub(crate) fn course_status(err: &CourseError) -> StatusCode {
    match err {
        CourseError::NotFound(_) => StatusCode::NOT_FOUND,
        CourseError::Forbidden | CourseError::TeachersOnly => StatusCode::FORBIDDEN,
        CourseError::Validation(_) => StatusCode::BAD_REQUEST,
        CourseError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CourseError> for ApiError {
    fn from(err: CourseError) -> Self {
        Self::from_service(course_status(&err), &err)
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishBody {
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub filename: String,
}

/// `GET /api/courses`: published courses plus the caller's drafts.
pub async fn list_courses(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(course::list_courses(&state.pool, auth.user.id).await?))
}

/// `POST /api/courses`
pub async fn create_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(draft): Json<CourseDraft>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let created = course::create_course(&state.pool, &auth.user, &draft).await?;
    tracing::info!(course_id = %created.id, user_id = %auth.user.id, "course: created");
    publish(&state, &Topic::Courses, "course:created", &created);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/courses/:id`
pub async fn get_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(course::get_course(&state.pool, course_id, auth.user.id).await?))
}

/// `PATCH /api/courses/:id`
pub async fn update_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
    Json(draft): Json<CourseDraft>,
) -> Result<Json<Course>, ApiError> {
    let updated = course::update_course(&state.pool, course_id, auth.user.id, &draft).await?;
    publish(&state, &Topic::Courses, "course:updated", &updated);
    Ok(Json(updated))
}

/// `PUT /api/courses/:id/publish`
pub async fn set_published(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
    Json(body): Json<PublishBody>,
) -> Result<Json<Course>, ApiError> {
    let updated = course::set_published(&state.pool, course_id, auth.user.id, body.published).await?;
    publish(&state, &Topic::Courses, "course:updated", &updated);
    Ok(Json(updated))
}

/// `DELETE /api/courses/:id`
pub async fn delete_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    course::delete_course(&state.pool, course_id, auth.user.id).await?;
    publish(&state, &Topic::Courses, "course:deleted", &serde_json::json!({ "id": course_id }));
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/courses/:id/videos?filename=`: stream the raw body into
/// storage, then append the URL to the course.
pub async fn upload_video(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
    Query(query): Query<VideoQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Course>, ApiError> {
    course::ensure_owner(&state.pool, course_id, auth.user.id).await?;

    let key = course::video_key(course_id, &query.filename, now_ms());
    let stored = upload::upload(&state, auth.user.id, &key, body_stream(body), content_length(&headers)).await?;
    let written = course::append_video_url(&state.pool, course_id, &stored.url).await;
    let updated = compensate(state.storage.as_ref(), &key, written).await?;

    publish(&state, &Topic::Courses, "course:updated", &updated);
    Ok(Json(updated))
}

#[cfg(test)]
#[path = "courses_test.rs"]
mod tests;
