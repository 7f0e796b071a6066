//! Quiz authoring routes.
//!
//! Quizzes are public to read; questions (with their answers) are visible
//! to the owner only. Players never see answers through these routes; they
//! go through `/api/play`.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ApiError, body_stream, content_length, publish};
use crate::hub::Topic;
use crate::services::quiz::{self, Question, QuestionDraft, Quiz, QuizDraft, QuizError, QuizListing};
use crate::services::storage::compensate;
use crate::services::upload;
use crate::state::AppState;

pub(crate) fn quiz_status(err: &QuizError) -> StatusCode {
    match err {
        QuizError::NotFound(_) | QuizError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
        QuizError::Forbidden | QuizError::TeachersOnly => StatusCode::FORBIDDEN,
        QuizError::Validation(_) | QuizError::InvalidAnswers(_) => StatusCode::BAD_REQUEST,
        QuizError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        Self::from_service(quiz_status(&err), &err)
    }
}

/// `GET /api/quizzes`: every quiz with its question count.
pub async fn list_quizzes(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Vec<QuizListing>>, ApiError> {
    Ok(Json(quiz::list_quizzes(&state.pool).await?))
}

/// `POST /api/quizzes`
pub async fn create_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(draft): Json<QuizDraft>,
) -> Result<(StatusCode, Json<Quiz>), ApiError> {
    let created = quiz::create_quiz(&state.pool, &auth.user, &draft).await?;
    tracing::info!(quiz_id = %created.id, user_id = %auth.user.id, "quiz: created");
    publish(&state, &Topic::Quizzes, "quiz:created", &created);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/quizzes/:id`
pub async fn get_quiz(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(quiz_id): Path<Uuid>,
) -> Result<Json<Quiz>, ApiError> {
    Ok(Json(quiz::get_quiz(&state.pool, quiz_id).await?))
}

/// `PATCH /api/quizzes/:id`
pub async fn update_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(quiz_id): Path<Uuid>,
    Json(draft): Json<QuizDraft>,
) -> Result<Json<Quiz>, ApiError> {
    let updated = quiz::update_quiz(&state.pool, quiz_id, auth.user.id, &draft).await?;
    publish(&state, &Topic::Quizzes, "quiz:updated", &updated);
    Ok(Json(updated))
}

/// `DELETE /api/quizzes/:id`: removes the quiz, its questions and their images.
pub async fn delete_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(quiz_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    quiz::delete_quiz(&state.pool, state.storage.as_ref(), quiz_id, auth.user.id).await?;
    publish(&state, &Topic::Quizzes, "quiz:deleted", &serde_json::json!({ "id": quiz_id }));
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// QUESTIONS
// =============================================================================

/// `GET /api/quizzes/:id/questions` (owner only)
pub async fn list_questions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(quiz_id): Path<Uuid>,
) -> Result<Json<Vec<Question>>, ApiError> {
    Ok(Json(quiz::list_questions(&state.pool, quiz_id, auth.user.id).await?))
}

/// `POST /api/quizzes/:id/questions`
pub async fn add_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(quiz_id): Path<Uuid>,
    Json(draft): Json<QuestionDraft>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let question = quiz::add_question(&state.pool, quiz_id, auth.user.id, &draft).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// `GET /api/quizzes/:id/questions/:question_id`
pub async fn get_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Question>, ApiError> {
    Ok(Json(quiz::get_question(&state.pool, quiz_id, question_id, auth.user.id).await?))
}

/// `PATCH /api/quizzes/:id/questions/:question_id`
pub async fn update_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
    Json(draft): Json<QuestionDraft>,
) -> Result<Json<Question>, ApiError> {
    let question = quiz::update_question(&state.pool, quiz_id, question_id, auth.user.id, &draft).await?;
    Ok(Json(question))
}

/// `DELETE /api/quizzes/:id/questions/:question_id`
pub async fn delete_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    quiz::delete_question(&state.pool, state.storage.as_ref(), quiz_id, question_id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/quizzes/:id/questions/:question_id/image`: the raw body is the
/// image. Re-uploading replaces the previous one under the same key.
pub async fn upload_question_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Question>, ApiError> {
    quiz::get_question(&state.pool, quiz_id, question_id, auth.user.id).await?;

    let key = quiz::question_image_key(quiz_id, question_id);
    let stored = upload::upload(&state, auth.user.id, &key, body_stream(body), content_length(&headers)).await?;
    let written = quiz::set_question_image(&state.pool, quiz_id, question_id, &stored.url).await;
    let question = compensate(state.storage.as_ref(), &key, written).await?;
    Ok(Json(question))
}

#[cfg(test)]
#[path = "quizzes_test.rs"]
mod tests;
