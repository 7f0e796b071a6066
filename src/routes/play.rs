//! Quiz play routes.
//!
//! Sessions live in memory in [`crate::services::play::PlayRegistry`]; the
//! only persisted effect is the score added when the last question is
//! answered. The pool itself is the score ledger.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiError;
use super::auth::AuthUser;
use crate::quiz::SessionError;
use crate::services::play::{self, AnswerReply, FinishReply, PlayError, PlayView};
use crate::state::AppState;

pub(crate) fn play_status(err: &PlayError) -> StatusCode {
    match err {
        PlayError::NotFound(_) => StatusCode::NOT_FOUND,
        PlayError::Forbidden => StatusCode::FORBIDDEN,
        PlayError::Quiz(e) => super::quizzes::quiz_status(e),
        PlayError::Session(e) => match e {
            SessionError::UnknownQuestion(_) => StatusCode::NOT_FOUND,
            SessionError::InvalidOption(_) => StatusCode::BAD_REQUEST,
            SessionError::NoQuestions
            | SessionError::InvalidQuestion { .. }
            | SessionError::DuplicateQuestion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::AlreadyAnswered(_) | SessionError::WrongPhase { .. } => StatusCode::CONFLICT,
        },
        PlayError::Score(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<PlayError> for ApiError {
    fn from(err: PlayError) -> Self {
        Self::from_service(play_status(&err), &err)
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
    pub question_id: Uuid,
    pub option: String,
}

/// `POST /api/quizzes/:id/play`: shuffle the quiz into a new session.
pub async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(quiz_id): Path<Uuid>,
) -> Result<(StatusCode, Json<PlayView>), ApiError> {
    let view = play::start(&state.pool, &state.plays, state.config.scoring, auth.user.id, quiz_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/play/:session_id`
pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PlayView>, ApiError> {
    Ok(Json(state.plays.status(session_id, auth.user.id).await?))
}

/// `POST /api/play/:session_id/answers`
pub async fn answer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(body): Json<AnswerBody>,
) -> Result<Json<AnswerReply>, ApiError> {
    let reply = state
        .plays
        .answer(&state.pool, session_id, auth.user.id, body.question_id, &body.option)
        .await?;
    Ok(Json(reply))
}

/// `POST /api/play/:session_id/finish`
pub async fn finish(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<FinishReply>, ApiError> {
    Ok(Json(state.plays.finish(&state.pool, session_id, auth.user.id).await?))
}

/// `DELETE /api/play/:session_id`
pub async fn abandon(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.plays.abandon(session_id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "play_test.rs"]
mod tests;
