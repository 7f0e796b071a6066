//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API and the websocket endpoint under a single
//! Axum router. Stored media is served read-only at `/files` straight from
//! the local object store directory, so the URLs services hand out resolve
//! without a separate file server.
//!
//! ERRORS
//! ======
//! Handlers return `Result<_, ApiError>`. Each route module converts its
//! service error into an [`ApiError`] through a `*_status` mapping function,
//! keeping the grepable `E_*` code from the service. Internal failures are
//! logged here and reach the client only as `E_INTERNAL`.

pub mod auth;
pub mod chats;
pub mod community;
pub mod courses;
pub mod lectures;
pub mod play;
pub mod quizzes;
pub mod resources;
pub mod study_plans;
pub mod users;
pub mod ws;

use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use futures::TryStreamExt;
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::frame::{ErrorCode, to_data};
use crate::hub::Topic;
use crate::services::storage::{ByteStream, StorageError};
use crate::state::AppState;
use crate::validate::ValidationError;

// =============================================================================
// ERRORS
// =============================================================================

/// JSON error response: `{ "code": "E_...", "message": "...", "retryable": bool }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retryable: false }
    }

    /// Wrap a service error. A 500 is logged and masked.
    #[must_use]
    pub fn from_service(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code = err.error_code(), error = %err, "request failed");
            return Self::internal_masked();
        }
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }

    /// Log an untyped failure and answer with a bare 500.
    #[must_use]
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "request failed");
        Self::internal_masked()
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "authentication required")
    }

    fn internal_masked() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL", "internal server error")
    }

    #[cfg(test)]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.code,
            "message": self.message,
            "retryable": self.retryable,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::from_service(StatusCode::BAD_REQUEST, &err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::from_service(storage_status(&err), &err)
    }
}

pub(crate) fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::InvalidKey(_) | StorageError::Interrupted(_) => StatusCode::BAD_REQUEST,
        StorageError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Raw request body as a storage byte stream.
pub(crate) fn body_stream(body: Body) -> ByteStream {
    Box::pin(body.into_data_stream().map_err(std::io::Error::other))
}

/// Declared upload size, when the client sent one.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

/// Push a serialized value to every subscriber of `topic`.
pub(crate) fn publish<T: Serialize>(state: &AppState, topic: &Topic, syscall: &str, value: &T) {
    let delivered = state.hub.publish(topic, syscall, to_data(value));
    tracing::debug!(%topic, syscall, delivered, "hub: published");
}

// =============================================================================
// ROUTER
// =============================================================================

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let files = ServeDir::new(&state.config.storage_dir);

    Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/anonymous", post(auth::anonymous))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/users", get(users::list_users))
        .route("/api/users/me", get(users::my_profile).patch(users::update_my_profile))
        .route("/api/users/{id}", get(users::user_profile))
        .route("/api/leaderboard", get(users::leaderboard))
        .route("/api/courses", get(courses::list_courses).post(courses::create_course))
        .route(
            "/api/courses/{id}",
            get(courses::get_course)
                .patch(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/api/courses/{id}/publish", put(courses::set_published))
        .route("/api/courses/{id}/videos", post(courses::upload_video))
        .route("/api/lectures", get(lectures::list_lectures).post(lectures::upload_lecture))
        .route(
            "/api/lectures/{id}",
            get(lectures::get_lecture)
                .patch(lectures::update_lecture)
                .delete(lectures::delete_lecture),
        )
        .route("/api/quizzes", get(quizzes::list_quizzes).post(quizzes::create_quiz))
        .route(
            "/api/quizzes/{id}",
            get(quizzes::get_quiz)
                .patch(quizzes::update_quiz)
                .delete(quizzes::delete_quiz),
        )
        .route(
            "/api/quizzes/{id}/questions",
            get(quizzes::list_questions).post(quizzes::add_question),
        )
        .route(
            "/api/quizzes/{id}/questions/{question_id}",
            get(quizzes::get_question)
                .patch(quizzes::update_question)
                .delete(quizzes::delete_question),
        )
        .route("/api/quizzes/{id}/questions/{question_id}/image", put(quizzes::upload_question_image))
        .route("/api/quizzes/{id}/play", post(play::start))
        .route("/api/play/{session_id}", get(play::status).delete(play::abandon))
        .route("/api/play/{session_id}/answers", post(play::answer))
        .route("/api/play/{session_id}/finish", post(play::finish))
        .route("/api/study-plans", get(study_plans::list_plans).post(study_plans::create_plan))
        .route("/api/study-plans/{id}", get(study_plans::get_plan).delete(study_plans::delete_plan))
        .route("/api/study-plans/{id}/tasks", put(study_plans::save_statuses))
        .route("/api/chats", get(chats::list_chats).post(chats::open_chat))
        .route("/api/chats/{chat_id}", axum::routing::delete(chats::delete_chat))
        .route(
            "/api/chats/{chat_id}/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        .route(
            "/api/community/questions",
            get(community::list_questions).post(community::post_question),
        )
        .route("/api/community/questions/image", post(community::post_question_with_image))
        .route(
            "/api/community/questions/{id}",
            get(community::get_question)
                .patch(community::edit_question)
                .delete(community::delete_question),
        )
        .route(
            "/api/community/questions/{id}/replies",
            get(community::list_replies).post(community::reply),
        )
        .route("/api/pdfs", get(resources::list_pdfs).post(resources::upload_pdf))
        .route(
            "/api/pdfs/{id}",
            get(resources::get_pdf)
                .patch(resources::update_pdf)
                .delete(resources::delete_pdf),
        )
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .nest_service("/files", files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
