//! One-to-one chat routes. Sending over HTTP and over the websocket share
//! [`chat::deliver`], so both paths push `chat:message` and `inbox:refresh`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiError;
use super::auth::AuthUser;
use super::users::SearchQuery;
use crate::services::chat::{self, Chat, ChatError, ChatSummary, Message, SendMessage};
use crate::state::AppState;

pub(crate) fn chat_status(err: &ChatError) -> StatusCode {
    match err {
        ChatError::InvalidChatId(_) | ChatError::SelfChat | ChatError::Validation(_) => StatusCode::BAD_REQUEST,
        ChatError::UnknownUser(_) | ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::NotParticipant => StatusCode::FORBIDDEN,
        ChatError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::from_service(chat_status(&err), &err)
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenChatBody {
    pub user_id: Uuid,
}

/// `GET /api/chats?search=`: the caller's inbox.
pub async fn list_chats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ChatSummary>>, ApiError> {
    Ok(Json(chat::list_chats(&state.pool, auth.user.id, query.search.as_deref()).await?))
}

/// `POST /api/chats`: open (or reopen) the chat with another user.
pub async fn open_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<OpenChatBody>,
) -> Result<Json<Chat>, ApiError> {
    let opened = chat::open_chat(&state.pool, auth.user.id, body.user_id).await?;
    chat::notify_inboxes(&state.hub, &opened.id);
    Ok(Json(opened))
}

/// `GET /api/chats/:chat_id/messages`: oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(chat::list_messages(&state.pool, &chat_id, auth.user.id).await?))
}

/// `POST /api/chats/:chat_id/messages`
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = chat::deliver(&state, &chat_id, auth.user.id, &body.message).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `DELETE /api/chats/:chat_id`: removes the chat and its history for both.
pub async fn delete_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    chat::delete_chat(&state.pool, &chat_id, auth.user.id).await?;
    chat::notify_inboxes(&state.hub, &chat_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "chats_test.rs"]
mod tests;
