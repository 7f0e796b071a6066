//! One-to-one messaging.
//!
//! DESIGN
//! ======
//! A chat between two users has a deterministic id: both user ids sorted
//! and joined with `_`. Participation is therefore readable from the id
//! alone, which is what topic authorization in `hub` relies on. Opening a
//! chat twice is a no-op (`ON CONFLICT DO NOTHING`).
//!
//! Sending writes the message and the chat's `last_message` in one
//! transaction, then pushes `chat:message` to `chat:{id}` and
//! `inbox:refresh` to both participants' inbox topics.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::frame::{Data, to_data};
use crate::hub::{Hub, Topic};
use crate::state::AppState;
use crate::validate::{self, ValidationError};

const UNKNOWN_USER: &str = "Unknown User";
const NO_MESSAGES: &str = "No messages yet";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("malformed chat id: {0}")]
    InvalidChatId(String),
    #[error("cannot open a chat with yourself")]
    SelfChat,
    #[error("user not found: {0}")]
    UnknownUser(Uuid),
    #[error("chat not found: {0}")]
    NotFound(String),
    #[error("not a participant of this chat")]
    NotParticipant,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidChatId(_) | Self::SelfChat | Self::Validation(_) => "E_VALIDATION",
            Self::UnknownUser(_) => "E_USER_NOT_FOUND",
            Self::NotFound(_) => "E_CHAT_NOT_FOUND",
            Self::NotParticipant => "E_FORBIDDEN",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// CHAT IDS
// =============================================================================

/// Order-independent chat id for two users.
#[must_use]
pub fn chat_id(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}_{hi}")
}

/// The two participants encoded in a canonical chat id.
#[must_use]
pub fn participants(chat_id: &str) -> Option<(Uuid, Uuid)> {
    let (a, b) = chat_id.split_once('_')?;
    let a = Uuid::parse_str(a).ok()?;
    let b = Uuid::parse_str(b).ok()?;
    if a >= b || self::chat_id(a, b) != chat_id {
        return None;
    }
    Some((a, b))
}

/// The other participant, if `user_id` is one of them.
///
/// # Errors
///
/// `InvalidChatId` or `NotParticipant`.
pub fn counterpart(chat_id: &str, user_id: Uuid) -> Result<Uuid, ChatError> {
    let (a, b) = participants(chat_id).ok_or_else(|| ChatError::InvalidChatId(chat_id.to_owned()))?;
    if user_id == a {
        Ok(b)
    } else if user_id == b {
        Ok(a)
    } else {
        Err(ChatError::NotParticipant)
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Chat {
    pub id: String,
    pub users: Vec<Uuid>,
    pub last_message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ChatRow {
    pub chat_id: String,
    pub other_user_id: Uuid,
    pub other_user_name: Option<String>,
    pub last_message: String,
    pub updated_at: OffsetDateTime,
}

/// One inbox line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSummary {
    pub chat_id: String,
    pub other_user_id: Uuid,
    pub other_user_name: String,
    pub last_message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    pub message: String,
}

/// Apply display fallbacks and the optional case-insensitive name filter.
#[must_use]
pub fn summarize(rows: Vec<ChatRow>, search: Option<&str>) -> Vec<ChatSummary> {
    let needle = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);
    rows.into_iter()
        .map(|row| ChatSummary {
            chat_id: row.chat_id,
            other_user_id: row.other_user_id,
            other_user_name: row
                .other_user_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_USER.to_owned()),
            last_message: if row.last_message.is_empty() { NO_MESSAGES.to_owned() } else { row.last_message },
            updated_at: row.updated_at,
        })
        .filter(|s| needle.as_deref().is_none_or(|n| s.other_user_name.to_lowercase().contains(n)))
        .collect()
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Create the chat between `me` and `other` if it does not exist yet.
///
/// # Errors
///
/// `SelfChat`, `UnknownUser`, or a database failure.
pub async fn open_chat(pool: &PgPool, me: Uuid, other: Uuid) -> Result<Chat, ChatError> {
    if me == other {
        return Err(ChatError::SelfChat);
    }
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(other)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(ChatError::UnknownUser(other));
    }

    let id = chat_id(me, other);
    sqlx::query("INSERT INTO chats (id, users) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
        .bind(&id)
        .bind(vec![me, other])
        .execute(pool)
        .await?;

    sqlx::query_as::<_, Chat>("SELECT id, users, last_message, updated_at FROM chats WHERE id = $1")
        .bind(&id)
        .fetch_optional(pool)
        .await?
        .ok_or(ChatError::NotFound(id))
}

/// Store a message and bump the chat's last message atomically.
///
/// # Errors
///
/// Blank text, a non-participant sender, or a missing chat.
pub async fn send_message(pool: &PgPool, chat_id: &str, sender: Uuid, text: &str) -> Result<Message, ChatError> {
    let text = validate::required("message", text)?;
    let recipient = counterpart(chat_id, sender)?;

    let mut tx = pool.begin().await?;
    let touched = sqlx::query("UPDATE chats SET last_message = $2, updated_at = now() WHERE id = $1")
        .bind(chat_id)
        .bind(&text)
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(ChatError::NotFound(chat_id.to_owned()));
    }
    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (id, chat_id, sender_id, recipient_id, message)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, chat_id, sender_id, recipient_id, message, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(chat_id)
    .bind(sender)
    .bind(recipient)
    .bind(&text)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(message)
}

/// Send and push to subscribers. Shared by the HTTP route and `chat:send`.
///
/// # Errors
///
/// Same as [`send_message`].
pub async fn deliver(state: &AppState, chat_id: &str, sender: Uuid, text: &str) -> Result<Message, ChatError> {
    let message = send_message(&state.pool, chat_id, sender, text).await?;
    state
        .hub
        .publish(&Topic::Chat(message.chat_id.clone()), "chat:message", to_data(&message));
    notify_inboxes(&state.hub, &message.chat_id);
    tracing::debug!(chat_id = %message.chat_id, %sender, "chat: delivered");
    Ok(message)
}

/// Tell both participants their inbox changed.
pub fn notify_inboxes(hub: &Hub, chat_id: &str) {
    let Some((a, b)) = participants(chat_id) else {
        return;
    };
    let mut data = Data::new();
    data.insert("chat_id".into(), serde_json::json!(chat_id));
    for user in [a, b] {
        hub.publish(&Topic::Inbox(user), "inbox:refresh", data.clone());
    }
}

/// Chats containing `me`, most recently active first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_chats(pool: &PgPool, me: Uuid, search: Option<&str>) -> Result<Vec<ChatSummary>, ChatError> {
    let rows = sqlx::query_as::<_, ChatRow>(
        "SELECT c.id AS chat_id, o.other_id AS other_user_id, u.full_name AS other_user_name,
                c.last_message, c.updated_at
         FROM chats c
         CROSS JOIN LATERAL (SELECT x AS other_id FROM unnest(c.users) AS x WHERE x <> $1 LIMIT 1) o
         LEFT JOIN users u ON u.id = o.other_id
         WHERE $1 = ANY (c.users)
         ORDER BY c.updated_at DESC, c.id ASC",
    )
    .bind(me)
    .fetch_all(pool)
    .await?;
    Ok(summarize(rows, search))
}

/// Messages oldest first. Participants only.
///
/// # Errors
///
/// `InvalidChatId` or `NotParticipant`.
pub async fn list_messages(pool: &PgPool, chat_id: &str, me: Uuid) -> Result<Vec<Message>, ChatError> {
    counterpart(chat_id, me)?;
    let rows = sqlx::query_as::<_, Message>(
        "SELECT id, chat_id, sender_id, recipient_id, message, created_at
         FROM messages WHERE chat_id = $1
         ORDER BY created_at ASC, id ASC",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete a chat; its messages go with it.
///
/// # Errors
///
/// `InvalidChatId`, `NotParticipant`, or `NotFound`.
pub async fn delete_chat(pool: &PgPool, chat_id: &str, me: Uuid) -> Result<(), ChatError> {
    counterpart(chat_id, me)?;
    let result = sqlx::query("DELETE FROM chats WHERE id = $1")
        .bind(chat_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ChatError::NotFound(chat_id.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
