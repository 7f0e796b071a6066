//! WebSocket handler: topic subscriptions and chat sends over one socket.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Frames published to subscribed topics → forward to client
//!
//! Handler functions validate, act, and return an `Outcome`; the dispatch
//! layer turns that into the reply frame. Pushes to other clients go
//! through the hub, never through the reply.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id` and `user_id`
//! 2. `sub:open` registers a topic, then replies with its current snapshot
//! 3. Hub publishes arrive as `request` frames stamped with the topic
//! 4. Close → subscription guards drop → hub entries removed

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status, to_data};
use crate::hub::{Hub, Subscription, Topic, TopicError};
use crate::services::{chat, community, course, lecture, quiz, resource, session};
use crate::state::AppState;

/// Outbound buffer per connection. Publishes to a full buffer are dropped.
const CLIENT_BUFFER: usize = 256;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. Handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
}

/// Per-socket state: who is connected and what they listen to.
struct Connection {
    client_id: Uuid,
    user_id: Uuid,
    tx: mpsc::Sender<Frame>,
    subscriptions: HashMap<Topic, Subscription>,
}

impl Connection {
    fn new(user_id: Uuid, tx: mpsc::Sender<Frame>) -> Self {
        Self { client_id: Uuid::new_v4(), user_id, tx, subscriptions: HashMap::new() }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

/// `GET /api/ws?ticket=`: one-time ticket from `POST /api/auth/ws-ticket`.
pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let user_id = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(uid)) => uid,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Uuid) {
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(CLIENT_BUFFER);
    let mut conn = Connection::new(user_id, client_tx);
    let client_id = conn.client_id;

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, %user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, &mut conn, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    let topics = conn.subscriptions.len();
    drop(conn);
    info!(%client_id, topics, live_topics = state.hub.topic_count(), "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated user_id as `from`.
    req.from = Some(conn.user_id.to_string());
    info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "sub" => handle_sub(state, conn, &req).await,
        "chat" => handle_chat(state, conn.user_id, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// SUBSCRIPTION HANDLERS
// =============================================================================

async fn handle_sub(state: &AppState, conn: &mut Connection, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "open" => {
            let raw = req.data_str("topic").ok_or_else(|| req.error("topic required"))?;
            let topic = Topic::parse(raw).map_err(|e| req.error_from(&e))?;
            if !topic.allows(conn.user_id) {
                return Err(req.error_from(&TopicError::Forbidden(raw.to_owned())));
            }

            let user_id = conn.user_id;
            let snapshot = open_topic(conn, &state.hub, &topic, snapshot(state, &topic, user_id, req)).await?;
            tracing::debug!(client_id = %conn.client_id, %topic, subscribers = state.hub.subscriber_count(&topic), "ws: topic opened");

            let mut data = Data::new();
            data.insert("topic".into(), serde_json::json!(topic.to_string()));
            data.insert("snapshot".into(), snapshot);
            Ok(Outcome::Reply(data))
        }
        "close" => {
            let raw = req.data_str("topic").ok_or_else(|| req.error("topic required"))?;
            let topic = Topic::parse(raw).map_err(|e| req.error_from(&e))?;
            conn.subscriptions.remove(&topic);
            Ok(Outcome::Done)
        }
        "list" => {
            let mut topics: Vec<String> = conn.subscriptions.keys().map(ToString::to_string).collect();
            topics.sort();
            let mut data = Data::new();
            data.insert("topics".into(), serde_json::json!(topics));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown sub op: {op}"))),
    }
}

/// Register `topic` for this connection, then await its snapshot. Anything
/// published while the snapshot loads is already queued for the client, so
/// it may arrive twice but is never lost. A failed snapshot releases a
/// subscription made here; one held from an earlier open is kept.
async fn open_topic(
    conn: &mut Connection,
    hub: &Hub,
    topic: &Topic,
    snapshot: impl Future<Output = Result<serde_json::Value, Frame>>,
) -> Result<serde_json::Value, Frame> {
    let fresh = !conn.subscriptions.contains_key(topic);
    if fresh {
        let guard = hub.subscribe(topic.clone(), conn.client_id, conn.tx.clone());
        conn.subscriptions.insert(topic.clone(), guard);
    }
    let result = snapshot.await;
    if result.is_err() && fresh {
        conn.subscriptions.remove(topic);
    }
    result
}

/// Current state of a topic, sent once when it is opened so the client
/// never misses what happened before it subscribed.
async fn snapshot(state: &AppState, topic: &Topic, user_id: Uuid, req: &Frame) -> Result<serde_json::Value, Frame> {
    let pool = &state.pool;
    match topic {
        Topic::Chat(id) => to_value(req, &chat::list_messages(pool, id, user_id).await.map_err(|e| req.error_from(&e))?),
        Topic::Inbox(_) => to_value(req, &chat::list_chats(pool, user_id, None).await.map_err(|e| req.error_from(&e))?),
        Topic::Community => to_value(req, &community::list_questions(pool).await.map_err(|e| req.error_from(&e))?),
        Topic::Replies(id) => to_value(req, &community::list_replies(pool, *id).await.map_err(|e| req.error_from(&e))?),
        Topic::Pdfs => to_value(req, &resource::list_pdfs(pool).await.map_err(|e| req.error_from(&e))?),
        Topic::Quizzes => to_value(req, &quiz::list_quizzes(pool).await.map_err(|e| req.error_from(&e))?),
        Topic::Courses => to_value(req, &course::list_courses(pool, user_id).await.map_err(|e| req.error_from(&e))?),
        Topic::Lectures => to_value(req, &lecture::list_lectures(pool, None).await.map_err(|e| req.error_from(&e))?),
        Topic::Uploads(_) => Ok(serde_json::json!([])),
    }
}

fn to_value<T: Serialize>(req: &Frame, value: &T) -> Result<serde_json::Value, Frame> {
    serde_json::to_value(value).map_err(|e| req.error(format!("snapshot serialization failed: {e}")))
}

// =============================================================================
// CHAT HANDLERS
// =============================================================================

async fn handle_chat(state: &AppState, user_id: Uuid, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "send" => {
            let chat_id = req.data_str("chat_id").ok_or_else(|| req.error("chat_id required"))?;
            let text = req.data_str("message").unwrap_or_default();
            let message = chat::deliver(state, chat_id, user_id, text)
                .await
                .map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Reply(to_data(&message)))
        }
        op => Err(req.error(format!("unknown chat op: {op}"))),
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        tracing::debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
