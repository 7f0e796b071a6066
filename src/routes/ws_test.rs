use super::*;
use crate::state::test_helpers;
use serde_json::json;
use tokio::time::{Duration, timeout};

fn request(syscall: &str, data: serde_json::Value) -> String {
    let data: Data = serde_json::from_value(data).unwrap();
    serde_json::to_string(&Frame::request(syscall, data)).unwrap()
}

fn connection(user_id: Uuid) -> (Connection, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(16);
    (Connection::new(user_id, tx), rx)
}

async fn one(state: &AppState, conn: &mut Connection, text: &str) -> Frame {
    let mut frames = process_inbound_text(state, conn, text).await;
    assert_eq!(frames.len(), 1, "expected exactly one reply");
    frames.remove(0)
}

async fn recv_push(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("push receive timed out")
        .expect("push channel closed unexpectedly")
}

#[tokio::test]
async fn invalid_json_yields_gateway_error() {
    let (state, _dir) = test_helpers::test_app_state();
    let (mut conn, _rx) = connection(Uuid::new_v4());
    let reply = one(&state, &mut conn, "{not json").await;
    assert_eq!(reply.syscall, "gateway:error");
    assert!(reply.data_str("message").unwrap().starts_with("invalid json"));
}

#[tokio::test]
async fn unknown_prefix_is_an_error() {
    let (state, _dir) = test_helpers::test_app_state();
    let (mut conn, _rx) = connection(Uuid::new_v4());
    let reply = one(&state, &mut conn, &request("board:join", json!({}))).await;
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.data_str("message"), Some("unknown prefix: board"));
}

#[tokio::test]
async fn own_upload_topic_opens_and_receives_pushes() {
    let (state, _dir) = test_helpers::test_app_state();
    let me = Uuid::new_v4();
    let (mut conn, mut rx) = connection(me);

    let topic = format!("uploads:{me}");
    let reply = one(&state, &mut conn, &request("sub:open", json!({ "topic": topic }))).await;
    assert_eq!(reply.status, Status::Done);
    assert_eq!(reply.data_str("topic"), Some(topic.as_str()));
    assert_eq!(reply.data.get("snapshot"), Some(&json!([])));

    let mut data = Data::new();
    data.insert("bytes_transferred".into(), json!(10));
    assert_eq!(state.hub.publish(&Topic::Uploads(me), "upload:progress", data), 1);
    let push = recv_push(&mut rx).await;
    assert_eq!(push.syscall, "upload:progress");
    assert_eq!(push.topic.as_deref(), Some(topic.as_str()));
}

#[tokio::test]
async fn private_topics_of_others_are_refused() {
    let (state, _dir) = test_helpers::test_app_state();
    let (mut conn, _rx) = connection(Uuid::new_v4());

    let other = Uuid::new_v4();
    let reply = one(&state, &mut conn, &request("sub:open", json!({ "topic": format!("inbox:{other}") }))).await;
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.data_str("code"), Some("E_FORBIDDEN"));

    let stranger_chat = chat::chat_id(Uuid::new_v4(), Uuid::new_v4());
    let reply = one(&state, &mut conn, &request("sub:open", json!({ "topic": format!("chat:{stranger_chat}") }))).await;
    assert_eq!(reply.data_str("code"), Some("E_FORBIDDEN"));
    assert!(conn.subscriptions.is_empty());
}

#[tokio::test]
async fn malformed_and_missing_topics_are_errors() {
    let (state, _dir) = test_helpers::test_app_state();
    let (mut conn, _rx) = connection(Uuid::new_v4());

    let reply = one(&state, &mut conn, &request("sub:open", json!({ "topic": "chat:nope" }))).await;
    assert_eq!(reply.data_str("code"), Some("E_TOPIC_MALFORMED"));

    let reply = one(&state, &mut conn, &request("sub:open", json!({ "topic": "boards" }))).await;
    assert_eq!(reply.data_str("code"), Some("E_TOPIC_UNKNOWN"));

    let reply = one(&state, &mut conn, &request("sub:open", json!({}))).await;
    assert_eq!(reply.data_str("message"), Some("topic required"));
}

#[tokio::test]
async fn reopening_keeps_a_single_subscription_and_close_releases_it() {
    let (state, _dir) = test_helpers::test_app_state();
    let me = Uuid::new_v4();
    let (mut conn, _rx) = connection(me);
    let topic = format!("uploads:{me}");

    one(&state, &mut conn, &request("sub:open", json!({ "topic": topic }))).await;
    one(&state, &mut conn, &request("sub:open", json!({ "topic": topic }))).await;
    assert_eq!(state.hub.subscriber_count(&Topic::Uploads(me)), 1);

    let listed = one(&state, &mut conn, &request("sub:list", json!({}))).await;
    assert_eq!(listed.data.get("topics"), Some(&json!([topic])));

    let closed = one(&state, &mut conn, &request("sub:close", json!({ "topic": topic }))).await;
    assert_eq!(closed.status, Status::Done);
    assert_eq!(state.hub.subscriber_count(&Topic::Uploads(me)), 0);
}

#[tokio::test]
async fn two_connections_of_one_user_both_receive() {
    let (state, _dir) = test_helpers::test_app_state();
    let me = Uuid::new_v4();
    let (mut phone, mut phone_rx) = connection(me);
    let (mut laptop, mut laptop_rx) = connection(me);
    let topic = json!({ "topic": format!("uploads:{me}") });

    one(&state, &mut phone, &request("sub:open", topic.clone())).await;
    one(&state, &mut laptop, &request("sub:open", topic)).await;
    assert_eq!(state.hub.publish(&Topic::Uploads(me), "upload:progress", Data::new()), 2);
    recv_push(&mut phone_rx).await;
    recv_push(&mut laptop_rx).await;

    drop(phone);
    assert_eq!(state.hub.subscriber_count(&Topic::Uploads(me)), 1);
}

#[tokio::test]
async fn events_published_while_the_snapshot_loads_still_arrive() {
    let (state, _dir) = test_helpers::test_app_state();
    let me = Uuid::new_v4();
    let (mut conn, mut rx) = connection(me);
    let topic = Topic::Uploads(me);

    let hub = state.hub.clone();
    let loading = async {
        let mut data = Data::new();
        data.insert("bytes_transferred".into(), json!(4));
        assert_eq!(hub.publish(&topic, "upload:progress", data), 1);
        Ok::<_, Frame>(json!([]))
    };
    let snapshot = open_topic(&mut conn, &state.hub, &topic, loading).await.unwrap();
    assert_eq!(snapshot, json!([]));

    let push = recv_push(&mut rx).await;
    assert_eq!(push.syscall, "upload:progress");
    assert_eq!(push.data.get("bytes_transferred"), Some(&json!(4)));
}

#[tokio::test]
async fn failed_snapshot_releases_only_a_fresh_subscription() {
    let (state, _dir) = test_helpers::test_app_state();
    let me = Uuid::new_v4();
    let (mut conn, _rx) = connection(me);
    let topic = Topic::Uploads(me);
    let failing = || async { Err::<serde_json::Value, _>(Frame::request("sub:open", Data::new()).error("snapshot failed")) };

    let err = open_topic(&mut conn, &state.hub, &topic, failing()).await.unwrap_err();
    assert_eq!(err.data_str("message"), Some("snapshot failed"));
    assert!(conn.subscriptions.is_empty());
    assert_eq!(state.hub.subscriber_count(&topic), 0);

    open_topic(&mut conn, &state.hub, &topic, async { Ok(json!([])) }).await.unwrap();
    open_topic(&mut conn, &state.hub, &topic, failing()).await.unwrap_err();
    assert!(conn.subscriptions.contains_key(&topic));
    assert_eq!(state.hub.subscriber_count(&topic), 1);
}

#[tokio::test]
async fn chat_send_checks_participation_and_text() {
    let (state, _dir) = test_helpers::test_app_state();
    let me = Uuid::new_v4();
    let (mut conn, _rx) = connection(me);

    let reply = one(&state, &mut conn, &request("chat:send", json!({ "message": "hi" }))).await;
    assert_eq!(reply.data_str("message"), Some("chat_id required"));

    let foreign = chat::chat_id(Uuid::new_v4(), Uuid::new_v4());
    let reply = one(&state, &mut conn, &request("chat:send", json!({ "chat_id": foreign, "message": "hi" }))).await;
    assert_eq!(reply.data_str("code"), Some("E_FORBIDDEN"));

    let mine = chat::chat_id(me, Uuid::new_v4());
    let reply = one(&state, &mut conn, &request("chat:send", json!({ "chat_id": mine, "message": "  " }))).await;
    assert_eq!(reply.data_str("code"), Some("E_VALIDATION"));
}

#[tokio::test]
async fn replies_correlate_with_the_request() {
    let (state, _dir) = test_helpers::test_app_state();
    let (mut conn, _rx) = connection(Uuid::new_v4());
    let req = Frame::request("sub:list", Data::new());
    let reply = one(&state, &mut conn, &serde_json::to_string(&req).unwrap()).await;
    assert_eq!(reply.parent_id, Some(req.id));
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::auth;
    use crate::state::test_helpers::live_app_state;

    #[tokio::test]
    async fn chat_topic_snapshot_and_live_message() {
        let (state, _dir) = live_app_state().await;
        let a = auth::sign_in_anonymously(&state.pool).await.unwrap();
        let b = auth::sign_in_anonymously(&state.pool).await.unwrap();
        let opened = chat::open_chat(&state.pool, a, b).await.unwrap();
        chat::send_message(&state.pool, &opened.id, a, "earlier").await.unwrap();

        let (mut conn_b, mut rx_b) = connection(b);
        let topic = format!("chat:{}", opened.id);
        let reply = one(&state, &mut conn_b, &request("sub:open", json!({ "topic": topic }))).await;
        assert_eq!(reply.data.get("snapshot").and_then(|v| v.as_array()).map(Vec::len), Some(1));

        let (mut conn_a, _rx_a) = connection(a);
        let sent = one(&state, &mut conn_a, &request("chat:send", json!({ "chat_id": opened.id, "message": "now" }))).await;
        assert_eq!(sent.status, Status::Done);

        let push = recv_push(&mut rx_b).await;
        assert_eq!(push.syscall, "chat:message");
        assert_eq!(push.data_str("message"), Some("now"));
    }
}
