use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("sub:open", Data::new());
    assert_eq!(frame.syscall, "sub:open");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.topic.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let req = Frame::request("chat:send", Data::new()).with_topic("chat:a_b");
    let done = req.done();

    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.topic.as_deref(), Some("chat:a_b"));
    assert_eq!(done.syscall, "chat:send");
    assert_eq!(done.status, Status::Done);
    assert!(done.data.is_empty());
}

#[test]
fn done_with_carries_payload() {
    let req = Frame::request("sub:open", Data::new());
    let mut data = Data::new();
    data.insert("topic".into(), serde_json::json!("community"));
    let done = req.done_with(data);

    assert_eq!(done.status, Status::Done);
    assert_eq!(done.data_str("topic"), Some("community"));
}

#[test]
fn plain_error_has_message_only() {
    let err = Frame::request("chat:send", Data::new()).error("chat_id required");
    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data_str("message"), Some("chat_id required"));
    assert!(err.data.get("code").is_none());
}

#[test]
fn status_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Status::Done).unwrap(), "\"done\"");
    let parsed: Status = serde_json::from_str("\"error\"").unwrap();
    assert_eq!(parsed, Status::Error);
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("sub:open", Data::new());
    assert_eq!(frame.prefix(), "sub");
    assert_eq!(frame.op(), "open");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn inbound_frame_without_optional_fields_parses() {
    let json = r#"{"id":"00000000-0000-0000-0000-000000000001","parent_id":null,"ts":1,"syscall":"sub:list","status":"request"}"#;
    let frame: Frame = serde_json::from_str(json).expect("minimal frame should parse");
    assert_eq!(frame.syscall, "sub:list");
    assert!(frame.data.is_empty());
    assert!(frame.from.is_none());
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "E_NOT_FOUND"
        }
    }

    let req = Frame::request("sub:open", Data::new());
    let err = req.error_from(&NotFound);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data_str("code"), Some("E_NOT_FOUND"));
    assert_eq!(err.data_str("message"), Some("not found"));
    assert_eq!(
        err.data
            .get("retryable")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}

#[test]
fn to_data_flattens_objects() {
    #[derive(serde::Serialize)]
    struct Payload {
        chat_id: String,
        count: u32,
    }

    let data = to_data(&Payload { chat_id: "a_b".into(), count: 2 });
    assert_eq!(data.get("chat_id").and_then(|v| v.as_str()), Some("a_b"));
    assert_eq!(data.get("count").and_then(serde_json::Value::as_u64), Some(2));
}

#[test]
fn to_data_wraps_scalars() {
    let data = to_data(&vec![1, 2, 3]);
    assert_eq!(data.get("value"), Some(&serde_json::json!([1, 2, 3])));
}
