use axum::body::Bytes;
use tokio::sync::mpsc;

use super::*;
use crate::state::test_helpers::test_app_state;

fn body(chunks: Vec<Result<Bytes, std::io::Error>>) -> ByteStream {
    Box::pin(futures::stream::iter(chunks))
}

#[tokio::test]
async fn successful_upload_publishes_progress_to_uploader_only() {
    let (state, _dir) = test_app_state();
    let me = Uuid::new_v4();
    let someone_else = Uuid::new_v4();

    let (tx, mut rx) = mpsc::channel(16);
    let _mine = state.hub.subscribe(Topic::Uploads(me), Uuid::new_v4(), tx);
    let (other_tx, mut other_rx) = mpsc::channel(16);
    let _theirs = state.hub.subscribe(Topic::Uploads(someone_else), Uuid::new_v4(), other_tx);

    let key = ObjectKey::timestamped("pdfs", "notes.pdf", 42);
    let stored = upload(
        &state,
        me,
        &key,
        body(vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))]),
        Some(6),
    )
    .await
    .unwrap();

    assert_eq!(stored.size, 6);
    assert_eq!(stored.key, key.as_str());
    assert_eq!(stored.url, format!("http://localhost:3000/files/{key}"));

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.syscall, "upload:progress");
    assert_eq!(first.data.get("bytes_transferred"), Some(&serde_json::json!(3)));
    assert_eq!(second.data.get("percent"), Some(&serde_json::json!(100)));
    assert_eq!(second.data_str("key"), Some(key.as_str()));
    assert!(other_rx.try_recv().is_err());
}

#[tokio::test]
async fn failed_upload_publishes_failure_and_leaves_no_object() {
    let (state, dir) = test_app_state();
    let me = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(16);
    let _sub = state.hub.subscribe(Topic::Uploads(me), Uuid::new_v4(), tx);

    let key = ObjectKey::timestamped("lectures", "clip.mp4", 7);
    let chunks = vec![
        Ok(Bytes::from_static(b"frame")),
        Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated")),
    ];
    let err = upload(&state, me, &key, body(chunks), Some(100)).await.unwrap_err();
    assert!(matches!(err, StorageError::Interrupted(_)));
    assert!(!dir.path().join(key.as_str()).exists());

    let mut last = None;
    while let Ok(frame) = rx.try_recv() {
        last = Some(frame);
    }
    let last = last.expect("at least the failure event");
    assert_eq!(last.syscall, "upload:failed");
    assert_eq!(last.data_str("key"), Some(key.as_str()));
}
