use super::*;

#[tokio::test]
async fn test_state_wires_local_storage_under_tempdir() {
    let (state, dir) = test_helpers::test_app_state();
    assert_eq!(state.config.storage_dir, dir.path());

    let key = crate::services::storage::ObjectKey::timestamped("pdfs", "a.pdf", 1);
    assert_eq!(state.storage.url(&key), format!("http://localhost:3000/files/{key}"));
}

#[tokio::test]
async fn clones_share_hub_and_plays() {
    let (state, _dir) = test_helpers::test_app_state();
    let clone = state.clone();

    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    let _sub = state.hub.subscribe(crate::hub::Topic::Community, uuid::Uuid::new_v4(), tx);
    assert_eq!(clone.hub.subscriber_count(&crate::hub::Topic::Community), 1);
    assert_eq!(clone.plays.active().await, state.plays.active().await);
}
