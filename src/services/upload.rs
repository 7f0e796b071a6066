//! Upload pipeline: stream to storage and report progress to the uploader.
//!
//! Progress events go to the uploader's private `uploads:{user}` topic as
//! `upload:progress`; a failed transfer publishes `upload:failed` after the
//! store has removed the partial object. Callers that write a document
//! after a successful upload wrap that write in `storage::compensate`.

use uuid::Uuid;

use crate::frame::{Data, to_data};
use crate::hub::Topic;
use crate::services::storage::{ByteStream, ObjectKey, StorageError, UploadProgress};
use crate::state::AppState;

/// A stored object and where to download it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
}

/// Stream `body` into `key` on behalf of `user_id`.
///
/// # Errors
///
/// Returns the storage error after publishing `upload:failed`.
pub async fn upload(
    state: &AppState,
    user_id: Uuid,
    key: &ObjectKey,
    body: ByteStream,
    total_bytes: Option<u64>,
) -> Result<StoredObject, StorageError> {
    let topic = Topic::Uploads(user_id);
    let key_str = key.to_string();

    let report = |progress: UploadProgress| {
        let mut data = to_data(&progress);
        data.insert("key".into(), serde_json::json!(key_str));
        state.hub.publish(&topic, "upload:progress", data);
    };

    let result = state
        .storage
        .put(key, body, total_bytes, state.config.upload_max_bytes, &report)
        .await;

    match result {
        Ok(size) => {
            tracing::info!(%user_id, key = %key, size, "upload: stored");
            Ok(StoredObject { key: key_str, url: state.storage.url(key), size })
        }
        Err(e) => {
            tracing::warn!(%user_id, key = %key, error = %e, "upload: failed");
            let mut data = Data::new();
            data.insert("key".into(), serde_json::json!(key_str));
            data.insert("message".into(), serde_json::json!(e.to_string()));
            state.hub.publish(&topic, "upload:failed", data);
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
