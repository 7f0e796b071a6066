//! Object storage for uploaded media.
//!
//! ARCHITECTURE
//! ============
//! Services talk to an [`ObjectStore`] trait object held in `AppState`. The
//! shipped implementation writes under a local directory that the router
//! also serves at `/files`, so a stored key maps directly to a download URL.
//!
//! Writes stream chunk by chunk into `<key>.part` and are renamed into place
//! only after the body ends. A failed transfer removes the partial file;
//! nothing is resumed.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Request body as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Callback invoked after each chunk lands.
pub type ProgressFn<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("upload interrupted: {0}")]
    Interrupted(std::io::Error),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl crate::frame::ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "E_INVALID_KEY",
            Self::TooLarge { .. } => "E_TOO_LARGE",
            Self::Interrupted(_) => "E_UPLOAD_INTERRUPTED",
            Self::Io(_) => "E_STORAGE",
        }
    }
}

// =============================================================================
// KEYS
// =============================================================================

/// Hex characters of randomness in timestamped keys.
const KEY_TAG_LEN: usize = 8;

/// Slash-separated object path, e.g. `pdfs/1700000000000_3f9a1c2e_notes.pdf`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// `{category}/{ts}_{tag}_{filename}` with the filename sanitized. The
    /// random tag keeps same-named uploads in one millisecond on separate
    /// objects (and separate `.part` files).
    #[must_use]
    pub fn timestamped(category: &str, filename: &str, ts_ms: i64) -> Self {
        let tag = Uuid::new_v4().simple().to_string();
        Self(format!("{category}/{ts_ms}_{}_{}", &tag[..KEY_TAG_LEN], sanitize_filename(filename)))
    }

    /// `{category}/{a}_{b}`, used for images keyed by owning records.
    #[must_use]
    pub fn paired(category: &str, a: impl std::fmt::Display, b: impl std::fmt::Display) -> Self {
        Self(format!("{category}/{a}_{b}"))
    }

    /// Validate a key read back from the database.
    ///
    /// # Errors
    ///
    /// Rejects absolute paths, empty segments, and `.`/`..` segments.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let bad = raw.is_empty()
            || raw.starts_with('/')
            || raw.contains('\\')
            || raw.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
        if bad {
            return Err(StorageError::InvalidKey(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduce a client-supplied filename to a single safe path segment.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() { "file".to_owned() } else { trimmed.to_owned() }
}

// =============================================================================
// PROGRESS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: Option<u64>,
    pub percent: Option<u8>,
}

impl UploadProgress {
    #[must_use]
    pub fn new(bytes_transferred: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total == 0 {
                100
            } else {
                let pct = bytes_transferred.saturating_mul(100) / total;
                u8::try_from(pct.min(100)).unwrap_or(100)
            }
        });
        Self { bytes_transferred, total_bytes, percent }
    }
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `body` into `key`, reporting progress after every chunk.
    /// Returns the stored size in bytes.
    async fn put(
        &self,
        key: &ObjectKey,
        body: ByteStream,
        total_bytes: Option<u64>,
        max_bytes: u64,
        progress: ProgressFn<'_>,
    ) -> Result<u64, StorageError>;

    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError>;

    /// Public download URL for `key`.
    fn url(&self, key: &ObjectKey) -> String;
}

/// Filesystem-backed store rooted at `STORAGE_DIR`.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self { root: root.into(), public_base_url: public_base_url.into() }
    }

    fn path_for(&self, key: &ObjectKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

async fn write_chunks(
    file: &mut tokio::fs::File,
    mut body: ByteStream,
    total_bytes: Option<u64>,
    max_bytes: u64,
    progress: ProgressFn<'_>,
) -> Result<u64, StorageError> {
    let mut written: u64 = 0;
    let mut reported = false;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(StorageError::Interrupted)?;
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(StorageError::TooLarge { limit: max_bytes });
        }
        file.write_all(&chunk).await?;
        progress(UploadProgress::new(written, total_bytes));
        reported = true;
    }
    file.flush().await?;
    if !reported {
        progress(UploadProgress::new(0, total_bytes));
    }
    Ok(written)
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &ObjectKey,
        body: ByteStream,
        total_bytes: Option<u64>,
        max_bytes: u64,
        progress: ProgressFn<'_>,
    ) -> Result<u64, StorageError> {
        if total_bytes.is_some_and(|total| total > max_bytes) {
            return Err(StorageError::TooLarge { limit: max_bytes });
        }

        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = part_path(&path);
        let mut file = tokio::fs::File::create(&part).await?;

        let result = write_chunks(&mut file, body, total_bytes, max_bytes, progress).await;
        drop(file);

        match result {
            Ok(size) => {
                tokio::fs::rename(&part, &path).await?;
                Ok(size)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                    tracing::warn!(key = %key, error = %cleanup, "storage: partial upload cleanup failed");
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &ObjectKey) -> String {
        format!("{}/files/{}", self.public_base_url, key.as_str())
    }
}

#[cfg(test)]
impl LocalObjectStore {
    pub(crate) async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }
}

/// Undo an upload when the document write that follows it fails.
///
/// # Errors
///
/// Returns the original error unchanged.
pub async fn compensate<T, E: std::fmt::Display>(
    store: &dyn ObjectStore,
    key: &ObjectKey,
    result: Result<T, E>,
) -> Result<T, E> {
    if let Err(e) = &result {
        tracing::warn!(key = %key, error = %e, "storage: document write failed, removing object");
        if let Err(cleanup) = store.delete(key).await {
            tracing::error!(key = %key, error = %cleanup, "storage: compensating delete failed");
        }
    }
    result
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
