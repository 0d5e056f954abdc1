//! Locally addressable handles for downloaded videos.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use video_api::{ArtifactPayload, VideoId};

use crate::error::{Result, StudioError};

/// Reference to one materialized video, valid until released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub key: Uuid,
    pub video_id: VideoId,
    pub content_type: String,
    pub len: usize,
    /// Where a player can load it from: a `blob:` style URL or a file path
    pub location: String,
    pub created_at: DateTime<Utc>,
    extension: &'static str,
}

impl ArtifactHandle {
    fn new(video_id: &VideoId, payload: &ArtifactPayload, key: Uuid, location: String) -> Self {
        Self {
            key,
            video_id: video_id.clone(),
            content_type: payload.content_type.clone(),
            len: payload.len(),
            location,
            created_at: Utc::now(),
            extension: payload.extension(),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// Suggested file name for save-as
    pub fn file_name(&self) -> String {
        format!("video-{}.{}", self.video_id, self.extension)
    }
}

/// Owner of materialized video bytes.
///
/// Every handle returned by `materialize` must be passed to `release` exactly
/// once.
pub trait ArtifactStore: Send + Sync {
    fn materialize(&self, video_id: &VideoId, payload: ArtifactPayload) -> Result<ArtifactHandle>;

    fn read(&self, handle: &ArtifactHandle) -> Result<Arc<[u8]>>;

    /// Returns false if the handle was already released
    fn release(&self, handle: &ArtifactHandle) -> bool;

    /// Handles materialized and not yet released
    fn live_count(&self) -> usize;
}

/// Keeps video bytes in memory, addressed as `blob:studio/<uuid>`
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<Uuid, Arc<[u8]>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn materialize(&self, video_id: &VideoId, payload: ArtifactPayload) -> Result<ArtifactHandle> {
        let key = Uuid::new_v4();
        let handle = ArtifactHandle::new(video_id, &payload, key, format!("blob:studio/{key}"));
        self.blobs.lock().insert(key, payload.bytes.into());
        Ok(handle)
    }

    fn read(&self, handle: &ArtifactHandle) -> Result<Arc<[u8]>> {
        self.blobs
            .lock()
            .get(&handle.key)
            .cloned()
            .ok_or_else(|| StudioError::storage(format!("artifact {} was released", handle.key)))
    }

    fn release(&self, handle: &ArtifactHandle) -> bool {
        self.blobs.lock().remove(&handle.key).is_some()
    }

    fn live_count(&self) -> usize {
        self.blobs.lock().len()
    }
}

/// Writes videos into a private temporary directory removed on drop
pub struct TempDirArtifactStore {
    dir: tempfile::TempDir,
    files: Mutex<HashMap<Uuid, PathBuf>>,
}

impl TempDirArtifactStore {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("video-studio-")
            .tempdir()
            .map_err(|e| StudioError::storage(format!("create artifact directory: {e}")))?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl ArtifactStore for TempDirArtifactStore {
    fn materialize(&self, video_id: &VideoId, payload: ArtifactPayload) -> Result<ArtifactHandle> {
        let key = Uuid::new_v4();
        let path = self.dir.path().join(format!("{key}.{}", payload.extension()));
        std::fs::write(&path, &payload.bytes)
            .map_err(|e| StudioError::storage(format!("write {}: {e}", path.display())))?;
        let handle = ArtifactHandle::new(video_id, &payload, key, path.display().to_string());
        self.files.lock().insert(key, path);
        Ok(handle)
    }

    fn read(&self, handle: &ArtifactHandle) -> Result<Arc<[u8]>> {
        let path = self
            .files
            .lock()
            .get(&handle.key)
            .cloned()
            .ok_or_else(|| StudioError::storage(format!("artifact {} was released", handle.key)))?;
        let bytes = std::fs::read(&path)
            .map_err(|e| StudioError::storage(format!("read {}: {e}", path.display())))?;
        Ok(bytes.into())
    }

    fn release(&self, handle: &ArtifactHandle) -> bool {
        match self.files.lock().remove(&handle.key) {
            Some(path) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("failed to remove {}: {e}", path.display());
                }
                true
            }
            None => false,
        }
    }

    fn live_count(&self) -> usize {
        self.files.lock().len()
    }
}
