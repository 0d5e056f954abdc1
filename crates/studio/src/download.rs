use std::path::{Path, PathBuf};

use crate::artifacts::ArtifactHandle;
use crate::error::{Result, StudioError};

/// Save-as target for finished videos
pub trait ArtifactSaver: Send + Sync {
    /// Persist `bytes` and return where they ended up
    fn save(&self, handle: &ArtifactHandle, bytes: &[u8]) -> Result<PathBuf>;
}

/// Saves into a directory without overwriting existing files
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (file_name, String::new()),
        };
        (1..)
            .map(|n| self.dir.join(format!("{stem}-{n}{ext}")))
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

impl ArtifactSaver for DirectorySaver {
    fn save(&self, handle: &ArtifactHandle, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StudioError::storage(format!("create {}: {e}", self.dir.display())))?;
        let path = self.free_path(&handle.file_name());
        std::fs::write(&path, bytes)
            .map_err(|e| StudioError::storage(format!("write {}: {e}", path.display())))?;
        tracing::info!("saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}
