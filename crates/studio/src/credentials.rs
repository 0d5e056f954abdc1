//! API key persistence.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Well-known key the API credential is stored under
pub const CREDENTIAL_KEY: &str = "openai_api_key";

/// Get/set a single string secret
pub trait CredentialStore: Send + Sync {
    /// Stored secret, `None` when absent or blank
    fn get(&self) -> Result<Option<String>>;

    fn set(&self, secret: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// JSON file holding `{ "openai_api_key": "..." }`
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read credentials from {}", self.path.display()))?;
        if json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&json).context("parse credentials file")
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let mut file = open_private(&self.path)
            .with_context(|| format!("open credentials file {}", self.path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("write credentials to {}", self.path.display()))?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<String>> {
        let entries = self.read_entries()?;
        Ok(entries
            .get(CREDENTIAL_KEY)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    fn set(&self, secret: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(CREDENTIAL_KEY.to_string(), secret.trim().to_string());
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(CREDENTIAL_KEY).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

/// Open for writing, owner-only from creation; an existing file is narrowed
/// to owner-only before anything is written to it.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

/// In-memory store
#[derive(Default)]
pub struct MemoryCredentialStore {
    secret: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Mutex::new(Some(secret.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self
            .secret
            .lock()
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    fn set(&self, secret: &str) -> Result<()> {
        *self.secret.lock() = Some(secret.trim().to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.secret.lock() = None;
        Ok(())
    }
}
