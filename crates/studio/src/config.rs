use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use video_api::ApiConfig;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const CREDENTIALS_FILE: &str = "credentials.json";

/// Per-user data directory
pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("video_studio")
}

/// Studio settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Video endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Fixed delay between status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Where downloads are saved; the user's download folder when unset
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Where credentials and config live; [`app_data_dir`] when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// `tracing` filter directive
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            download_dir: None,
            data_dir: None,
            log_filter: None,
        }
    }
}

impl StudioConfig {
    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }

    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = Some(dir);
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(app_data_dir)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| self.data_dir().join("downloads"))
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir().join(CREDENTIALS_FILE)
    }

    /// Install the `tracing` subscriber using `log_filter`
    pub fn init_logging(&self) -> bool {
        crate::logging::init(self.log_filter.as_deref())
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
