use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Connection settings for the video endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL, without trailing slash
    pub base_url: String,

    /// Optional `OpenAI-Organization` header value
    #[serde(default)]
    pub organization: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            organization: None,
            request_timeout_secs: Some(120),
        }
    }
}

impl ApiConfig {
    /// With API base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// With organization header
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// With timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn videos_url(&self) -> String {
        format!("{}/videos", self.base_url.trim_end_matches('/'))
    }

    pub fn video_url(&self, id: &str) -> String {
        format!("{}/{}", self.videos_url(), id)
    }

    pub fn content_url(&self, id: &str) -> String {
        format!("{}/content", self.video_url(id))
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
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
}
