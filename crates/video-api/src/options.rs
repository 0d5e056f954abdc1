//! Generation options accepted by the video endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// Output resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoSize {
    /// 1280x720 landscape
    #[default]
    #[serde(rename = "1280x720")]
    Landscape720,
    /// 720x1280 portrait
    #[serde(rename = "720x1280")]
    Portrait720,
    /// 1792x1024 landscape
    #[serde(rename = "1792x1024")]
    Landscape1024,
    /// 1024x1792 portrait
    #[serde(rename = "1024x1792")]
    Portrait1024,
}

impl VideoSize {
    pub const ALL: [VideoSize; 4] = [
        VideoSize::Landscape720,
        VideoSize::Portrait720,
        VideoSize::Landscape1024,
        VideoSize::Portrait1024,
    ];

    /// Pixel dimensions as (width, height)
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Landscape720 => (1280, 720),
            Self::Portrait720 => (720, 1280),
            Self::Landscape1024 => (1792, 1024),
            Self::Portrait1024 => (1024, 1792),
        }
    }

    pub fn width(self) -> u32 {
        self.dimensions().0
    }

    pub fn height(self) -> u32 {
        self.dimensions().1
    }

    pub fn pixel_count(self) -> u64 {
        let (w, h) = self.dimensions();
        w as u64 * h as u64
    }

    pub fn is_portrait(self) -> bool {
        let (w, h) = self.dimensions();
        h > w
    }

    /// Wire representation, e.g. `1280x720`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape720 => "1280x720",
            Self::Portrait720 => "720x1280",
            Self::Landscape1024 => "1792x1024",
            Self::Portrait1024 => "1024x1792",
        }
    }

    /// Look up the size matching exact pixel dimensions
    pub fn from_dimensions(width: u32, height: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|size| size.dimensions() == (width, height))
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoSize {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s.trim())
            .ok_or_else(|| ApiError::validation(format!("unsupported size '{s}'")))
    }
}

/// Clip length. The endpoint expects the value as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoSeconds {
    #[default]
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "12")]
    Twelve,
}

impl VideoSeconds {
    pub const ALL: [VideoSeconds; 3] = [VideoSeconds::Four, VideoSeconds::Eight, VideoSeconds::Twelve];

    pub fn as_secs(self) -> u32 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
            Self::Twelve => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Four => "4",
            Self::Eight => "8",
            Self::Twelve => "12",
        }
    }
}

impl fmt::Display for VideoSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoSeconds {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4" => Ok(Self::Four),
            "8" => Ok(Self::Eight),
            "12" => Ok(Self::Twelve),
            other => Err(ApiError::validation(format!(
                "unsupported duration '{other}', expected 4, 8 or 12"
            ))),
        }
    }
}

impl TryFrom<u32> for VideoSeconds {
    type Error = ApiError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        secs.to_string().parse()
    }
}

/// Model tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoModel {
    #[default]
    #[serde(rename = "sora-2")]
    Standard,
    #[serde(rename = "sora-2-pro")]
    Pro,
}

impl VideoModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "sora-2",
            Self::Pro => "sora-2-pro",
        }
    }
}

impl fmt::Display for VideoModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoModel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sora-2" => Ok(Self::Standard),
            "sora-2-pro" => Ok(Self::Pro),
            other => Err(ApiError::validation(format!("unsupported model '{other}'"))),
        }
    }
}

/// Options copied into every creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub size: VideoSize,
    pub seconds: VideoSeconds,
    pub model: VideoModel,
}

impl GenerationOptions {
    pub fn new(size: VideoSize, seconds: VideoSeconds, model: VideoModel) -> Self {
        Self {
            size,
            seconds,
            model,
        }
    }

    pub fn with_size(mut self, size: VideoSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_seconds(mut self, seconds: VideoSeconds) -> Self {
        self.seconds = seconds;
        self
    }

    pub fn with_model(mut self, model: VideoModel) -> Self {
        self.model = model;
        self
    }
}
