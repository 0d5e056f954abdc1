//! Request and response types for the video endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ApiError, Result};
use crate::options::GenerationOptions;

/// Opaque identifier assigned by the remote once a generation is accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the remote for one generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RemoteStatus::Queued => "queued",
            RemoteStatus::InProgress => "in_progress",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image attached to a creation request as `input_reference`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

/// A prepared creation request
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub prompt: String,
    pub options: GenerationOptions,
    pub reference: Option<ReferencePayload>,
}

impl CreateRequest {
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: ReferencePayload) -> Self {
        self.reference = Some(reference);
        self
    }

    /// JSON body used when no reference image is attached
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.options.model.as_str(),
            "prompt": self.prompt,
            "size": self.options.size.as_str(),
            "seconds": self.options.seconds.as_str(),
        })
    }

    /// Text fields of the multipart form, in send order
    pub fn form_fields(&self) -> [(&'static str, String); 4] {
        [
            ("model", self.options.model.as_str().to_string()),
            ("prompt", self.prompt.clone()),
            ("size", self.options.size.as_str().to_string()),
            ("seconds", self.options.seconds.as_str().to_string()),
        ]
    }
}

/// Failure detail attached to a failed generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFailure {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Video object as returned by the create call
#[derive(Debug, Clone, Deserialize)]
pub struct VideoObject {
    pub id: String,
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<RemoteFailure>,
    #[serde(default)]
    pub input_reference: Option<serde_json::Value>,
}

/// Body of a status poll; the id is optional since the caller already knows it
#[derive(Debug, Clone, Deserialize)]
pub struct StatusObject {
    #[serde(default)]
    pub id: Option<String>,
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<RemoteFailure>,
}

/// Result of an accepted creation request
#[derive(Debug, Clone, PartialEq)]
pub struct VideoJob {
    pub id: VideoId,
    pub status: RemoteStatus,
    pub progress: Option<u8>,
    pub input_reference: Option<serde_json::Value>,
}

impl From<VideoObject> for VideoJob {
    fn from(obj: VideoObject) -> Self {
        Self {
            id: VideoId(obj.id),
            status: obj.status,
            progress: obj.progress.map(clamp_progress),
            input_reference: obj.input_reference,
        }
    }
}

/// One status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: RemoteStatus,
    pub progress: u8,
    pub error: Option<RemoteFailure>,
}

impl StatusReport {
    pub fn new(status: RemoteStatus, progress: u8) -> Self {
        Self {
            status,
            progress: progress.min(100),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Failed,
            progress: 0,
            error: Some(RemoteFailure {
                message: message.into(),
                code: None,
            }),
        }
    }

    /// Human readable failure detail, falling back to a generic message
    pub fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.trim())
            .filter(|m| !m.is_empty())
            .unwrap_or("Video generation failed")
            .to_string()
    }
}

impl From<StatusObject> for StatusReport {
    fn from(obj: StatusObject) -> Self {
        Self {
            status: obj.status,
            progress: obj.progress.map(clamp_progress).unwrap_or(0),
            error: obj.error,
        }
    }
}

/// Finished video bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ArtifactPayload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the content type
    pub fn extension(&self) -> &'static str {
        let mime = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        match mime {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => "mp4",
        }
    }
}

/// Parse a video object body
pub fn parse_video_object(body: &str) -> Result<VideoObject> {
    serde_json::from_str(body).map_err(ApiError::from)
}

/// Parse a status poll body
pub fn parse_status(body: &str) -> Result<StatusReport> {
    serde_json::from_str::<StatusObject>(body)
        .map(StatusReport::from)
        .map_err(ApiError::from)
}

fn clamp_progress(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
