//! Transport layer for the asynchronous video generation API.
//!
//! Wraps the three remote operations (create, status, content) behind the
//! [`VideoApi`] trait and maps HTTP failures into [`ApiError`].

use async_trait::async_trait;

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod options;
pub mod types;

pub use client::OpenAiVideoClient;
pub use config::{ApiConfig, DEFAULT_API_BASE};
pub use error::{ApiError, ApiErrorKind, Result};
pub use mock::ScriptedVideoApi;
pub use options::{GenerationOptions, VideoModel, VideoSeconds, VideoSize};
pub use types::{
    ArtifactPayload, CreateRequest, ReferencePayload, RemoteFailure, RemoteStatus, StatusReport,
    VideoId, VideoJob,
};

/// Remote video generation service.
///
/// Implementations perform exactly one network call per method and never retry.
#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Submit a generation request
    async fn create_generation(&self, credential: &str, request: &CreateRequest) -> Result<VideoJob>;

    /// Fetch status and progress of a generation
    async fn fetch_status(&self, credential: &str, id: &VideoId) -> Result<StatusReport>;

    /// Download the finished video
    async fn fetch_artifact(&self, credential: &str, id: &VideoId) -> Result<ArtifactPayload>;
}
