//! Scripted in-process implementation of [`VideoApi`] for tests and demos.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::{ApiError, Result};
use crate::types::{ArtifactPayload, CreateRequest, RemoteStatus, StatusReport, VideoId, VideoJob};
use crate::VideoApi;

#[derive(Debug, Default)]
struct Calls {
    creates: Vec<CreateRequest>,
    statuses: Vec<VideoId>,
    artifacts: Vec<VideoId>,
    credentials: Vec<String>,
}

/// Replays scripted responses in order.
///
/// Status scripts are kept per video id; the last scripted status repeats once
/// the script runs out.
#[derive(Default)]
pub struct ScriptedVideoApi {
    creates: Mutex<VecDeque<Result<VideoJob>>>,
    statuses: Mutex<HashMap<VideoId, VecDeque<Result<StatusReport>>>>,
    artifacts: Mutex<HashMap<VideoId, Result<ArtifactPayload>>>,
    calls: Mutex<Calls>,
    latency: Option<Duration>,
}

impl ScriptedVideoApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue an accepted creation returning `id` in `queued` state
    pub fn accept(self, id: &str) -> Self {
        self.push_create(Ok(VideoJob {
            id: VideoId::new(id),
            status: RemoteStatus::Queued,
            progress: Some(0),
            input_reference: None,
        }));
        self
    }

    /// Queue a rejected creation
    pub fn reject(self, err: ApiError) -> Self {
        self.push_create(Err(err));
        self
    }

    /// Script status responses for `id`
    pub fn statuses<I>(self, id: &str, script: I) -> Self
    where
        I: IntoIterator<Item = Result<StatusReport>>,
    {
        self.statuses
            .lock()
            .entry(VideoId::new(id))
            .or_default()
            .extend(script);
        self
    }

    /// Script the artifact fetch for `id`
    pub fn artifact(self, id: &str, payload: Result<ArtifactPayload>) -> Self {
        self.artifacts.lock().insert(VideoId::new(id), payload);
        self
    }

    pub fn push_create(&self, response: Result<VideoJob>) {
        self.creates.lock().push_back(response);
    }

    pub fn create_calls(&self) -> usize {
        self.calls.lock().creates.len()
    }

    pub fn last_create(&self) -> Option<CreateRequest> {
        self.calls.lock().creates.last().cloned()
    }

    pub fn status_calls(&self) -> usize {
        self.calls.lock().statuses.len()
    }

    pub fn status_calls_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .statuses
            .iter()
            .filter(|v| v.as_str() == id)
            .count()
    }

    pub fn artifact_calls(&self) -> usize {
        self.calls.lock().artifacts.len()
    }

    /// Credentials seen so far, in call order
    pub fn credentials(&self) -> Vec<String> {
        self.calls.lock().credentials.clone()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl VideoApi for ScriptedVideoApi {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_generation(&self, credential: &str, request: &CreateRequest) -> Result<VideoJob> {
        {
            let mut calls = self.calls.lock();
            calls.creates.push(request.clone());
            calls.credentials.push(credential.to_string());
        }
        self.delay().await;
        self.creates
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::transport("no scripted create response")))
    }

    async fn fetch_status(&self, credential: &str, id: &VideoId) -> Result<StatusReport> {
        {
            let mut calls = self.calls.lock();
            calls.statuses.push(id.clone());
            calls.credentials.push(credential.to_string());
        }
        self.delay().await;
        let mut statuses = self.statuses.lock();
        let script = statuses.get_mut(id).ok_or_else(|| ApiError::Validation {
            status: Some(404),
            message: format!("No video found with id '{id}'"),
            code: None,
        })?;
        match script.len() {
            0 => Err(ApiError::transport("empty status script")),
            1 => script
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ApiError::transport("empty status script"))),
            _ => script
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::transport("empty status script"))),
        }
    }

    async fn fetch_artifact(&self, credential: &str, id: &VideoId) -> Result<ArtifactPayload> {
        {
            let mut calls = self.calls.lock();
            calls.artifacts.push(id.clone());
            calls.credentials.push(credential.to_string());
        }
        self.delay().await;
        self.artifacts
            .lock()
            .get(id)
            .cloned()
            .unwrap_or_else(|| Ok(ArtifactPayload::new(b"mock-video".to_vec(), "video/mp4")))
    }
}
