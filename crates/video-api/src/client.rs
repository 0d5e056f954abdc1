//! reqwest-backed client for the `/v1/videos` endpoints.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use std::time::{Duration, Instant};

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use crate::types::{
    parse_status, parse_video_object, ArtifactPayload, CreateRequest, StatusReport, VideoId, VideoJob,
};
use crate::VideoApi;

const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Video API client
pub struct OpenAiVideoClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl OpenAiVideoClient {
    /// Create new client
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(20));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder, credential: &str) -> reqwest::RequestBuilder {
        let request = request.bearer_auth(credential.trim());
        match self.config.organization.as_deref().map(str::trim) {
            Some(org) if !org.is_empty() => request.header("OpenAI-Organization", org),
            _ => request,
        }
    }

    /// Send and turn any non-2xx status into a typed error
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_response(status.as_u16(), &body);
        tracing::warn!(target: "video_api", "request rejected: {} ({:?})", status, err.kind());
        Err(err)
    }

    fn build_form(request: &CreateRequest) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }
        if let Some(reference) = &request.reference {
            let part = Part::bytes(reference.bytes.clone())
                .file_name(reference.file_name.clone())
                .mime_str(&reference.mime_type)?;
            form = form.part("input_reference", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl VideoApi for OpenAiVideoClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn create_generation(&self, credential: &str, request: &CreateRequest) -> Result<VideoJob> {
        let start = Instant::now();
        tracing::info!(
            target: "video_api",
            "create request: model={}, size={}, seconds={}, reference={}",
            request.options.model,
            request.options.size,
            request.options.seconds,
            request.reference.is_some()
        );

        let builder = self.authorize(self.client.post(self.config.videos_url()), credential);
        let builder = if request.reference.is_some() {
            builder.multipart(Self::build_form(request)?)
        } else {
            builder.json(&request.json_body())
        };

        let response = self.send(builder).await?;
        let body = response.text().await?;
        let job = VideoJob::from(parse_video_object(&body)?);
        tracing::info!(
            target: "video_api",
            "create accepted in {:.2?}: id={}, status={}",
            start.elapsed(),
            job.id,
            job.status
        );
        Ok(job)
    }

    async fn fetch_status(&self, credential: &str, id: &VideoId) -> Result<StatusReport> {
        let builder = self.authorize(self.client.get(self.config.video_url(id.as_str())), credential);
        let response = self.send(builder).await?;
        let body = response.text().await?;
        let report = parse_status(&body)?;
        tracing::debug!(
            target: "video_api",
            "status {}: {} ({}%)",
            id,
            report.status,
            report.progress
        );
        Ok(report)
    }

    async fn fetch_artifact(&self, credential: &str, id: &VideoId) -> Result<ArtifactPayload> {
        let builder = self.authorize(self.client.get(self.config.content_url(id.as_str())), credential);
        let response = self.send(builder).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;
        tracing::info!(target: "video_api", "downloaded {} bytes for {}", bytes.len(), id);
        Ok(ArtifactPayload::new(bytes.to_vec(), content_type))
    }
}
