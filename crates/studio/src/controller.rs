//! Generation lifecycle: submit, poll, fetch, reset.
//!
//! One controller owns one [`GenerationState`]. Every transition happens under
//! the state mutex and is published on a `watch` channel. Polling runs as a
//! single spawned task per accepted generation, tagged with the state epoch;
//! canceling bumps the epoch and drops the task's cancel sender, and any result
//! that arrives for an old epoch is discarded.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

use reference_image::{ReferenceImage, SourceImage};
use video_api::{
    ApiError, ArtifactPayload, CreateRequest, GenerationOptions, OpenAiVideoClient, RemoteStatus,
    StatusReport, VideoApi, VideoId,
};

use crate::artifacts::{ArtifactHandle, ArtifactStore, MemoryArtifactStore};
use crate::config::StudioConfig;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::download::{ArtifactSaver, DirectorySaver};
use crate::error::{Result, StudioError};
use crate::notify::{Notice, NotificationSink, TracingSink};
use crate::prompt::validate_prompt;
use crate::state::{FormState, GenerationState, GenerationStatus};

/// What to do with a held reference image when the video size changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Drop the reference and tell the user to attach it again
    #[default]
    Clear,
    /// Re-encode the reference from its original upload for the new size
    Reencode,
}

pub struct ControllerBuilder {
    api: Arc<dyn VideoApi>,
    credentials: Arc<dyn CredentialStore>,
    artifacts: Arc<dyn ArtifactStore>,
    saver: Arc<dyn ArtifactSaver>,
    notifier: Arc<dyn NotificationSink>,
    poll_interval: Duration,
}

impl ControllerBuilder {
    pub fn new(api: Arc<dyn VideoApi>, credentials: Arc<dyn CredentialStore>) -> Self {
        let config = StudioConfig::default();
        Self {
            api,
            credentials,
            artifacts: Arc::new(MemoryArtifactStore::new()),
            saver: Arc::new(DirectorySaver::new(config.download_dir())),
            notifier: Arc::new(TracingSink),
            poll_interval: config.poll_interval(),
        }
    }

    /// Wire up the HTTP client and file-backed stores described by `config`
    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        let api = OpenAiVideoClient::new(config.api.clone())?;
        let credentials = FileCredentialStore::new(config.credentials_path());
        Ok(Self::new(Arc::new(api), Arc::new(credentials))
            .with_saver(Arc::new(DirectorySaver::new(config.download_dir())))
            .with_poll_interval(config.poll_interval()))
    }

    pub fn with_artifact_store(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_saver(mut self, saver: Arc<dyn ArtifactSaver>) -> Self {
        self.saver = saver;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn build(self) -> GenerationController {
        let (updates, _) = watch::channel(GenerationState::default());
        GenerationController {
            inner: Arc::new(Inner {
                api: self.api,
                credentials: self.credentials,
                artifacts: self.artifacts,
                saver: self.saver,
                notifier: self.notifier,
                poll_interval: self.poll_interval,
                state: Mutex::new(ControllerState::default()),
                updates,
            }),
        }
    }
}

/// Cheap to clone; all clones drive the same generation
#[derive(Clone)]
pub struct GenerationController {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn VideoApi>,
    credentials: Arc<dyn CredentialStore>,
    artifacts: Arc<dyn ArtifactStore>,
    saver: Arc<dyn ArtifactSaver>,
    notifier: Arc<dyn NotificationSink>,
    poll_interval: Duration,
    state: Mutex<ControllerState>,
    updates: watch::Sender<GenerationState>,
}

#[derive(Default)]
struct ControllerState {
    generation: GenerationState,
    poll: Option<PollHandle>,
}

/// Dropping the handle wakes a sleeping poll task and ends it
struct PollHandle {
    epoch: u64,
    _cancel: oneshot::Sender<()>,
}

/// Outcome of applying one status report
enum Tick {
    Continue,
    FetchArtifact,
    Stop,
}

impl GenerationController {
    pub fn builder(api: Arc<dyn VideoApi>, credentials: Arc<dyn CredentialStore>) -> ControllerBuilder {
        ControllerBuilder::new(api, credentials)
    }

    /// Validate inputs, cancel whatever is running and create a new generation.
    ///
    /// `reference` is re-encoded when it was prepared for a different size than
    /// `options.size`. Returns [`StudioError::Superseded`] if a newer submit or
    /// reset happened while the create call was in flight.
    pub async fn submit(
        &self,
        prompt: &str,
        options: GenerationOptions,
        reference: Option<ReferenceImage>,
    ) -> Result<VideoId> {
        let inner = &self.inner;
        let (prompt, credential, reference) = match inner.prepare(prompt, options, reference.clone()) {
            Ok(prepared) => prepared,
            Err(err) => {
                inner.reject(prompt, options, reference, &err);
                return Err(err);
            }
        };

        let mut request = CreateRequest::new(prompt.clone(), options);
        if let Some(reference) = &reference {
            request = request.with_reference(reference.encoded().to_payload());
        }

        let epoch = {
            let mut state = inner.state.lock();
            let epoch = inner.cancel_lifecycle(&mut state);
            state.generation = GenerationState {
                prompt,
                options,
                form: FormState {
                    options,
                    reference: reference.clone(),
                },
                reference,
                epoch,
                ..Default::default()
            };
            inner.publish(&state);
            epoch
        };

        tracing::info!(
            target: "studio::controller",
            "submitting {} {} {}s generation (reference: {})",
            options.model,
            options.size,
            options.seconds.as_secs(),
            request.reference.is_some()
        );
        let result = inner.api.create_generation(&credential, &request).await;

        let mut state = inner.state.lock();
        if state.generation.epoch != epoch {
            tracing::debug!(target: "studio::controller", "create response for epoch {epoch} discarded");
            return Err(StudioError::Superseded);
        }

        match result {
            Ok(job) => {
                let id = job.id.clone();
                let (cancel_tx, cancel_rx) = oneshot::channel();
                let generation = &mut state.generation;
                generation.id = Some(id.clone());
                generation.status = GenerationStatus::pending(job.status);
                generation.progress = job.progress.unwrap_or(0).min(100);
                state.poll = Some(PollHandle {
                    epoch,
                    _cancel: cancel_tx,
                });
                inner.publish(&state);
                drop(state);

                tracing::info!(target: "studio::controller", "generation {id} accepted ({})", job.status);
                tokio::spawn(poll_loop(
                    Arc::downgrade(&self.inner),
                    id.clone(),
                    epoch,
                    credential,
                    cancel_rx,
                ));
                inner.notifier.notify(Notice::info("Video generation started"));
                Ok(id)
            }
            Err(err) => {
                let err = StudioError::from(err);
                inner.fail(&mut state, &err);
                drop(state);
                inner.notifier.notify(Notice::error(&err));
                Err(err)
            }
        }
    }

    /// Save the finished video through the configured saver
    pub fn download(&self) -> Result<PathBuf> {
        let handle = self
            .inner
            .state
            .lock()
            .generation
            .artifact
            .clone()
            .ok_or(StudioError::NoArtifact)?;
        let saved = self
            .inner
            .artifacts
            .read(&handle)
            .and_then(|bytes| self.inner.saver.save(&handle, &bytes));
        match saved {
            Ok(path) => {
                self.inner
                    .notifier
                    .notify(Notice::success(format!("Saved to {}", path.display())));
                Ok(path)
            }
            Err(err) => {
                self.inner.notifier.notify(Notice::error(&err));
                Err(err)
            }
        }
    }

    /// Cancel polling, release the artifact and go back to an empty form
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        let epoch = self.inner.cancel_lifecycle(&mut state);
        state.generation = GenerationState {
            epoch,
            ..Default::default()
        };
        self.inner.publish(&state);
    }

    /// Teardown: stop polling and release the artifact
    pub fn dispose(&self) {
        self.reset();
        tracing::debug!(target: "studio::controller", "controller disposed");
    }

    /// Change the form options, clearing an attached reference if the size changed.
    ///
    /// Only the form is touched; a running generation keeps the inputs it was
    /// submitted with.
    pub fn update_options(&self, options: GenerationOptions) {
        self.set_options_clearing_reference(options);
    }

    pub fn update_options_with(&self, options: GenerationOptions, policy: ReferencePolicy) -> Result<()> {
        let inner = &self.inner;
        if policy == ReferencePolicy::Clear {
            self.set_options_clearing_reference(options);
            return Ok(());
        }

        let stale = inner
            .state
            .lock()
            .generation
            .form
            .reference
            .clone()
            .filter(|r| !r.matches(options.size));
        let Some(stale) = stale else {
            let mut state = inner.state.lock();
            state.generation.form.options = options;
            inner.publish(&state);
            return Ok(());
        };

        let reencoded = match stale.reencode(options.size) {
            Ok(reencoded) => reencoded,
            Err(err) => {
                let err = StudioError::from(err);
                inner.notifier.notify(Notice::error(&err));
                return Err(err);
            }
        };
        let advisory = reencoded.encoded().advisory();

        {
            let mut state = inner.state.lock();
            let form = &mut state.generation.form;
            form.options = options;
            if form.reference.as_ref() == Some(&stale) {
                form.reference = Some(reencoded);
            }
            inner.publish(&state);
        }

        if let Some(advisory) = advisory {
            inner.notifier.notify(Notice::warning(advisory.message()));
        }
        Ok(())
    }

    fn set_options_clearing_reference(&self, options: GenerationOptions) {
        let cleared = {
            let mut state = self.inner.state.lock();
            let form = &mut state.generation.form;
            let cleared = form
                .reference
                .as_ref()
                .is_some_and(|r| !r.matches(options.size));
            if cleared {
                form.reference = None;
            }
            form.options = options;
            self.inner.publish(&state);
            cleared
        };
        if cleared {
            self.inner.notifier.notify(Notice::warning(format!(
                "Reference image removed because the video size changed to {}. Attach it again to use it.",
                options.size
            )));
        }
    }

    /// Encode `source` for the form's size and attach it to the form
    pub fn attach_reference(&self, source: SourceImage) -> Result<ReferenceImage> {
        let size = self.inner.state.lock().generation.form.options.size;
        let reference = match ReferenceImage::prepare(source, size) {
            Ok(reference) => reference,
            Err(err) => {
                let err = StudioError::from(err);
                self.inner.notifier.notify(Notice::error(&err));
                return Err(err);
            }
        };

        {
            let mut state = self.inner.state.lock();
            state.generation.form.reference = Some(reference.clone());
            self.inner.publish(&state);
        }
        if let Some(advisory) = reference.encoded().advisory() {
            self.inner.notifier.notify(Notice::warning(advisory.message()));
        }
        Ok(reference)
    }

    pub fn clear_reference(&self) {
        let mut state = self.inner.state.lock();
        if state.generation.form.reference.take().is_some() {
            self.inner.publish(&state);
        }
    }

    pub fn save_credential(&self, secret: &str) -> Result<()> {
        if secret.trim().is_empty() {
            return Err(StudioError::validation("API key cannot be empty"));
        }
        self.inner
            .credentials
            .set(secret)
            .map_err(|e| StudioError::storage(format!("could not save API key: {e:#}")))?;
        self.inner.notifier.notify(Notice::success("API key saved"));
        Ok(())
    }

    pub fn clear_credential(&self) -> Result<()> {
        self.inner
            .credentials
            .clear()
            .map_err(|e| StudioError::storage(format!("could not remove API key: {e:#}")))
    }

    pub fn has_credential(&self) -> bool {
        match self.inner.credentials.get() {
            Ok(secret) => secret.is_some(),
            Err(e) => {
                tracing::warn!(target: "studio::controller", "failed to read credentials: {e:#}");
                false
            }
        }
    }

    pub fn snapshot(&self) -> GenerationState {
        self.inner.state.lock().generation.clone()
    }

    /// Receiver that sees every published state
    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.inner.updates.subscribe()
    }

    /// Wait until nothing is being polled and return that state
    pub async fn settled(&self) -> GenerationState {
        let mut updates = self.inner.updates.subscribe();
        let settled = updates
            .wait_for(|state| !state.status.is_active())
            .await
            .map(|state| state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.snapshot(),
        }
    }
}

impl Inner {
    fn prepare(
        &self,
        prompt: &str,
        options: GenerationOptions,
        reference: Option<ReferenceImage>,
    ) -> Result<(String, String, Option<ReferenceImage>)> {
        let prompt = validate_prompt(prompt)?;
        let credential = self
            .credentials
            .get()
            .map_err(|e| StudioError::storage(format!("could not read API key: {e:#}")))?
            .ok_or(StudioError::NoCredential)?;
        let reference = reference
            .map(|r| r.for_size(options.size))
            .transpose()?;
        Ok((prompt, credential, reference))
    }

    /// Record a submit that never reached the remote
    fn reject(
        &self,
        prompt: &str,
        options: GenerationOptions,
        reference: Option<ReferenceImage>,
        err: &StudioError,
    ) {
        tracing::warn!(target: "studio::controller", "submit rejected: {err}");
        {
            let mut state = self.state.lock();
            if !state.generation.is_idle() {
                let form = state.generation.form.clone();
                let epoch = self.cancel_lifecycle(&mut state);
                state.generation = GenerationState {
                    status: GenerationStatus::Failed,
                    prompt: prompt.trim().to_string(),
                    options,
                    reference,
                    form,
                    error: Some(err.report()),
                    epoch,
                    ..Default::default()
                };
                self.publish(&state);
            }
        }
        self.notifier.notify(Notice::error(err));
    }

    /// Stop polling, release the artifact and start a new epoch
    fn cancel_lifecycle(&self, state: &mut ControllerState) -> u64 {
        if let Some(poll) = state.poll.take() {
            tracing::debug!(target: "studio::controller", "canceling poll for epoch {}", poll.epoch);
        }
        if let Some(handle) = state.generation.artifact.take() {
            self.artifacts.release(&handle);
        }
        state.generation.epoch += 1;
        state.generation.epoch
    }

    fn fail(&self, state: &mut ControllerState, err: &StudioError) {
        tracing::warn!(target: "studio::controller", "generation failed: {err}");
        state.poll = None;
        if let Some(handle) = state.generation.artifact.take() {
            self.artifacts.release(&handle);
        }
        state.generation.status = GenerationStatus::Failed;
        state.generation.error = Some(err.report());
        self.publish(state);
    }

    fn publish(&self, state: &ControllerState) {
        self.updates.send_replace(state.generation.clone());
    }

    fn apply_status(&self, epoch: u64, id: &VideoId, result: std::result::Result<StatusReport, ApiError>) -> Tick {
        let mut state = self.state.lock();
        if state.generation.epoch != epoch {
            tracing::debug!(target: "studio::controller", "status for {id} discarded, epoch {epoch} is stale");
            return Tick::Stop;
        }

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                let err = StudioError::from(err);
                self.fail(&mut state, &err);
                drop(state);
                self.notifier.notify(Notice::error(&err));
                return Tick::Stop;
            }
        };

        tracing::debug!(target: "studio::controller", "{id}: {} {}%", report.status, report.progress);
        match report.status {
            RemoteStatus::Failed => {
                let err = StudioError::GenerationFailed {
                    message: report.failure_message(),
                };
                self.fail(&mut state, &err);
                drop(state);
                self.notifier.notify(Notice::error(&err));
                Tick::Stop
            }
            status => {
                state.generation.status = GenerationStatus::pending(status);
                state.generation.progress = report.progress.min(100);
                self.publish(&state);
                if status == RemoteStatus::Completed {
                    Tick::FetchArtifact
                } else {
                    Tick::Continue
                }
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.lock().generation.epoch == epoch
    }

    /// Publish a materialized artifact, or release it if the generation moved on
    fn apply_artifact(&self, epoch: u64, id: &VideoId, result: Result<ArtifactHandle>) {
        let mut state = self.state.lock();
        if state.generation.epoch != epoch {
            drop(state);
            tracing::debug!(target: "studio::controller", "artifact for {id} discarded, epoch {epoch} is stale");
            if let Ok(handle) = result {
                self.artifacts.release(&handle);
            }
            return;
        }

        match result {
            Ok(handle) => {
                tracing::info!(target: "studio::controller", "{id} ready at {} ({} bytes)", handle.location, handle.len);
                let previous = state.generation.artifact.replace(handle);
                state.poll = None;
                state.generation.status = GenerationStatus::Completed;
                state.generation.progress = 100;
                state.generation.error = None;
                self.publish(&state);
                drop(state);
                if let Some(previous) = previous {
                    self.artifacts.release(&previous);
                }
                self.notifier.notify(Notice::success("Video ready"));
            }
            Err(err) => {
                self.fail(&mut state, &err);
                drop(state);
                self.notifier.notify(Notice::error(&err));
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().generation.artifact.take() {
            self.artifacts.release(&handle);
        }
    }
}

/// First tick right away, then one tick per interval until terminal or canceled
async fn poll_loop(
    inner: Weak<Inner>,
    id: VideoId,
    epoch: u64,
    credential: String,
    mut cancel: oneshot::Receiver<()>,
) {
    let Some((api, interval)) = inner.upgrade().map(|i| (i.api.clone(), i.poll_interval)) else {
        return;
    };

    loop {
        let result = api.fetch_status(&credential, &id).await;
        let tick = match inner.upgrade() {
            Some(controller) => controller.apply_status(epoch, &id, result),
            None => return,
        };

        match tick {
            Tick::Continue => {}
            Tick::Stop => return,
            Tick::FetchArtifact => {
                let fetched = api.fetch_artifact(&credential, &id).await;
                let store = inner
                    .upgrade()
                    .filter(|controller| controller.is_current(epoch))
                    .map(|controller| controller.artifacts.clone());
                let Some(store) = store else {
                    tracing::debug!(target: "studio::controller", "artifact for {id} dropped, generation moved on");
                    return;
                };

                let materialized = match fetched {
                    Ok(payload) => materialize(store.clone(), id.clone(), payload).await,
                    Err(err) => Err(StudioError::from(err)),
                };
                match inner.upgrade() {
                    Some(controller) => controller.apply_artifact(epoch, &id, materialized),
                    None => {
                        if let Ok(handle) = materialized {
                            store.release(&handle);
                        }
                    }
                }
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut cancel => {
                tracing::debug!(target: "studio::controller", "poll for {id} canceled");
                return;
            }
        }
    }
}

/// Hand the payload to the store on the blocking pool
async fn materialize(
    store: Arc<dyn ArtifactStore>,
    id: VideoId,
    payload: ArtifactPayload,
) -> Result<ArtifactHandle> {
    tokio::task::spawn_blocking(move || store.materialize(&id, payload))
        .await
        .unwrap_or_else(|e| Err(StudioError::storage(format!("artifact write task failed: {e}"))))
}
