/// Generation lifecycle tests against the scripted video API.
/// Time is paused, so poll intervals elapse instantly and in order.
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use studio::*;
use tokio::sync::oneshot;
use video_api::{ApiError, ArtifactPayload, RemoteStatus, ScriptedVideoApi, StatusReport, VideoId};

const POLL: Duration = Duration::from_millis(2_000);

struct Harness {
    api: Arc<ScriptedVideoApi>,
    sink: Arc<CollectingSink>,
    store: Arc<MemoryArtifactStore>,
    controller: GenerationController,
    downloads: tempfile::TempDir,
}

impl Harness {
    fn new(api: ScriptedVideoApi) -> Self {
        Self::with_credentials(api, MemoryCredentialStore::with_secret("sk-test"))
    }

    fn with_credentials(api: ScriptedVideoApi, credentials: MemoryCredentialStore) -> Self {
        let api = Arc::new(api);
        let sink = Arc::new(CollectingSink::new());
        let store = Arc::new(MemoryArtifactStore::new());
        let downloads = tempfile::tempdir().unwrap();
        let controller = GenerationController::builder(api.clone(), Arc::new(credentials))
            .with_notifier(sink.clone())
            .with_artifact_store(store.clone())
            .with_saver(Arc::new(DirectorySaver::new(downloads.path().join("saved"))))
            .with_poll_interval(POLL)
            .build();
        Self {
            api,
            sink,
            store,
            controller,
            downloads,
        }
    }
}

fn status(status: RemoteStatus, progress: u8) -> video_api::Result<StatusReport> {
    Ok(StatusReport::new(status, progress))
}

fn png_source(width: u32, height: u32) -> SourceImage {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    SourceImage::new(bytes, "image/png", "ball.png")
}

/// Accepts `id` and completes it on the first poll
fn completes(api: ScriptedVideoApi, id: &str) -> ScriptedVideoApi {
    api.accept(id).statuses(id, [status(RemoteStatus::Completed, 100)])
}

#[tokio::test(start_paused = true)]
async fn test_red_ball_completes_after_three_polls() {
    let api = ScriptedVideoApi::new()
        .accept("video_ball")
        .statuses(
            "video_ball",
            [
                status(RemoteStatus::Queued, 0),
                status(RemoteStatus::InProgress, 45),
                status(RemoteStatus::Completed, 100),
            ],
        )
        .artifact(
            "video_ball",
            Ok(ArtifactPayload::new(b"red-ball-mp4".to_vec(), "video/mp4")),
        );
    let h = Harness::new(api);
    let started = tokio::time::Instant::now();

    let id = h
        .controller
        .submit("a red ball bouncing", GenerationOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(id.as_str(), "video_ball");
    assert_eq!(h.controller.snapshot().status, GenerationStatus::Queued);

    let state = h.controller.settled().await;
    assert_eq!(state.status, GenerationStatus::Completed);
    assert_eq!(state.progress, 100);
    assert_eq!(state.id.as_ref().map(|id| id.as_str()), Some("video_ball"));
    assert_eq!(state.prompt, "a red ball bouncing");
    assert!(state.error.is_none());

    let handle = state.artifact.expect("artifact handle");
    assert_eq!(handle.video_id.as_str(), "video_ball");
    assert_eq!(handle.len, b"red-ball-mp4".len());

    assert_eq!(h.api.create_calls(), 1);
    assert_eq!(h.api.status_calls(), 3);
    assert_eq!(h.api.artifact_calls(), 1);
    assert_eq!(h.store.live_count(), 1);
    assert!(h.api.credentials().iter().all(|c| c == "sk-test"));

    // First tick is immediate, the next two wait one interval each
    let elapsed = started.elapsed();
    assert!(elapsed >= POLL * 2 && elapsed < POLL * 3, "elapsed {elapsed:?}");

    let levels: Vec<_> = h.sink.notices().into_iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Success]);
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_reported_as_received() {
    let api = ScriptedVideoApi::new().accept("video_p").statuses(
        "video_p",
        [
            status(RemoteStatus::InProgress, 60),
            status(RemoteStatus::InProgress, 40),
            status(RemoteStatus::Completed, 100),
        ],
    );
    let h = Harness::new(api);
    let mut updates = h.controller.subscribe();

    h.controller
        .submit("waves", GenerationOptions::default(), None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.controller.snapshot().progress, 60);
    tokio::time::sleep(POLL).await;
    let state = h.controller.snapshot();
    assert_eq!(state.status, GenerationStatus::InProgress);
    assert_eq!(state.progress, 40);

    h.controller.settled().await;
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().status, GenerationStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_resubmit_cancels_previous_polling() {
    let api = ScriptedVideoApi::new()
        .accept("video_a")
        .statuses("video_a", [status(RemoteStatus::InProgress, 30)])
        .accept("video_b")
        .statuses(
            "video_b",
            [status(RemoteStatus::Queued, 0), status(RemoteStatus::Completed, 100)],
        );
    let h = Harness::new(api);

    h.controller
        .submit("first idea", GenerationOptions::default(), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(h.api.status_calls_for("video_a"), 3);
    assert_eq!(h.controller.snapshot().status, GenerationStatus::InProgress);

    h.controller
        .submit("second idea", GenerationOptions::default(), None)
        .await
        .unwrap();
    let a_calls = h.api.status_calls_for("video_a");

    let state = h.controller.settled().await;
    tokio::time::sleep(POLL * 5).await;

    assert_eq!(h.api.status_calls_for("video_a"), a_calls);
    assert_eq!(state.status, GenerationStatus::Completed);
    assert_eq!(state.id.as_ref().map(|id| id.as_str()), Some("video_b"));
    assert_eq!(state.prompt, "second idea");

    let after = h.controller.snapshot();
    assert_eq!(after.id, state.id);
    assert_eq!(after.status, GenerationStatus::Completed);
    assert_eq!(h.api.artifact_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_status_for_old_generation_is_discarded() {
    let api = completes(
        completes(
            ScriptedVideoApi::new().with_latency(Duration::from_millis(500)),
            "video_a",
        ),
        "video_b",
    );
    let h = Harness::new(api);

    h.controller
        .submit("slow network", GenerationOptions::default(), None)
        .await
        .unwrap();
    // The first status request for video_a goes out while this create is pending
    h.controller
        .submit("slow network again", GenerationOptions::default(), None)
        .await
        .unwrap();

    let state = h.controller.settled().await;
    assert_eq!(state.id.as_ref().map(|id| id.as_str()), Some("video_b"));
    assert_eq!(state.status, GenerationStatus::Completed);
    assert_eq!(h.api.status_calls_for("video_a"), 1);
    assert_eq!(h.api.artifact_calls(), 1);
    assert_eq!(h.store.live_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_download_without_artifact() {
    let h = Harness::new(ScriptedVideoApi::new());

    let err = h.controller.download().unwrap_err();
    assert!(matches!(err, StudioError::NoArtifact));
    assert_eq!(err.kind(), ErrorKind::NoArtifact);
    assert!(!h.downloads.path().join("saved").exists());
    assert!(h.sink.notices().is_empty());
    assert_eq!(h.controller.snapshot(), GenerationState::default());
}

#[tokio::test(start_paused = true)]
async fn test_download_saves_artifact_bytes() {
    let api = completes(ScriptedVideoApi::new(), "video_dl").artifact(
        "video_dl",
        Ok(ArtifactPayload::new(vec![0, 0, 0, 24, 102, 116, 121, 112], "video/mp4")),
    );
    let h = Harness::new(api);

    h.controller
        .submit("sunrise timelapse", GenerationOptions::default(), None)
        .await
        .unwrap();
    h.controller.settled().await;

    let path = h.controller.download().unwrap();
    assert_eq!(path.file_name().unwrap(), "video-video_dl.mp4");
    assert_eq!(std::fs::read(&path).unwrap(), vec![0, 0, 0, 24, 102, 116, 121, 112]);

    let last = h.sink.last().unwrap();
    assert_eq!(last.level, NoticeLevel::Success);
    assert!(last.message.starts_with("Saved to"));

    // Downloading does not consume the artifact
    assert!(h.controller.snapshot().has_artifact());
    assert_eq!(h.store.live_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_generations_keep_one_live_artifact() {
    let api = (0..5).fold(ScriptedVideoApi::new(), |api, i| {
        completes(api, &format!("video_{i}"))
    });
    let h = Harness::new(api);

    for i in 0..5 {
        h.controller
            .submit(&format!("take {i}"), GenerationOptions::default(), None)
            .await
            .unwrap();
        assert!(h.store.live_count() <= 1);

        let state = h.controller.settled().await;
        let handle = state.artifact.expect("artifact handle");
        assert_eq!(handle.video_id.as_str(), format!("video_{i}"));
        assert_eq!(h.store.live_count(), 1);
    }

    let epoch = h.controller.snapshot().epoch;
    h.controller.reset();
    let state = h.controller.snapshot();
    assert_eq!(h.store.live_count(), 0);
    assert!(state.is_idle());
    assert!(state.prompt.is_empty());
    assert!(state.epoch > epoch);
}

#[tokio::test(start_paused = true)]
async fn test_size_change_clears_reference_once() {
    let h = Harness::new(ScriptedVideoApi::new());

    let reference = h.controller.attach_reference(png_source(640, 480)).unwrap();
    assert_eq!(reference.encoded().dimensions(), (1280, 720));
    assert!(h.controller.snapshot().form.reference.is_some());
    assert_eq!(h.sink.count(NoticeLevel::Warning), 0);

    h.controller
        .update_options(GenerationOptions::default().with_size(VideoSize::Portrait720));
    let state = h.controller.snapshot();
    assert!(state.form.reference.is_none());
    assert_eq!(state.form.options.size, VideoSize::Portrait720);
    assert_eq!(h.sink.count(NoticeLevel::Warning), 1);

    // Nothing left to clear
    h.controller
        .update_options(GenerationOptions::default().with_size(VideoSize::Landscape720));
    assert_eq!(h.sink.count(NoticeLevel::Warning), 1);
}

#[tokio::test(start_paused = true)]
async fn test_options_change_without_size_change_keeps_reference() {
    let h = Harness::new(ScriptedVideoApi::new());
    h.controller.attach_reference(png_source(1280, 720)).unwrap();

    h.controller.update_options(
        GenerationOptions::default()
            .with_seconds(VideoSeconds::Eight)
            .with_model(VideoModel::Pro),
    );

    let state = h.controller.snapshot();
    assert!(state.form.reference.is_some());
    assert_eq!(state.form.options.seconds, VideoSeconds::Eight);
    assert_eq!(state.form.options.model, VideoModel::Pro);
    assert!(h.sink.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reencode_policy_keeps_reference() {
    let h = Harness::new(ScriptedVideoApi::new());
    h.controller.attach_reference(png_source(1280, 960)).unwrap();

    h.controller
        .update_options_with(
            GenerationOptions::default().with_size(VideoSize::Portrait1024),
            ReferencePolicy::Reencode,
        )
        .unwrap();

    let state = h.controller.snapshot();
    let reference = state.form.reference.expect("reference kept");
    assert_eq!(reference.encoded().dimensions(), (1024, 1792));
    assert_eq!(reference.source().len(), png_source(1280, 960).len());
    assert_eq!(h.sink.count(NoticeLevel::Warning), 0);
}

#[tokio::test(start_paused = true)]
async fn test_small_reference_warns() {
    let h = Harness::new(ScriptedVideoApi::new());

    let reference = h.controller.attach_reference(png_source(320, 180)).unwrap();
    assert!(reference.encoded().advisory().is_some());
    assert_eq!(h.sink.count(NoticeLevel::Warning), 1);

    h.controller.clear_reference();
    assert!(h.controller.snapshot().form.reference.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reference_is_sent_at_requested_size() {
    let h = Harness::new(completes(ScriptedVideoApi::new(), "video_ref"));
    let reference = h.controller.attach_reference(png_source(800, 600)).unwrap();
    assert_eq!(reference.encoded().dimensions(), (1280, 720));

    let options = GenerationOptions::default().with_size(VideoSize::Portrait720);
    h.controller
        .submit("the ball rolls off a table", options, Some(reference))
        .await
        .unwrap();

    let request = h.api.last_create().unwrap();
    assert_eq!(request.options.size, VideoSize::Portrait720);
    let payload = request.reference.expect("reference payload");
    assert_eq!(payload.mime_type, "image/png");
    let decoded = image::load_from_memory(&payload.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (720, 1280));

    let state = h.controller.settled().await;
    assert_eq!(state.status, GenerationStatus::Completed);
    let held = state.reference.expect("reference held");
    assert!(held.matches(VideoSize::Portrait720));
    assert_eq!(state.form.reference.as_ref(), Some(&held));
    assert_eq!(state.form.options, options);
}

#[tokio::test(start_paused = true)]
async fn test_status_auth_error_stops_polling() {
    let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
    let api = ScriptedVideoApi::new()
        .accept("video_401")
        .statuses("video_401", [Err(ApiError::from_response(401, body))]);
    let h = Harness::new(api);

    h.controller
        .submit("a red ball bouncing", GenerationOptions::default(), None)
        .await
        .unwrap();
    let state = h.controller.settled().await;

    assert_eq!(state.status, GenerationStatus::Failed);
    let report = state.error.expect("error report");
    assert_eq!(report.kind, ErrorKind::Auth);
    assert_eq!(report.status, Some(401));
    assert!(report.message.contains("Incorrect API key"));
    assert!(state.artifact.is_none());

    tokio::time::sleep(POLL * 5).await;
    assert_eq!(h.api.status_calls(), 1);
    assert_eq!(h.api.artifact_calls(), 0);

    let last = h.sink.last().unwrap();
    assert_eq!(last.level, NoticeLevel::Error);
    assert!(last.hint.unwrap().contains("API key"));
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_is_surfaced() {
    let api = ScriptedVideoApi::new().accept("video_f").statuses(
        "video_f",
        [
            status(RemoteStatus::InProgress, 10),
            Ok(StatusReport::failed("Content policy violation")),
        ],
    );
    let h = Harness::new(api);

    h.controller
        .submit("something forbidden", GenerationOptions::default(), None)
        .await
        .unwrap();
    let state = h.controller.settled().await;

    assert_eq!(state.status, GenerationStatus::Failed);
    let report = state.error.unwrap();
    assert_eq!(report.kind, ErrorKind::GenerationFailed);
    assert_eq!(report.message, "Content policy violation");
    assert_eq!(h.api.status_calls(), 2);
    assert_eq!(h.api.artifact_calls(), 0);
    assert_eq!(h.sink.count(NoticeLevel::Error), 1);
}

#[tokio::test(start_paused = true)]
async fn test_artifact_fetch_failure() {
    let api = completes(ScriptedVideoApi::new(), "video_x")
        .artifact("video_x", Err(ApiError::from_response(502, "Bad gateway")));
    let h = Harness::new(api);

    h.controller
        .submit("storm over the sea", GenerationOptions::default(), None)
        .await
        .unwrap();
    let state = h.controller.settled().await;

    assert_eq!(state.status, GenerationStatus::Failed);
    assert_eq!(state.error.unwrap().kind, ErrorKind::Server);
    assert!(state.artifact.is_none());
    assert_eq!(h.store.live_count(), 0);
    assert!(matches!(h.controller.download(), Err(StudioError::NoArtifact)));
}

#[tokio::test(start_paused = true)]
async fn test_create_rejected_by_quota() {
    let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
    let api = ScriptedVideoApi::new().reject(ApiError::from_response(429, body));
    let h = Harness::new(api);

    let err = h
        .controller
        .submit("a red ball bouncing", GenerationOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Quota);

    let state = h.controller.snapshot();
    assert_eq!(state.status, GenerationStatus::Failed);
    assert!(state.id.is_none());
    assert_eq!(state.error.unwrap().kind, ErrorKind::Quota);
    assert_eq!(h.api.status_calls(), 0);

    let last = h.sink.last().unwrap();
    assert_eq!(last.message, "You exceeded your current quota");
    assert!(last.hint.unwrap().contains("limit"));
}

#[tokio::test(start_paused = true)]
async fn test_local_rejections_leave_idle_state() {
    let h = Harness::with_credentials(ScriptedVideoApi::new(), MemoryCredentialStore::new());

    let err = h
        .controller
        .submit("a red ball bouncing", GenerationOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::NoCredential));
    assert!(h.sink.last().unwrap().hint.unwrap().contains("Settings"));

    h.controller.save_credential("sk-live").unwrap();
    let empty = h
        .controller
        .submit("   ", GenerationOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::Validation);

    let long = "x".repeat(MAX_PROMPT_CHARS + 1);
    let too_long = h
        .controller
        .submit(&long, GenerationOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(too_long.kind(), ErrorKind::Validation);

    assert_eq!(h.controller.snapshot(), GenerationState::default());
    assert_eq!(h.api.create_calls(), 0);
    assert_eq!(h.sink.count(NoticeLevel::Error), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submit_after_completion_fails() {
    let h = Harness::new(completes(ScriptedVideoApi::new(), "video_done"));
    h.controller
        .submit("a red ball bouncing", GenerationOptions::default(), None)
        .await
        .unwrap();
    h.controller.settled().await;
    assert_eq!(h.store.live_count(), 1);

    let err = h
        .controller
        .submit("", GenerationOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let state = h.controller.snapshot();
    assert_eq!(state.status, GenerationStatus::Failed);
    assert!(state.id.is_none());
    assert!(state.artifact.is_none());
    assert_eq!(state.error.unwrap().kind, ErrorKind::Validation);
    assert_eq!(h.store.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_stops_polling() {
    let api = ScriptedVideoApi::new()
        .accept("video_slow")
        .statuses("video_slow", [status(RemoteStatus::Queued, 0)]);
    let h = Harness::new(api);

    h.controller
        .submit("a very long render", GenerationOptions::default(), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(h.api.status_calls(), 2);

    h.controller.dispose();
    tokio::time::sleep(POLL * 10).await;

    assert_eq!(h.api.status_calls(), 2);
    assert!(h.controller.snapshot().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_controller_releases_artifact() {
    let h = Harness::new(completes(ScriptedVideoApi::new(), "video_drop"));
    h.controller
        .submit("falling leaves", GenerationOptions::default(), None)
        .await
        .unwrap();
    h.controller.settled().await;
    assert_eq!(h.store.live_count(), 1);

    let Harness {
        controller, store, ..
    } = h;
    drop(controller);
    assert_eq!(store.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_credential_management() {
    let h = Harness::with_credentials(ScriptedVideoApi::new(), MemoryCredentialStore::new());
    assert!(!h.controller.has_credential());

    let err = h.controller.save_credential("  ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    h.controller.save_credential("sk-new").unwrap();
    assert!(h.controller.has_credential());

    h.controller.clear_credential().unwrap();
    assert!(!h.controller.has_credential());
}

#[tokio::test(start_paused = true)]
async fn test_builder_from_config() {
    let data = tempfile::tempdir().unwrap();
    let config = StudioConfig::default()
        .with_data_dir(data.path().to_path_buf())
        .with_download_dir(data.path().join("downloads"))
        .with_poll_interval(Duration::from_millis(500));

    let controller = ControllerBuilder::from_config(&config).unwrap().build();
    assert!(!controller.has_credential());
    assert!(controller.snapshot().is_idle());

    controller.save_credential("sk-file").unwrap();
    assert!(controller.has_credential());
    assert!(config.credentials_path().exists());

    let store = FileCredentialStore::new(config.credentials_path());
    assert_eq!(store.get().unwrap().as_deref(), Some("sk-file"));
}

#[tokio::test(start_paused = true)]
async fn test_options_edited_mid_generation_stay_in_form() {
    let api = ScriptedVideoApi::new().accept("video_mid").statuses(
        "video_mid",
        [
            status(RemoteStatus::InProgress, 20),
            status(RemoteStatus::InProgress, 70),
            status(RemoteStatus::Completed, 100),
        ],
    );
    let h = Harness::new(api);
    h.controller.attach_reference(png_source(1280, 720)).unwrap();
    let submitted = h.controller.snapshot().form.reference;

    h.controller
        .submit("a kite over the dunes", GenerationOptions::default(), submitted.clone())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.controller.snapshot().status, GenerationStatus::InProgress);

    let edited = GenerationOptions::default()
        .with_size(VideoSize::Portrait1024)
        .with_model(VideoModel::Pro);
    h.controller.update_options(edited);

    let state = h.controller.snapshot();
    assert_eq!(state.status, GenerationStatus::InProgress);
    assert_eq!(state.options, GenerationOptions::default());
    assert_eq!(state.reference, submitted);
    assert_eq!(state.form.options, edited);
    assert!(state.form.reference.is_none());

    let state = h.controller.settled().await;
    assert_eq!(state.status, GenerationStatus::Completed);
    assert_eq!(state.options, GenerationOptions::default());
    assert_eq!(state.form.options, edited);
}

#[tokio::test(start_paused = true)]
async fn test_create_answer_after_reset_is_superseded() {
    let api = ScriptedVideoApi::new()
        .with_latency(Duration::from_millis(500))
        .accept("video_late")
        .statuses("video_late", [status(RemoteStatus::Completed, 100)]);
    let h = Harness::new(api);

    let controller = h.controller.clone();
    let pending = tokio::spawn(async move {
        controller
            .submit("too slow", GenerationOptions::default(), None)
            .await
    });
    tokio::task::yield_now().await;
    assert_eq!(h.api.create_calls(), 1);

    h.controller.reset();
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(StudioError::Superseded)));

    tokio::time::sleep(POLL * 3).await;
    let state = h.controller.snapshot();
    assert!(state.is_idle());
    assert!(state.id.is_none());
    assert_eq!(h.api.status_calls(), 0);
    assert_eq!(h.sink.count(NoticeLevel::Error), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_answer_after_resubmit_is_superseded() {
    let api = completes(
        completes(
            ScriptedVideoApi::new().with_latency(Duration::from_millis(500)),
            "video_old",
        ),
        "video_new",
    );
    let h = Harness::new(api);

    let controller = h.controller.clone();
    let first = tokio::spawn(async move {
        controller
            .submit("first", GenerationOptions::default(), None)
            .await
    });
    tokio::task::yield_now().await;

    let id = h
        .controller
        .submit("second", GenerationOptions::default(), None)
        .await
        .unwrap();
    assert!(matches!(first.await.unwrap(), Err(StudioError::Superseded)));

    let state = h.controller.settled().await;
    assert_eq!(state.id, Some(id.clone()));
    assert_eq!(state.prompt, "second");
    assert_eq!(h.api.status_calls(), 1);
    assert_eq!(h.api.status_calls_for(id.as_str()), 1);
}

/// Memory store whose `materialize` blocks until the test opens the gate
struct GatedStore {
    memory: MemoryArtifactStore,
    entered: Mutex<Option<oneshot::Sender<()>>>,
    gate: Mutex<mpsc::Receiver<()>>,
    released: Mutex<Option<oneshot::Sender<()>>>,
}

impl ArtifactStore for GatedStore {
    fn materialize(&self, video_id: &VideoId, payload: ArtifactPayload) -> studio::Result<ArtifactHandle> {
        let handle = self.memory.materialize(video_id, payload)?;
        if let Some(entered) = self.entered.lock().take() {
            let _ = entered.send(());
        }
        let _ = self.gate.lock().recv();
        Ok(handle)
    }

    fn read(&self, handle: &ArtifactHandle) -> studio::Result<Arc<[u8]>> {
        self.memory.read(handle)
    }

    fn release(&self, handle: &ArtifactHandle) -> bool {
        let released = self.memory.release(handle);
        if let Some(tx) = self.released.lock().take() {
            let _ = tx.send(());
        }
        released
    }

    fn live_count(&self) -> usize {
        self.memory.live_count()
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_artifact_write_does_not_block_controller() {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (released_tx, released_rx) = oneshot::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let store = Arc::new(GatedStore {
        memory: MemoryArtifactStore::new(),
        entered: Mutex::new(Some(entered_tx)),
        gate: Mutex::new(gate_rx),
        released: Mutex::new(Some(released_tx)),
    });
    let sink = Arc::new(CollectingSink::new());
    let controller = GenerationController::builder(
        Arc::new(completes(ScriptedVideoApi::new(), "video_big")),
        Arc::new(MemoryCredentialStore::with_secret("sk-test")),
    )
    .with_artifact_store(store.clone())
    .with_notifier(sink.clone())
    .build();

    controller
        .submit("a long aerial shot", GenerationOptions::default(), None)
        .await
        .unwrap();
    entered_rx.await.unwrap();

    // The write is still running; state stays readable and resettable
    let state = controller.snapshot();
    assert_eq!(state.status, GenerationStatus::InProgress);
    assert!(state.artifact.is_none());
    controller.reset();

    gate_tx.send(()).unwrap();
    released_rx.await.unwrap();

    assert_eq!(store.live_count(), 0);
    assert!(controller.snapshot().is_idle());
    assert_eq!(sink.count(NoticeLevel::Success), 0);
}
