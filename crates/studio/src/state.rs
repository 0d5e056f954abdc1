use serde::{Deserialize, Serialize};

use reference_image::ReferenceImage;
use video_api::{GenerationOptions, RemoteStatus, VideoId};

use crate::artifacts::ArtifactHandle;
use crate::error::ErrorReport;

/// Lifecycle of the current generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// Accepted by the remote and still being polled
    pub fn is_active(self) -> bool {
        matches!(self, GenerationStatus::Queued | GenerationStatus::InProgress)
    }

    /// Non-terminal remote status as seen while polling
    pub(crate) fn pending(remote: RemoteStatus) -> Self {
        match remote {
            RemoteStatus::InProgress | RemoteStatus::Completed => GenerationStatus::InProgress,
            RemoteStatus::Queued | RemoteStatus::Failed => GenerationStatus::Queued,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Idle => "idle",
            GenerationStatus::Queued => "queued",
            GenerationStatus::InProgress => "in_progress",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values currently in the form, used by the next submit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub options: GenerationOptions,
    /// Attached reference image, encoded for `options.size` when attached
    pub reference: Option<ReferenceImage>,
}

/// Everything the presentation layer renders.
///
/// `artifact` is only ever set while `status` is `Completed`. `id` is set for
/// every status past submission, except a submission that failed before the
/// remote accepted it. `prompt`, `options` and `reference` are the inputs of
/// the current or last submission and only change on submit or reset; edits
/// made in the meantime live in `form`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationState {
    pub id: Option<VideoId>,
    pub status: GenerationStatus,
    /// Remote progress, 0-100
    pub progress: u8,
    pub artifact: Option<ArtifactHandle>,
    pub prompt: String,
    pub options: GenerationOptions,
    /// Reference image sent with the submission
    pub reference: Option<ReferenceImage>,
    pub form: FormState,
    pub error: Option<ErrorReport>,
    /// Bumped whenever the current lifecycle is canceled
    pub epoch: u64,
}

impl GenerationState {
    pub fn is_idle(&self) -> bool {
        self.status == GenerationStatus::Idle
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }
}
