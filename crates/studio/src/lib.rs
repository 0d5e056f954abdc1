//! Video generation studio.
//!
//! Drives one text/image-to-video generation at a time: validates the form,
//! submits it through [`video_api`], polls until the remote finishes, then keeps
//! the finished video as a local artifact ready to play or save.

pub mod artifacts;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod download;
pub mod error;
pub mod logging;
pub mod notify;
pub mod prompt;
pub mod state;

pub use artifacts::{ArtifactHandle, ArtifactStore, MemoryArtifactStore, TempDirArtifactStore};
pub use config::{app_data_dir, StudioConfig, DEFAULT_POLL_INTERVAL_MS};
pub use controller::{ControllerBuilder, GenerationController, ReferencePolicy};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore, CREDENTIAL_KEY};
pub use download::{ArtifactSaver, DirectorySaver};
pub use error::{ErrorKind, ErrorReport, Result, StudioError};
pub use notify::{CollectingSink, Notice, NoticeLevel, NotificationSink, TracingSink};
pub use prompt::{validate_prompt, MAX_PROMPT_CHARS};
pub use state::{FormState, GenerationState, GenerationStatus};

pub use reference_image::{QualityAdvisory, ReferenceImage, SourceImage};
pub use video_api::{GenerationOptions, VideoModel, VideoSeconds, VideoSize};
