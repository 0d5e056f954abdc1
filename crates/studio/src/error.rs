use reference_image::EncodeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use video_api::{ApiError, ApiErrorKind};

/// Errors surfaced by the generation controller
#[derive(Debug, Clone, Error)]
pub enum StudioError {
    #[error("No API key is configured")]
    NoCredential,

    /// Bad prompt, image or options, rejected before anything was sent
    #[error("{0}")]
    Validation(String),

    /// Rejected by the remote or failed in transit
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The remote reported the generation as failed
    #[error("{message}")]
    GenerationFailed { message: String },

    #[error("There is no finished video to download")]
    NoArtifact,

    /// A newer submit or reset replaced this generation while it was starting
    #[error("Generation was superseded by a newer request")]
    Superseded,

    /// Local credential, artifact or download IO failed
    #[error("{0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, StudioError>;

/// Error category shown to the user, each with its own remediation hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NoCredential,
    Validation,
    Auth,
    Permission,
    Quota,
    Server,
    Transport,
    GenerationFailed,
    NoArtifact,
    Superseded,
    Storage,
}

impl StudioError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StudioError::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        StudioError::Storage(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StudioError::NoCredential => ErrorKind::NoCredential,
            StudioError::Validation(_) => ErrorKind::Validation,
            StudioError::Api(err) => match err.kind() {
                ApiErrorKind::Auth => ErrorKind::Auth,
                ApiErrorKind::Permission => ErrorKind::Permission,
                ApiErrorKind::Quota => ErrorKind::Quota,
                ApiErrorKind::Validation => ErrorKind::Validation,
                ApiErrorKind::Server => ErrorKind::Server,
                ApiErrorKind::Transport => ErrorKind::Transport,
            },
            StudioError::GenerationFailed { .. } => ErrorKind::GenerationFailed,
            StudioError::NoArtifact => ErrorKind::NoArtifact,
            StudioError::Superseded => ErrorKind::Superseded,
            StudioError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Remediation hint for the user
    pub fn hint(&self) -> &'static str {
        match self {
            StudioError::Api(err) if err.is_verification_required() => {
                "Your organization must be verified before it can use this model. Complete organization verification in the platform settings, then try again."
            }
            _ => self.kind().hint(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            hint: self.hint().to_string(),
            status: match self {
                StudioError::Api(err) => err.status(),
                _ => None,
            },
        }
    }
}

impl ErrorKind {
    pub fn hint(self) -> &'static str {
        match self {
            ErrorKind::NoCredential => "Add your API key in Settings before generating.",
            ErrorKind::Validation => "Check the prompt, reference image and options, then try again.",
            ErrorKind::Auth => "Your API key was rejected. Check that it is correct and still active.",
            ErrorKind::Permission => "Your API key does not have access to this model or feature.",
            ErrorKind::Quota => {
                "You have hit a rate or billing limit. Wait a moment, or check your plan and billing settings."
            }
            ErrorKind::Server => "The video service is having trouble. Try again in a few minutes.",
            ErrorKind::Transport => "Could not reach the video service. Check your network connection.",
            ErrorKind::GenerationFailed => "The video could not be generated. Try rephrasing the prompt.",
            ErrorKind::NoArtifact => "Generate a video before downloading.",
            ErrorKind::Superseded => "A newer request replaced this one.",
            ErrorKind::Storage => "A local file operation failed. Check disk space and permissions.",
        }
    }
}

impl From<EncodeError> for StudioError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Io(io) => StudioError::Storage(format!("could not read image file: {io}")),
            other => StudioError::Validation(other.to_string()),
        }
    }
}

/// Failure recorded in the generation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: String,
    pub status: Option<u16>,
}
