//! Reference image preparation for image-to-video requests.
//!
//! Validates a user supplied image and re-renders it at the exact pixel size
//! the video endpoint requires (cover-fit on an opaque black canvas, PNG).

use thiserror::Error;

pub mod encode;
pub mod reference;
pub mod source;

pub use encode::{encode, encode_to, EncodedImage, QualityAdvisory, LOW_RESOLUTION_RATIO};
pub use reference::ReferenceImage;
pub use source::{SourceImage, ACCEPTED_MIME_TYPES, MAX_SOURCE_BYTES};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("image file is empty")]
    Empty,

    #[error("image is too large ({size} bytes, limit is {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported image type '{mime}', expected PNG, JPEG, WebP or GIF")]
    UnsupportedType { mime: String },

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("could not read image file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EncodeError>;
