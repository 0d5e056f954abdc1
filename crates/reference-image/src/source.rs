use image::ImageFormat;
use std::path::Path;
use std::sync::Arc;

use crate::{EncodeError, Result};

/// Upload limit for the original file
pub const MAX_SOURCE_BYTES: usize = 10 * 1024 * 1024;

pub const ACCEPTED_MIME_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "image/gif"];

/// Original image as selected by the user.
///
/// Kept alongside the encoded payload so it can be re-encoded for a
/// different target size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    bytes: Arc<[u8]>,
    mime_type: String,
    file_name: String,
}

impl SourceImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into().trim().to_ascii_lowercase(),
            file_name: file_name.into(),
        }
    }

    /// Read a file, inferring the MIME type from its extension or content
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime = mime_from_extension(path)
            .map(str::to_string)
            .or_else(|| {
                image::guess_format(&bytes)
                    .ok()
                    .map(|f| f.to_mime_type().to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(bytes, mime, file_name))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Check size and type limits without decoding
    pub fn validate(&self) -> Result<ImageFormat> {
        if self.is_empty() {
            return Err(EncodeError::Empty);
        }
        if self.len() > MAX_SOURCE_BYTES {
            return Err(EncodeError::TooLarge {
                size: self.len(),
                limit: MAX_SOURCE_BYTES,
            });
        }
        if !ACCEPTED_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return Err(EncodeError::UnsupportedType {
                mime: self.mime_type.clone(),
            });
        }
        ImageFormat::from_mime_type(&self.mime_type).ok_or_else(|| EncodeError::UnsupportedType {
            mime: self.mime_type.clone(),
        })
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_oversized_file() {
        let source = SourceImage::new(vec![0u8; MAX_SOURCE_BYTES + 1], "image/png", "big.png");
        assert!(matches!(
            source.validate(),
            Err(EncodeError::TooLarge { limit, .. }) if limit == MAX_SOURCE_BYTES
        ));
    }

    #[test]
    fn test_rejects_unsupported_type() {
        let source = SourceImage::new(vec![1, 2, 3], "image/bmp", "x.bmp");
        assert!(matches!(source.validate(), Err(EncodeError::UnsupportedType { .. })));
    }

    #[test]
    fn test_rejects_empty_file() {
        let source = SourceImage::new(Vec::new(), "image/png", "empty.png");
        assert!(matches!(source.validate(), Err(EncodeError::Empty)));
    }

    #[test]
    fn test_mime_is_normalized() {
        let source = SourceImage::new(vec![1], " Image/JPEG ", "a.jpg");
        assert_eq!(source.mime_type(), "image/jpeg");
        assert_eq!(source.validate().unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_from_path_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.webp");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let source = SourceImage::from_path(&path).unwrap();
        assert_eq!(source.mime_type(), "image/webp");
        assert_eq!(source.file_name(), "still.webp");
    }

    #[test]
    fn test_from_path_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload");
        let img = image::RgbImage::new(4, 4);
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        let source = SourceImage::from_path(&path).unwrap();
        assert_eq!(source.mime_type(), "image/png");
    }
}
