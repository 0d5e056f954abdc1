use video_api::VideoSize;

use crate::encode::{encode, EncodedImage};
use crate::source::SourceImage;
use crate::Result;

/// Reference image held for a generation: the original upload plus the
/// payload encoded for one target size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    source: SourceImage,
    encoded: EncodedImage,
}

impl ReferenceImage {
    /// Validate and encode `source` for `size`
    pub fn prepare(source: SourceImage, size: VideoSize) -> Result<Self> {
        let encoded = encode(&source, size)?;
        Ok(Self { source, encoded })
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn encoded(&self) -> &EncodedImage {
        &self.encoded
    }

    /// Whether the encoded payload was rendered for `size`
    pub fn matches(&self, size: VideoSize) -> bool {
        self.encoded.dimensions() == size.dimensions()
    }

    /// Re-encode from the retained source for a new size
    pub fn reencode(&self, size: VideoSize) -> Result<Self> {
        Self::prepare(self.source.clone(), size)
    }

    /// This image encoded for `size`, re-encoding only when stale
    pub fn for_size(&self, size: VideoSize) -> Result<Self> {
        if self.matches(size) {
            Ok(self.clone())
        } else {
            self.reencode(size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn source() -> SourceImage {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 600, Rgb([90, 90, 90])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        SourceImage::new(bytes, "image/png", "frame.png")
    }

    #[test]
    fn test_stale_payload_is_reencoded_from_source() {
        let reference = ReferenceImage::prepare(source(), VideoSize::Landscape720).unwrap();
        assert!(reference.matches(VideoSize::Landscape720));
        assert!(!reference.matches(VideoSize::Portrait1024));

        let resized = reference.for_size(VideoSize::Portrait1024).unwrap();
        assert_eq!(resized.encoded().dimensions(), (1024, 1792));
        assert_eq!(resized.source(), reference.source());
    }

    #[test]
    fn test_for_same_size_keeps_payload() {
        let reference = ReferenceImage::prepare(source(), VideoSize::Portrait720).unwrap();
        let same = reference.for_size(VideoSize::Portrait720).unwrap();
        assert_eq!(same, reference);
    }
}
