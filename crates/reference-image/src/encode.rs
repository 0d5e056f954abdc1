use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{overlay, resize, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

use video_api::{ReferencePayload, VideoSize};

use crate::source::SourceImage;
use crate::{EncodeError, Result};

/// Sources with fewer pixels than this share of the target get a quality advisory
pub const LOW_RESOLUTION_RATIO: f64 = 0.25;

const ENCODED_MIME: &str = "image/png";
const ENCODED_FILE_NAME: &str = "reference.png";

/// Non-blocking warning attached to an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityAdvisory {
    /// Source has less than a quarter of the target's pixels and will look soft
    LowResolution {
        source: (u32, u32),
        target: (u32, u32),
    },
}

impl QualityAdvisory {
    pub fn message(&self) -> String {
        match self {
            QualityAdvisory::LowResolution { source, target } => format!(
                "Reference image is {}x{}, much smaller than the {}x{} output; the result may look blurry.",
                source.0, source.1, target.0, target.1
            ),
        }
    }
}

/// PNG payload sized exactly to the requested video dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
    source_dimensions: (u32, u32),
    advisory: Option<QualityAdvisory>,
}

impl EncodedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        self.source_dimensions
    }

    pub fn advisory(&self) -> Option<QualityAdvisory> {
        self.advisory
    }

    pub fn mime_type(&self) -> &'static str {
        ENCODED_MIME
    }

    /// Video size this payload was rendered for
    pub fn size(&self) -> Option<VideoSize> {
        VideoSize::from_dimensions(self.width, self.height)
    }

    /// `data:` URL for previews
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", ENCODED_MIME, STANDARD.encode(&self.bytes))
    }

    /// Multipart part for the creation request
    pub fn to_payload(&self) -> ReferencePayload {
        ReferencePayload {
            bytes: self.bytes.to_vec(),
            mime_type: ENCODED_MIME.to_string(),
            file_name: ENCODED_FILE_NAME.to_string(),
        }
    }
}

/// Encode `source` for a supported video size
pub fn encode(source: &SourceImage, target: VideoSize) -> Result<EncodedImage> {
    let (width, height) = target.dimensions();
    encode_to(source, width, height)
}

/// Encode `source` onto a `width`x`height` canvas.
///
/// The image is scaled to cover the canvas, keeping its aspect ratio, and
/// centered; overflow is clipped. Uncovered pixels stay opaque black.
pub fn encode_to(source: &SourceImage, width: u32, height: u32) -> Result<EncodedImage> {
    if width == 0 || height == 0 {
        return Err(EncodeError::Encode(format!(
            "invalid target dimensions {width}x{height}"
        )));
    }
    let format = source.validate()?;
    let img = image::load_from_memory_with_format(source.bytes(), format)
        .map_err(|e| EncodeError::Decode(e.to_string()))?;
    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(EncodeError::Decode("image has no pixels".to_string()));
    }

    let canvas = cover_fit(&img, width, height);

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| EncodeError::Encode(e.to_string()))?;

    let source_pixels = src_w as f64 * src_h as f64;
    let target_pixels = width as f64 * height as f64;
    let advisory = (source_pixels < target_pixels * LOW_RESOLUTION_RATIO).then_some(
        QualityAdvisory::LowResolution {
            source: (src_w, src_h),
            target: (width, height),
        },
    );

    tracing::debug!(
        target: "reference_image",
        "encoded {} ({}x{}) to {}x{}, {} bytes",
        source.file_name(),
        src_w,
        src_h,
        width,
        height,
        bytes.len()
    );

    Ok(EncodedImage {
        bytes: bytes.into(),
        width,
        height,
        source_dimensions: (src_w, src_h),
        advisory,
    })
}

fn cover_fit(img: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();
    let scale = (width as f64 / src_w as f64).max(height as f64 / src_h as f64);
    let scaled_w = ((src_w as f64 * scale).round() as u32).max(1);
    let scaled_h = ((src_h as f64 * scale).round() as u32).max(1);

    let scaled = resize(&img.to_rgba8(), scaled_w, scaled_h, FilterType::Lanczos3);

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    let x = (width as i64 - scaled_w as i64) / 2;
    let y = (height as i64 - scaled_h as i64) / 2;
    overlay(&mut canvas, &scaled, x, y);
    canvas
}
