use crate::error::PipelineError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

/// Content type of every generated thumbnail
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

/// An encoded thumbnail
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// JPEG bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Produces bounded-size JPEG thumbnails
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl ThumbnailGenerator {
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        Self {
            max_dimension,
            jpeg_quality,
        }
    }

    /// Decode `source`, shrink it to fit the bounding box and encode as JPEG.
    ///
    /// Images already inside the box keep their size.
    pub fn generate(&self, source: &[u8]) -> Result<Thumbnail, PipelineError> {
        let image = image::load_from_memory(source)
            .map_err(|e| PipelineError::UnsupportedFormat(e.to_string()))?;

        let (width, height) = fit_within(image.width(), image.height(), self.max_dimension);

        let resized = if (width, height) == (image.width(), image.height()) {
            image
        } else {
            image.resize_exact(width, height, FilterType::Lanczos3)
        };

        // JPEG has no alpha channel and no 16-bit samples
        let rgb = resized.to_rgb8();

        let mut data = Vec::new();
        JpegEncoder::new_with_quality(&mut data, self.jpeg_quality)
            .encode_image(&rgb)
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?;

        debug!(
            width = width,
            height = height,
            size_bytes = data.len(),
            "Thumbnail encoded"
        );

        Ok(Thumbnail {
            data,
            width,
            height,
        })
    }
}

/// Dimensions of a `width` x `height` image scaled down to fit a
/// `max` x `max` box, preserving aspect ratio. Never upscales.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let ratio = f64::min(max as f64 / width as f64, max as f64 / height as f64);
    let scale = |side: u32| ((side as f64 * ratio).round() as u32).clamp(1, max);

    (scale(width), scale(height))
}
