//! Thumbnail generation for image uploads.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::validator::normalize_mime_type;

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 200;
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 70;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode thumbnail: {0}")]
    Encode(String),

    #[error("Thumbnail task failed: {0}")]
    Task(String),
}

/// An encoded thumbnail.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub data: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Produces width-bounded thumbnails. Never upscales.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailGenerator {
    width: u32,
    quality: u8,
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_WIDTH, DEFAULT_THUMBNAIL_QUALITY)
    }
}

impl ThumbnailGenerator {
    pub fn new(width: u32, quality: u8) -> Self {
        Self {
            width: width.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn should_generate(&self, mime_type: &str) -> bool {
        normalize_mime_type(mime_type).starts_with("image/")
    }

    /// Decode, resize and re-encode on the blocking pool.
    pub async fn generate(&self, data: Bytes) -> Result<Thumbnail, ThumbnailError> {
        let generator = *self;
        tokio::task::spawn_blocking(move || generator.render(&data))
            .await
            .map_err(|e| ThumbnailError::Task(e.to_string()))?
    }

    /// Synchronous thumbnail rendering.
    pub fn render(&self, data: &[u8]) -> Result<Thumbnail, ThumbnailError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ThumbnailError::Decode(e.to_string()))?;
        let source_format = reader.format();
        let img = reader
            .decode()
            .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

        let resized = self.bound_width(img);
        let (width, height) = resized.dimensions();

        let (data, content_type) = match source_format {
            Some(ImageFormat::Png) => (encode(&resized, ImageFormat::Png)?, "image/png"),
            Some(ImageFormat::Gif) => (encode(&resized, ImageFormat::Gif)?, "image/gif"),
            Some(ImageFormat::WebP) => (encode(&resized, ImageFormat::WebP)?, "image/webp"),
            _ => (self.encode_jpeg(&resized)?, "image/jpeg"),
        };

        tracing::debug!(
            width = width,
            height = height,
            size_bytes = data.len(),
            content_type = content_type,
            "Thumbnail rendered"
        );

        Ok(Thumbnail {
            data,
            content_type,
            width,
            height,
        })
    }

    fn bound_width(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width <= self.width {
            return img;
        }
        let scaled = (u64::from(height) * u64::from(self.width) + u64::from(width) / 2)
            / u64::from(width);
        let new_height = u32::try_from(scaled).unwrap_or(u32::MAX).max(1);
        img.resize_exact(self.width, new_height, FilterType::Lanczos3)
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Bytes, ThumbnailError> {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| ThumbnailError::Encode(e.to_string()))?;
        Ok(Bytes::from(buffer))
    }
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Bytes, ThumbnailError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    // The GIF and WebP encoders only take 8-bit RGBA.
    let img = match format {
        ImageFormat::Gif | ImageFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => img.clone(),
    };
    img.write_to(&mut cursor, format)
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;
    Ok(Bytes::from(buffer))
}
