//! Decode, crop, scale and re-encode.
//!
//! The transformer only decodes when it has to: identity requests return the
//! source bytes untouched. Output keeps the source format; JPEG output uses
//! the configured quality, PNG is lossless.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::TransformError;
use crate::iiif::{Region, Scale};

use super::region::crop_box;
use super::scale::target_size;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Image Transformer
// =============================================================================

/// Crops and scales images per IIIF region and size.
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    jpeg_quality: u8,
}

impl Default for ImageTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageTransformer {
    /// Create a transformer; quality is clamped to 1-100.
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: clamp_quality(jpeg_quality),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Pixel dimensions, read from the header only.
    pub fn dimensions(&self, source: &[u8]) -> Result<(u32, u32), TransformError> {
        reader(source)?
            .into_dimensions()
            .map_err(|e| TransformError::DecodeError {
                message: e.to_string(),
            })
    }

    /// Apply `region` then `scale` to `source`.
    ///
    /// Returns `source` itself when neither operation changes the image.
    pub fn apply(&self, source: Bytes, region: Region, scale: Scale) -> Result<Bytes, TransformError> {
        if region == Region::Full && scale == Scale::Full {
            return Ok(source);
        }

        let (width, height) = self.dimensions(&source)?;
        let crop = crop_box(region, width, height)?;
        let (cropped_width, cropped_height) = crop
            .map(|c| (c.width, c.height))
            .unwrap_or((width, height));
        let target = target_size(scale, cropped_width, cropped_height);

        if crop.is_none() && target.is_none() {
            return Ok(source);
        }

        let format = image::guess_format(&source).map_err(|e| TransformError::DecodeError {
            message: e.to_string(),
        })?;
        let mut img = reader(&source)?
            .decode()
            .map_err(|e| TransformError::DecodeError {
                message: e.to_string(),
            })?;

        if let Some(c) = crop {
            img = img.crop_imm(c.x, c.y, c.width, c.height);
        }
        if let Some((target_width, target_height)) = target {
            img = img.resize_exact(target_width, target_height, FilterType::Lanczos3);
        }

        self.encode(&img, format)
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Bytes, TransformError> {
        let mut output = Vec::new();
        let result = match format {
            ImageFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.jpeg_quality);
                match img {
                    DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
                    other => encoder.encode_image(&other.to_rgb8()),
                }
            }
            other => img.write_to(&mut Cursor::new(&mut output), other),
        };

        result.map_err(|e| TransformError::EncodeError {
            message: e.to_string(),
        })?;
        Ok(Bytes::from(output))
    }
}

fn reader(source: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, TransformError> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| TransformError::DecodeError {
            message: e.to_string(),
        })
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
