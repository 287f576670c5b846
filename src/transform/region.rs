//! Crop geometry.

use crate::error::TransformError;
use crate::iiif::Region;

/// A crop rectangle inside the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crop rectangle for `region` on an image of `width` x `height`.
///
/// Returns `Ok(None)` when the region covers the whole image.
pub fn crop_box(region: Region, width: u32, height: u32) -> Result<Option<CropBox>, TransformError> {
    match region {
        Region::Full => Ok(None),
        Region::Square => {
            if width == height {
                return Ok(None);
            }
            let side = width.min(height);
            Ok(Some(CropBox {
                x: (width - side) / 2,
                y: (height - side) / 2,
                width: side,
                height: side,
            }))
        }
        Region::Box {
            x,
            y,
            width: box_width,
            height: box_height,
        } => {
            if box_width <= 0 || box_height <= 0 {
                return Err(TransformError::NonPositiveRegion {
                    width: box_width,
                    height: box_height,
                });
            }

            let (image_width, image_height) = (i64::from(width), i64::from(height));
            let left = x.max(0);
            let top = y.max(0);
            let right = x.saturating_add(box_width).min(image_width);
            let bottom = y.saturating_add(box_height).min(image_height);

            if right <= left || bottom <= top {
                return Err(TransformError::NonOverlappingRegion);
            }
            if left == 0 && top == 0 && right == image_width && bottom == image_height {
                return Ok(None);
            }

            // All four values lie within [0, u32::MAX] after clamping
            Ok(Some(CropBox {
                x: left as u32,
                y: top as u32,
                width: (right - left) as u32,
                height: (bottom - top) as u32,
            }))
        }
    }
}
