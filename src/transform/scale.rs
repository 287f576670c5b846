//! Fit-within scaling. Images are never enlarged.

use crate::iiif::Scale;

/// Output size for `scale` applied to an image of `width` x `height`.
///
/// When both sides are requested the side needing the larger reduction
/// leads, so the result fits inside the box. Returns `None` when no resize
/// is needed: `full`, or a target at least as large as the source in either
/// dimension.
pub fn target_size(scale: Scale, width: u32, height: u32) -> Option<(u32, u32)> {
    let Scale::Fit {
        width: box_width,
        height: box_height,
    } = scale
    else {
        return None;
    };

    if width == 0 || height == 0 {
        return None;
    }

    let width_ratio = box_width.map(|w| f64::from(w) / f64::from(width));
    let height_ratio = box_height.map(|h| f64::from(h) / f64::from(height));

    let ratio = match (width_ratio, height_ratio) {
        (Some(w), Some(h)) => w.min(h),
        (Some(w), None) => w,
        (None, Some(h)) => h,
        (None, None) => return None,
    };

    let target_width = ((f64::from(width) * ratio).round() as u32).max(1);
    let target_height = ((f64::from(height) * ratio).round() as u32).max(1);

    if target_width >= width || target_height >= height {
        return None;
    }

    Some((target_width, target_height))
}
