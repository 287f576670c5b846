//! Region/size suffix grammar shared by both sources.
//!
//! ```text
//! (nothing) | info.json | <region>/<scale>/<rotation>/<quality>.<ext>
//! ```
//!
//! Rotation and quality are accepted but not interpreted.

use crate::error::ReferenceError;

use super::reference::{Region, ResponseShape, Scale};

/// Suffix requesting the IIIF image information document.
pub const INFO_JSON: &str = "info.json";

pub(super) fn parse_shape(
    suffix: &str,
    wants_raw_source_file: bool,
) -> Result<ResponseShape, ReferenceError> {
    if wants_raw_source_file {
        return Ok(ResponseShape::RawSourceFile);
    }

    let suffix = suffix.trim_matches('/');
    if suffix.is_empty() || suffix == INFO_JSON {
        return Ok(ResponseShape::Info);
    }

    let fields: Vec<&str> = suffix.split('/').collect();
    match fields.as_slice() {
        [region, scale, _rotation, _quality] => Ok(ResponseShape::Image {
            region: parse_region(region)?,
            scale: parse_scale(scale)?,
        }),
        _ => Err(ReferenceError::MalformedSuffix(fields.len())),
    }
}

pub(super) fn parse_region(value: &str) -> Result<Region, ReferenceError> {
    match value {
        "" => Err(ReferenceError::MissingRegionParameter),
        "full" => Ok(Region::Full),
        "square" => Ok(Region::Square),
        other => {
            let malformed = || ReferenceError::MalformedRegion(other.to_string());
            let numbers = other
                .split(',')
                .map(|field| field.trim().parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| malformed())?;

            match numbers.as_slice() {
                [x, y, width, height] => Ok(Region::Box {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                }),
                _ => Err(malformed()),
            }
        }
    }
}

pub(super) fn parse_scale(value: &str) -> Result<Scale, ReferenceError> {
    match value {
        "" => Err(ReferenceError::MissingScaleParameter),
        "full" | "max" => Ok(Scale::Full),
        other => {
            let malformed = || ReferenceError::MalformedScalingParameter(other.to_string());
            let spec = other.strip_prefix('!').unwrap_or(other);
            let (width, height) = spec.split_once(',').ok_or_else(malformed)?;
            let width = parse_dimension(width).ok_or_else(malformed)?;
            let height = parse_dimension(height).ok_or_else(malformed)?;

            if width.is_none() && height.is_none() {
                return Err(malformed());
            }

            Ok(Scale::Fit { width, height })
        }
    }
}

/// `Some(None)` for an empty side, `Some(Some(n))` for a positive number,
/// `None` for anything else.
fn parse_dimension(value: &str) -> Option<Option<u32>> {
    if value.is_empty() {
        return Some(None);
    }
    match value.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(Some(n)),
    }
}
