//! Image cropping and scaling.
//!
//! Geometry ([`crop_box`], [`target_size`]) is pure and separate from the
//! codec work done by [`ImageTransformer`].

mod encoder;
mod region;
mod scale;

pub use encoder::{
    clamp_quality, ImageTransformer, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use region::{crop_box, CropBox};
pub use scale::target_size;
