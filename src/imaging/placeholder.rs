//! Solid-fill stand-in used when a source is absent or unreadable.

use super::backend::{ImageHandle, ImagingError};
use super::params::{Resolution, Rgb};
use image::RgbaImage;

/// A `width × height` canvas filled with `colour` at the default resolution.
pub fn placeholder(width: u32, height: u32, colour: Rgb) -> Result<ImageHandle, ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::InvalidGeometry(format!(
            "placeholder dimensions must be non-zero, got {width}x{height}"
        )));
    }
    Ok(ImageHandle::new(
        RgbaImage::from_pixel(width, height, colour.to_rgba()),
        Resolution::default(),
    ))
}
