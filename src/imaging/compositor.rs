//! Raster compositing: one canvas per request.
//!
//! The transform mode is matched exactly once, turning the request into a
//! canvas size, a fill, a source region, a destination rectangle and a blend
//! mode. Everything after that is shared.

use super::backend::{ImageHandle, ImagingError};
use super::calculations::{
    Rect, SourceRect, bounded_dimensions, fill_crop_rectangle, fit_rectangle,
    ratio_crop_rectangles,
};
use super::params::{Rgb, TransformMode, TransformRequest};
use super::resample::{self, Blend};
use image::{Rgba, RgbaImage};
use log::debug;

/// Drawing plan derived from a request and the source size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Plan {
    canvas: (u32, u32),
    fill: Option<Rgba<u8>>,
    region: SourceRect,
    dest: Rect,
    blend: Blend,
}

fn plan(
    source: &ImageHandle,
    request: &TransformRequest,
    background: Rgb,
) -> Result<Plan, ImagingError> {
    let target = (request.width, request.height);
    let source_dims = source.dimensions();
    let whole = SourceRect::whole(source_dims);

    let plan = match request.mode {
        TransformMode::Fit => Plan {
            canvas: target,
            fill: Some(background.to_rgba()),
            region: whole,
            dest: fit_rectangle(target, source_dims)?,
            blend: Blend::Over,
        },
        TransformMode::FillCrop { anchor } => Plan {
            canvas: target,
            fill: Some(background.to_rgba()),
            region: whole,
            dest: fill_crop_rectangle(target, source_dims, anchor)?,
            blend: Blend::Copy,
        },
        TransformMode::RatioCrop(ratios) => {
            let (selection, dest) = ratio_crop_rectangles(target, source_dims, ratios)?;
            Plan {
                canvas: target,
                fill: None,
                region: selection,
                dest,
                blend: Blend::Copy,
            }
        }
        TransformMode::BoundedMax => {
            let (w, h) = bounded_dimensions(source_dims, target)?;
            Plan {
                canvas: (w, h),
                fill: None,
                region: whole,
                dest: Rect::new(0, 0, w, h),
                blend: Blend::Copy,
            }
        }
    };
    Ok(plan)
}

/// Composite `source` according to `request` onto a fresh canvas.
///
/// `background` is the already-resolved letterbox colour. The result carries
/// the source's resolution.
pub fn compose(
    source: &ImageHandle,
    request: &TransformRequest,
    background: Rgb,
) -> Result<ImageHandle, ImagingError> {
    let plan = plan(source, request, background)?;
    debug!(
        "compose {}x{} -> canvas {}x{} dest {:?} ({:?})",
        source.width(),
        source.height(),
        plan.canvas.0,
        plan.canvas.1,
        plan.dest,
        plan.blend
    );

    let (w, h) = plan.canvas;
    let mut canvas = match plan.fill {
        Some(colour) => RgbaImage::from_pixel(w, h, colour),
        None => RgbaImage::new(w, h),
    };
    resample::draw(&source.pixels, plan.region, &mut canvas, plan.dest, plan.blend)?;

    Ok(ImageHandle::new(canvas, source.resolution))
}

/// Resample the whole source to `dimensions`, keeping its resolution.
pub fn downscale(
    source: &ImageHandle,
    dimensions: (u32, u32),
) -> Result<ImageHandle, ImagingError> {
    let (w, h) = dimensions;
    if w == 0 || h == 0 {
        return Err(ImagingError::InvalidGeometry(format!(
            "downscale dimensions must be non-zero, got {w}x{h}"
        )));
    }
    if dimensions == source.dimensions() {
        return Ok(source.clone());
    }
    Ok(ImageHandle::new(
        resample::resize(&source.pixels, w, h)?,
        source.resolution,
    ))
}
