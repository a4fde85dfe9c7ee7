//! Drawing a source region into a destination rectangle.
//!
//! Filtering is `image::imageops::resize` with [`FilterType::CatmullRom`],
//! which widens the kernel by the reduction ratio when minifying. Around it:
//! - only the part of the destination that lands on the canvas is resampled,
//!   plus enough margin for the kernel;
//! - samples outside the source region are mirrored (tile-flip) back into
//!   it, so edge pixels are not pulled towards a clamp or black border and
//!   pixels outside a crop selection never bleed in;
//! - colour is filtered premultiplied by alpha;
//! - the visible patch is placed with `imageops::replace` or
//!   `imageops::overlay`, which clip to the canvas.
//!
//! Window ends are put where the source and destination pixel grids line up
//! when that costs little, which keeps the scale exact. Otherwise they are
//! rounded to whole output pixels and the mapping is off by at most a pixel
//! and a half.

use super::backend::ImagingError;
use super::calculations::{Rect, SourceRect};
use image::imageops::{self, FilterType};
use image::{Rgba, Rgba32FImage, RgbaImage};

/// Largest intermediate buffer one draw may allocate, in pixels.
const MAX_WINDOW_PIXELS: u64 = 1 << 26;

/// How drawn pixels combine with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    /// Replace canvas pixels (alpha included).
    Copy,
    /// Source-over alpha compositing onto the canvas.
    Over,
}

/// Map any integer coordinate into `0..len` by reflecting at the edges.
fn mirror(index: i64, len: u32) -> u32 {
    let len = len as i64;
    let period = 2 * len;
    let m = index.rem_euclid(period);
    (if m < len { m } else { period - 1 - m }) as u32
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Resampling plan for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    /// First source sample, relative to the region start. May lie outside.
    src_start: i64,
    src_len: u64,
    /// Length the source samples are resized to.
    out_len: u64,
    /// Resized samples before the first visible one.
    skip: u64,
    visible: u64,
    /// Canvas coordinate of the first visible sample.
    canvas_start: u32,
}

impl Window {
    fn new(region_len: u32, dest_pos: i32, dest_len: u32, canvas_len: u32) -> Option<Self> {
        let first = (dest_pos as i64).max(0);
        let end = (dest_pos as i64 + dest_len as i64).min(canvas_len as i64);
        if end <= first {
            return None;
        }
        // Visible span in destination coordinates
        let (k0, k1) = (first - dest_pos as i64, end - dest_pos as i64);

        let ratio = region_len as f64 / dest_len as f64;
        // Catmull-Rom reaches two pixels each way, widened when minifying
        let pad = (2.0 * ratio.max(1.0)).ceil() as i64;
        let dest_pad = (pad as f64 / ratio).ceil() as i64;
        let g = gcd(region_len as u64, dest_len as u64) as i64;
        let (src_step, dst_step) = (region_len as i64 / g, dest_len as i64 / g);

        let (src_start, src_end, out_start, out_end) =
            if src_step <= 4 * pad && dst_step <= 4 * dest_pad {
                let out_start = (k0 - dest_pad).div_euclid(dst_step) * dst_step;
                let out_end = (k1 + dest_pad + dst_step - 1).div_euclid(dst_step) * dst_step;
                let src = |out: i64| out / dst_step * src_step;
                (src(out_start), src(out_end), out_start, out_end)
            } else {
                let margin = pad + (1.5 * ratio).ceil() as i64 + 1;
                let src_start = (k0 as f64 * ratio).floor() as i64 - margin;
                let src_end = (k1 as f64 * ratio).ceil() as i64 + margin;
                let out = |src: i64| (src as f64 / ratio).round() as i64;
                (src_start, src_end, out(src_start), out(src_end))
            };

        Some(Self {
            src_start,
            src_len: (src_end - src_start) as u64,
            out_len: (out_end - out_start) as u64,
            skip: (k0 - out_start) as u64,
            visible: (k1 - k0) as u64,
            canvas_start: first as u32,
        })
    }
}

fn premultiplied(pixel: &Rgba<u8>) -> Rgba<f32> {
    let a = pixel[3] as f32 / 255.0;
    let c = |v: u8| v as f32 / 255.0 * a;
    Rgba([c(pixel[0]), c(pixel[1]), c(pixel[2]), a])
}

fn straight(pixel: &Rgba<f32>) -> Rgba<u8> {
    let a = pixel[3].clamp(0.0, 1.0);
    if a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let c = |v: f32| ((v / a).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([c(pixel[0]), c(pixel[1]), c(pixel[2]), (a * 255.0).round() as u8])
}

/// Resample `region` of `src` to fill `dest` on `canvas`.
///
/// `dest` may hang off the canvas; only its visible part is computed and
/// written. `region` must lie inside `src`.
pub fn draw(
    src: &RgbaImage,
    region: SourceRect,
    canvas: &mut RgbaImage,
    dest: Rect,
    blend: Blend,
) -> Result<(), ImagingError> {
    if region.width == 0 || region.height == 0 || dest.width == 0 || dest.height == 0 {
        return Ok(());
    }
    let (Some(cols), Some(rows)) = (
        Window::new(region.width, dest.x, dest.width, canvas.width()),
        Window::new(region.height, dest.y, dest.height, canvas.height()),
    ) else {
        return Ok(());
    };

    let needed = (cols.src_len * rows.src_len).max(cols.out_len * rows.out_len);
    if needed > MAX_WINDOW_PIXELS {
        return Err(ImagingError::InvalidGeometry(format!(
            "drawing a {}x{} region into {}x{} needs {needed} intermediate pixels, \
             over the limit of {MAX_WINDOW_PIXELS}",
            region.width, region.height, dest.width, dest.height
        )));
    }

    let window = Rgba32FImage::from_fn(cols.src_len as u32, rows.src_len as u32, |x, y| {
        let sx = region.x + mirror(cols.src_start + x as i64, region.width);
        let sy = region.y + mirror(rows.src_start + y as i64, region.height);
        premultiplied(src.get_pixel(sx, sy))
    });
    let resized = imageops::resize(
        &window,
        cols.out_len as u32,
        rows.out_len as u32,
        FilterType::CatmullRom,
    );
    let patch = RgbaImage::from_fn(cols.visible as u32, rows.visible as u32, |x, y| {
        straight(resized.get_pixel(cols.skip as u32 + x, rows.skip as u32 + y))
    });

    let (x, y) = (cols.canvas_start as i64, rows.canvas_start as i64);
    match blend {
        Blend::Copy => imageops::replace(canvas, &patch, x, y),
        Blend::Over => imageops::overlay(canvas, &patch, x, y),
    }
    Ok(())
}

/// Resample the whole of `src` to `width`x`height`.
pub fn resize(src: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, ImagingError> {
    let mut out = RgbaImage::new(width, height);
    draw(
        src,
        SourceRect::whole(src.dimensions()),
        &mut out,
        Rect::new(0, 0, width, height),
        Blend::Copy,
    )?;
    Ok(out)
}
