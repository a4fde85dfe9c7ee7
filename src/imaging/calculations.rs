//! Pure geometry for image transforms.
//!
//! All functions here are pure and testable without any I/O or pixels. Every
//! function rejects zero-sized inputs with [`ImagingError::InvalidGeometry`]
//! instead of clamping them. Fill-crop also rejects a scaled extent too large
//! to place with `i32` offsets.
//!
//! Rounding rules:
//! - the binding axis of fit and fill-crop is always exactly the target size;
//! - fit truncates the letterboxed axis, fill-crop rounds the overflowing axis;
//! - centred offsets use floor division, so a 133px overflow splits as -67/+66.

use super::backend::ImagingError;
use super::params::{Anchor, CropRatios};

/// Placement of a scaled source inside a canvas. Offsets may be negative
/// when the scaled source overflows the canvas (fill-crop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the rectangle covers the whole `(width, height)` canvas.
    pub fn covers(&self, canvas: (u32, u32)) -> bool {
        let right = self.x as i64 + self.width as i64;
        let bottom = self.y as i64 + self.height as i64;
        self.x <= 0 && self.y <= 0 && right >= canvas.0 as i64 && bottom >= canvas.1 as i64
    }

    /// True when the rectangle lies entirely inside the canvas.
    pub fn fits_within(&self, canvas: (u32, u32)) -> bool {
        let right = self.x as i64 + self.width as i64;
        let bottom = self.y as i64 + self.height as i64;
        self.x >= 0 && self.y >= 0 && right <= canvas.0 as i64 && bottom <= canvas.1 as i64
    }
}

/// Integer region of a source image, e.g. a ratio-crop selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceRect {
    /// The entire source.
    pub fn whole((width, height): (u32, u32)) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

fn ensure_non_zero(label: &str, (width, height): (u32, u32)) -> Result<(), ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::InvalidGeometry(format!(
            "{label} dimensions must be non-zero, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Overflowing extent of a fill-crop: the scaled length, at least `target`.
///
/// Extents past `i32::MAX` are rejected so the far edge stays reachable from
/// an `i32` offset; every offset computed from an accepted extent fits.
fn overflow_extent(length: u32, factor: f64, target: u32) -> Result<u32, ImagingError> {
    let scaled = (length as f64 * factor).round().max(target as f64);
    if scaled > i32::MAX as f64 {
        return Err(ImagingError::InvalidGeometry(format!(
            "scaled extent {scaled} exceeds the largest placeable size {}",
            i32::MAX
        )));
    }
    Ok(scaled as u32)
}

fn centered(target: u32, scaled: u32) -> i32 {
    (target as i64 - scaled as i64).div_euclid(2) as i32
}

fn end_aligned(target: u32, scaled: u32) -> i32 {
    (target as i64 - scaled as i64) as i32
}

/// Factor that brings the longer source edge to `max_dimension`.
///
/// ```
/// # use imagecache::imaging::scale_factor;
/// assert_eq!(scale_factor((800, 600), 400).unwrap(), 0.5);
/// ```
pub fn scale_factor(source: (u32, u32), max_dimension: u32) -> Result<f64, ImagingError> {
    ensure_non_zero("source", source)?;
    Ok(max_dimension as f64 / source.0.max(source.1) as f64)
}

/// Destination rectangle for scale-to-fit.
///
/// The smaller of the two scale percentages binds, so the whole source fits
/// in the target and the other axis is letterboxed and centred.
///
/// ```
/// # use imagecache::imaging::{fit_rectangle, Rect};
/// assert_eq!(fit_rectangle((400, 400), (800, 600)).unwrap(), Rect::new(0, 50, 400, 300));
/// ```
pub fn fit_rectangle(target: (u32, u32), source: (u32, u32)) -> Result<Rect, ImagingError> {
    ensure_non_zero("target", target)?;
    ensure_non_zero("source", source)?;
    let (tgt_w, tgt_h) = target;
    let (src_w, src_h) = source;

    let width_percent = tgt_w as f64 / src_w as f64;
    let height_percent = tgt_h as f64 / src_h as f64;

    if height_percent < width_percent {
        // Height binds: pillarbox left/right
        let w = ((src_w as f64 * height_percent) as u32).clamp(1, tgt_w);
        Ok(Rect::new(centered(tgt_w, w), 0, w, tgt_h))
    } else {
        // Width binds (ties included): letterbox top/bottom
        let h = ((src_h as f64 * width_percent) as u32).clamp(1, tgt_h);
        Ok(Rect::new(0, centered(tgt_h, h), tgt_w, h))
    }
}

/// Destination rectangle for crop-to-fill.
///
/// The larger percentage binds, so the scaled source covers the target and
/// overflows on the other axis. The anchor picks which part of the overflow
/// stays visible; anchors naming the binding axis fall back to centring.
///
/// ```
/// # use imagecache::imaging::{fill_crop_rectangle, Anchor, Rect};
/// let rect = fill_crop_rectangle((400, 400), (800, 600), Anchor::Center).unwrap();
/// assert_eq!(rect, Rect::new(-67, 0, 533, 400));
/// ```
pub fn fill_crop_rectangle(
    target: (u32, u32),
    source: (u32, u32),
    anchor: Anchor,
) -> Result<Rect, ImagingError> {
    ensure_non_zero("target", target)?;
    ensure_non_zero("source", source)?;
    let (tgt_w, tgt_h) = target;
    let (src_w, src_h) = source;

    let width_percent = tgt_w as f64 / src_w as f64;
    let height_percent = tgt_h as f64 / src_h as f64;

    if height_percent < width_percent {
        // Width binds: overflow is vertical
        let h = overflow_extent(src_h, width_percent, tgt_h)?;
        let y = match anchor {
            Anchor::Top => 0,
            Anchor::Bottom => end_aligned(tgt_h, h),
            _ => centered(tgt_h, h),
        };
        Ok(Rect::new(0, y, tgt_w, h))
    } else {
        // Height binds (ties included): overflow is horizontal
        let w = overflow_extent(src_w, height_percent, tgt_w)?;
        let x = match anchor {
            Anchor::Left => 0,
            Anchor::Right => end_aligned(tgt_w, w),
            _ => centered(tgt_w, w),
        };
        Ok(Rect::new(x, 0, w, tgt_h))
    }
}

/// Source selection and destination for a ratio crop.
///
/// The selection is `left·w, top·h, width·w, height·h` truncated to whole
/// pixels and clamped to the source; the destination is always the whole
/// target, so the selection is stretched without preserving aspect ratio.
pub fn ratio_crop_rectangles(
    target: (u32, u32),
    source: (u32, u32),
    ratios: CropRatios,
) -> Result<(SourceRect, Rect), ImagingError> {
    ensure_non_zero("target", target)?;
    ensure_non_zero("source", source)?;
    let (src_w, src_h) = source;

    let x = ((ratios.left() * src_w as f64) as u32).min(src_w);
    let y = ((ratios.top() * src_h as f64) as u32).min(src_h);
    let width = ((ratios.width() * src_w as f64) as u32).min(src_w - x);
    let height = ((ratios.height() * src_h as f64) as u32).min(src_h - y);

    if width == 0 || height == 0 {
        return Err(ImagingError::InvalidGeometry(format!(
            "crop selection {width}x{height} at ({x}, {y}) of a {src_w}x{src_h} source is empty"
        )));
    }

    Ok((
        SourceRect {
            x,
            y,
            width,
            height,
        },
        Rect::new(0, 0, target.0, target.1),
    ))
}

/// Output size for bounded-max scaling into a `bound` box.
///
/// Preserves aspect ratio and never upscales: a source that already fits the
/// box keeps its size.
pub fn bounded_dimensions(
    source: (u32, u32),
    bound: (u32, u32),
) -> Result<(u32, u32), ImagingError> {
    ensure_non_zero("source", source)?;
    ensure_non_zero("bound", bound)?;
    let (src_w, src_h) = source;
    let (max_w, max_h) = bound;

    if src_w <= max_w && src_h <= max_h {
        return Ok(source);
    }

    let factor = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    Ok((
        ((src_w as f64 * factor).round() as u32).clamp(1, max_w),
        ((src_h as f64 * factor).round() as u32).clamp(1, max_h),
    ))
}

/// Output size for the save-for-web copy: longer edge bounded by
/// `max_dimension`, truncated, never upscaled.
pub fn thumbnail_dimensions(
    source: (u32, u32),
    max_dimension: u32,
) -> Result<(u32, u32), ImagingError> {
    ensure_non_zero("bound", (max_dimension, max_dimension))?;
    let factor = scale_factor(source, max_dimension)?;
    if factor >= 1.0 {
        return Ok(source);
    }
    Ok((
        ((source.0 as f64 * factor) as u32).max(1),
        ((source.1 as f64 * factor) as u32).max(1),
    ))
}
