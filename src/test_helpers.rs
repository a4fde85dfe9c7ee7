//! Shared test utilities for the imagecache test suite.
//!
//! Writes small synthetic source files and builds in-memory fixtures so unit
//! tests never depend on checked-in binaries.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! write_test_jpeg(&tmp.path().join("photo.jpg"), 800, 600, 300);
//! let service = fs_service(tmp.path());
//! ```

use std::path::Path;

use image::{ImageEncoder, RgbImage, RgbaImage};

use crate::cache::{ClockedStore, DerivedImageCache, ManualClock};
use crate::config::EngineConfig;
use crate::imaging::FsSourceLoader;
use crate::service::ImageService;

// =========================================================================
// Synthetic source files
// =========================================================================

/// Gradient pixels so resampling bugs show up as wrong colours.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write a JPEG with a JFIF header declaring `dpi` in both directions.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32, dpi: u16) {
    let img = gradient_rgb(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    let mut encoder = image::codecs::jpeg::JpegEncoder::new(writer);
    encoder.set_pixel_density(image::codecs::jpeg::PixelDensity::dpi(dpi));
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write an opaque RGBA PNG (no `pHYs` chunk).
pub fn write_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

// =========================================================================
// Service fixtures
// =========================================================================

/// Filesystem-backed service with a manual clock, rooted at `root`.
pub fn fs_service(root: &Path) -> ImageService<FsSourceLoader, ClockedStore<ManualClock>> {
    let config = EngineConfig::default();
    let cache = DerivedImageCache::new(
        ClockedStore::new(ManualClock::new()),
        config.sliding_expiration(),
    );
    ImageService::new(FsSourceLoader::new(root), cache, config)
}
