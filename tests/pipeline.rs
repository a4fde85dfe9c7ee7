//! End-to-end tests through the public API: real files on disk, the
//! filesystem collaborators, the in-memory cache and the encoders.

use imagecache::cache::{ClockedStore, DerivedImageCache, ManualClock};
use imagecache::config::EngineConfig;
use imagecache::imaging::{
    Anchor, FsArtifactStore, FsSourceLoader, ImagingError, OutputFormat, Rect, TransformMode,
    TransformRequest, fill_crop_rectangle, fit_rectangle,
};
use imagecache::service::ImageService;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

type Service = ImageService<FsSourceLoader, ClockedStore<ManualClock>>;

const GRAY: Rgba<u8> = Rgba([0x80, 0x80, 0x80, 0xFF]);
const WHITE: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);

fn write_png(path: &Path, width: u32, height: u32, colour: [u8; 4]) {
    RgbaImage::from_pixel(width, height, Rgba(colour))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 100])
    });
    image::codecs::jpeg::JpegEncoder::new(std::fs::File::create(path).unwrap())
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn service(root: &Path) -> (Service, ManualClock) {
    let clock = ManualClock::new();
    let config = EngineConfig::default();
    let cache = DerivedImageCache::new(
        ClockedStore::new(clock.clone()),
        config.sliding_expiration(),
    );
    (
        ImageService::new(FsSourceLoader::new(root), cache, config),
        clock,
    )
}

fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

// =========================================================================
// Scenario 1: fit letterboxes
// =========================================================================

#[test]
fn fit_800x600_into_400x400() {
    assert_eq!(
        fit_rectangle((400, 400), (800, 600)).unwrap(),
        Rect::new(0, 50, 400, 300)
    );

    let tmp = TempDir::new().unwrap();
    write_png(&tmp.path().join("src.png"), 800, 600, [0, 0, 200, 255]);
    let (svc, _) = service(tmp.path());

    let request = TransformRequest::new("src.png", 400, 400, TransformMode::Fit, OutputFormat::Png);
    let pixels = decode(&svc.get_cached(&request).unwrap());

    assert_eq!(pixels.dimensions(), (400, 400));
    for x in [0, 200, 399] {
        assert_eq!(*pixels.get_pixel(x, 49), WHITE);
        assert_eq!(*pixels.get_pixel(x, 50), Rgba([0, 0, 200, 255]));
        assert_eq!(*pixels.get_pixel(x, 349), Rgba([0, 0, 200, 255]));
        assert_eq!(*pixels.get_pixel(x, 350), WHITE);
    }
}

// =========================================================================
// Scenario 2: fill-crop clips left and right
// =========================================================================

#[test]
fn fill_crop_800x600_into_400x400() {
    assert_eq!(
        fill_crop_rectangle((400, 400), (800, 600), Anchor::Center).unwrap(),
        Rect::new(-67, 0, 533, 400)
    );

    let tmp = TempDir::new().unwrap();
    write_png(&tmp.path().join("src.png"), 800, 600, [30, 60, 100, 255]);
    let (svc, _) = service(tmp.path());

    let request = TransformRequest::new(
        "src.png",
        400,
        400,
        TransformMode::FillCrop {
            anchor: Anchor::Center,
        },
        OutputFormat::Png,
    );
    let canvas = svc.render(&request).unwrap();
    assert_eq!(canvas.dimensions(), (400, 400));
    // No background shows anywhere: the scaled source covers the canvas
    assert!(canvas.pixels.pixels().all(|p| *p == Rgba([30, 60, 100, 255])));
}

// =========================================================================
// Scenario 3: missing source becomes a placeholder in every format
// =========================================================================

#[test]
fn missing_source_placeholder_in_every_format() {
    let tmp = TempDir::new().unwrap();
    let (svc, _) = service(tmp.path());

    for format in [
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::Gif,
        OutputFormat::HighQualityJpeg,
    ] {
        let request = TransformRequest::new("missing.jpg", 200, 200, TransformMode::Fit, format);
        let bytes = svc.get(&request).unwrap();
        let pixels = decode(&bytes);
        assert_eq!(pixels.dimensions(), (200, 200), "{format:?}");
        if format == OutputFormat::Png {
            assert!(pixels.pixels().all(|p| *p == GRAY));
        }
    }
    assert!(svc.cache().store().is_empty());
}

#[test]
fn missing_source_on_cached_path_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let (svc, _) = service(tmp.path());
    let request = TransformRequest::new("late.png", 20, 20, TransformMode::Fit, OutputFormat::Png);

    assert!(matches!(
        svc.get_cached(&request),
        Err(ImagingError::NotFound(_))
    ));
    assert!(svc.cache().store().is_empty());

    // The source appears later and is picked up: nothing stale was cached
    write_png(&tmp.path().join("late.png"), 10, 10, [1, 2, 3, 255]);
    let pixels = decode(&svc.get_cached(&request).unwrap());
    assert_eq!(*pixels.get_pixel(10, 10), Rgba([1, 2, 3, 255]));
}

// =========================================================================
// Scenario 4: invalid background colour
// =========================================================================

#[test]
fn invalid_background_is_rejected_before_rendering() {
    let request = TransformRequest::new("src.png", 10, 10, TransformMode::Fit, OutputFormat::Png);
    assert_eq!(
        request.with_background_hex("GGGGGG"),
        Err(ImagingError::InvalidColor("GGGGGG".into()))
    );
}

// =========================================================================
// Cache behaviour
// =========================================================================

#[test]
fn cache_hit_returns_identical_bytes_and_slides() {
    let tmp = TempDir::new().unwrap();
    write_png(&tmp.path().join("a.png"), 300, 200, [10, 200, 30, 255]);
    let (svc, clock) = service(tmp.path());
    let request = TransformRequest::new(
        "a.png",
        100,
        100,
        TransformMode::FillCrop {
            anchor: Anchor::Left,
        },
        OutputFormat::Jpeg,
    );

    let first = svc.get_cached(&request).unwrap();
    clock.advance(Duration::from_secs(1000));
    let second = svc.get_cached(&request).unwrap();
    clock.advance(Duration::from_secs(1000));
    let third = svc.get_cached(&request).unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(svc.cache_stats().misses, 1);
    assert_eq!(svc.cache_stats().hits, 2);

    clock.advance(Duration::from_secs(1201));
    svc.get_cached(&request).unwrap();
    assert_eq!(svc.cache_stats().misses, 2);
}

#[test]
fn differently_anchored_requests_do_not_share_bytes() {
    let tmp = TempDir::new().unwrap();
    // Left half black, right half white
    let img = RgbaImage::from_fn(200, 100, |x, _| {
        if x < 100 { Rgba([0, 0, 0, 255]) } else { WHITE }
    });
    img.save_with_format(tmp.path().join("split.png"), image::ImageFormat::Png)
        .unwrap();
    let (svc, _) = service(tmp.path());

    let anchored = |anchor| {
        TransformRequest::new(
            "split.png",
            50,
            100,
            TransformMode::FillCrop { anchor },
            OutputFormat::Png,
        )
    };
    let left = decode(&svc.get_cached(&anchored(Anchor::Left)).unwrap());
    let right = decode(&svc.get_cached(&anchored(Anchor::Right)).unwrap());

    assert_eq!(*left.get_pixel(25, 50), Rgba([0, 0, 0, 255]));
    assert_eq!(*right.get_pixel(25, 50), WHITE);
    assert_eq!(svc.cache_stats().misses, 2);
}

#[test]
fn concurrent_identical_requests_render_once() {
    let tmp = TempDir::new().unwrap();
    write_jpeg(&tmp.path().join("big.jpg"), 1200, 900);
    let (svc, _) = service(tmp.path());
    let request = TransformRequest::new(
        "big.jpg",
        300,
        300,
        TransformMode::FillCrop {
            anchor: Anchor::Center,
        },
        OutputFormat::Png,
    );

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| svc.get_cached(&request))).collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    let stats = svc.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.total(), 8);
}

// =========================================================================
// Save for web / delete
// =========================================================================

#[test]
fn save_for_web_then_delete() {
    let tmp = TempDir::new().unwrap();
    write_jpeg(&tmp.path().join("huge.jpg"), 3200, 2400);
    let (svc, _) = service(tmp.path());
    let artifacts = FsArtifactStore::new(tmp.path().join("web"));

    let dims = svc.save_for_web("huge.jpg", "huge.png", &artifacts).unwrap();
    assert_eq!(dims, (1600, 1200));
    let saved = std::fs::read(tmp.path().join("web/huge.png")).unwrap();
    assert_eq!(decode(&saved).dimensions(), (1600, 1200));

    // Saving again replaces the artifact in place
    svc.save_for_web("huge.jpg", "huge.png", &artifacts).unwrap();

    svc.delete("huge.png", &artifacts).unwrap();
    assert!(!tmp.path().join("web/huge.png").exists());
    svc.delete("huge.png", &artifacts).unwrap();
}

#[test]
fn save_for_web_missing_source_fails() {
    let tmp = TempDir::new().unwrap();
    let (svc, _) = service(tmp.path());
    let artifacts = FsArtifactStore::new(tmp.path().join("web"));
    assert!(matches!(
        svc.save_for_web("nope.jpg", "nope.png", &artifacts),
        Err(ImagingError::SourceUnavailable(_))
    ));
    assert!(!tmp.path().join("web/nope.png").exists());
}
