//! Canvas → bytes in the requested format.
//!
//! | Format | Encoder | Notes |
//! |---|---|---|
//! | PNG | `PngEncoder` | lossless RGBA, deterministic |
//! | JPEG | `JpegEncoder` | RGB flattened onto white, DPI in JFIF |
//! | High-quality JPEG | `JpegEncoder` | same, higher quality |
//! | GIF | `GifEncoder` | single frame, NeuQuant palette |
//!
//! PNG and GIF output do not carry the canvas resolution.

use super::backend::{ImageHandle, ImagingError};
use super::params::{OutputFormat, Quality};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

/// JPEG qualities for the two JPEG output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub jpeg_quality: Quality,
    pub high_quality_jpeg_quality: Quality,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: Quality::new(75),
            high_quality_jpeg_quality: Quality::new(95),
        }
    }
}

fn encoding_error(format: OutputFormat) -> impl Fn(image::ImageError) -> ImagingError {
    move |e| ImagingError::EncodingFailure(format!("{}: {e}", format.extension()))
}

/// Encode `image` as `format`.
pub fn encode(
    image: &ImageHandle,
    format: OutputFormat,
    settings: &EncoderSettings,
) -> Result<Vec<u8>, ImagingError> {
    let (width, height) = image.dimensions();
    let mut buf = Vec::new();

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buf)
                .write_image(image.pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(encoding_error(format))?;
        }
        OutputFormat::Jpeg | OutputFormat::HighQualityJpeg => {
            let quality = if format == OutputFormat::Jpeg {
                settings.jpeg_quality
            } else {
                settings.high_quality_jpeg_quality
            };
            let rgb = flatten_onto_white(&image.pixels);
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.value());
            encoder.set_pixel_density(PixelDensity {
                density: (
                    density_field(image.resolution.horizontal),
                    density_field(image.resolution.vertical),
                ),
                unit: PixelDensityUnit::Inches,
            });
            encoder
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(encoding_error(format))?;
        }
        OutputFormat::Gif => {
            // Encoder must drop before `buf` is read so the trailer is written
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .encode(image.pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(encoding_error(format))?;
        }
    }

    Ok(buf)
}

fn density_field(dpi: f32) -> u16 {
    dpi.round().clamp(1.0, u16::MAX as f32) as u16
}

/// JPEG has no alpha channel.
fn flatten_onto_white(pixels: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(pixels.width(), pixels.height(), |x, y| {
        let p = pixels.get_pixel(x, y);
        let a = p[3] as u32;
        let channel = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([channel(p[0]), channel(p[1]), channel(p[2])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::density::read_resolution;
    use crate::imaging::params::{Resolution, Rgb};
    use crate::imaging::placeholder::placeholder;

    fn gradient(width: u32, height: u32) -> ImageHandle {
        ImageHandle::new(
            RgbaImage::from_fn(width, height, |x, y| {
                image::Rgba([(x * 3) as u8, (y * 2) as u8, 128, 255])
            }),
            Resolution::default(),
        )
    }

    #[test]
    fn every_format_encodes_placeholder() {
        let image = placeholder(200, 200, Rgb::GRAY).unwrap();
        let settings = EncoderSettings::default();
        for format in [
            OutputFormat::Png,
            OutputFormat::Jpeg,
            OutputFormat::Gif,
            OutputFormat::HighQualityJpeg,
        ] {
            let bytes = encode(&image, format, &settings).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(
                (decoded.width(), decoded.height()),
                (200, 200),
                "{format:?}"
            );
            let sniffed = image::guess_format(&bytes).unwrap();
            assert_eq!(sniffed.to_mime_type(), format.mime_type());
        }
    }

    #[test]
    fn png_is_lossless_and_deterministic() {
        let image = gradient(60, 40);
        let settings = EncoderSettings::default();
        let bytes = encode(&image, OutputFormat::Png, &settings).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, image.pixels);

        let again = encode(
            &ImageHandle::new(decoded, Resolution::default()),
            OutputFormat::Png,
            &settings,
        )
        .unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn jpeg_carries_resolution() {
        let mut image = gradient(32, 32);
        image.resolution = Resolution::dpi(300.0, 300.0);
        let bytes = encode(&image, OutputFormat::Jpeg, &EncoderSettings::default()).unwrap();
        assert_eq!(read_resolution(&bytes), Some(Resolution::dpi(300.0, 300.0)));
    }

    #[test]
    fn high_quality_jpeg_is_larger() {
        let image = gradient(128, 128);
        let settings = EncoderSettings {
            jpeg_quality: Quality::new(20),
            high_quality_jpeg_quality: Quality::new(95),
        };
        let low = encode(&image, OutputFormat::Jpeg, &settings).unwrap();
        let high = encode(&image, OutputFormat::HighQualityJpeg, &settings).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn flatten_composites_transparency_onto_white() {
        let pixels = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 0]));
        assert_eq!(*flatten_onto_white(&pixels).get_pixel(0, 0), image::Rgb([255; 3]));

        let pixels = RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]));
        assert_eq!(
            *flatten_onto_white(&pixels).get_pixel(0, 0),
            image::Rgb([10, 20, 30])
        );
    }
}
