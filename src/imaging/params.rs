//! Parameter types for image transforms.
//!
//! These types describe *what* to produce, not *how*. A [`TransformRequest`]
//! is both the input of the compositing pipeline and, once fingerprinted, the
//! key of the derived-image cache, so every field here that changes output
//! bytes must also feed [`Fingerprint`](crate::cache::Fingerprint).
//!
//! ## Types
//!
//! - [`TransformMode`]: closed set of geometry modes, dispatched once at the
//!   top of the pipeline.
//! - [`Anchor`]: which edge survives a fill-crop on the overflowing axis.
//! - [`CropRatios`]: fractional source selection for ratio crops, validated on construction.
//! - [`OutputFormat`]: byte encoding of the result.
//! - [`Quality`]: lossy encoding quality (1–100). Clamped on construction.
//! - [`Rgb`]: background colour parsed from `RRGGBB`.
//! - [`SourceRef`]: a source path or the explicit placeholder sentinel.
//! - [`Resolution`]: horizontal/vertical DPI carried from source to output.

use super::backend::ImagingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Physical resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub horizontal: f32,
    pub vertical: f32,
}

impl Resolution {
    pub const fn dpi(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::dpi(96.0, 96.0)
    }
}

/// Edge (or centre) of the overflowing axis that stays visible in a fill-crop.
///
/// An anchor only affects the non-binding axis: `Top`/`Bottom` matter when the
/// scaled image is too tall, `Left`/`Right` when it is too wide. An anchor
/// naming the other axis behaves like `Center`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl Anchor {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Anchor::Center => 0,
            Anchor::Top => 1,
            Anchor::Bottom => 2,
            Anchor::Left => 3,
            Anchor::Right => 4,
        }
    }
}

impl FromStr for Anchor {
    type Err = ImagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "center" | "centre" => Ok(Anchor::Center),
            "top" => Ok(Anchor::Top),
            "bottom" => Ok(Anchor::Bottom),
            "left" => Ok(Anchor::Left),
            "right" => Ok(Anchor::Right),
            other => Err(ImagingError::InvalidGeometry(format!(
                "unknown anchor '{other}' (expected center, top, bottom, left or right)"
            ))),
        }
    }
}

/// Fractional selection of a source image for ratio crops.
///
/// All four values are fractions of the source size in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCropRatios")]
pub struct CropRatios {
    width: f64,
    height: f64,
    left: f64,
    top: f64,
}

#[derive(Deserialize)]
struct RawCropRatios {
    width: f64,
    height: f64,
    left: f64,
    top: f64,
}

impl TryFrom<RawCropRatios> for CropRatios {
    type Error = ImagingError;

    fn try_from(raw: RawCropRatios) -> Result<Self, Self::Error> {
        CropRatios::new(raw.width, raw.height, raw.left, raw.top)
    }
}

impl CropRatios {
    /// Validate and build a selection. Each ratio must be finite and in `[0, 1]`.
    pub fn new(width: f64, height: f64, left: f64, top: f64) -> Result<Self, ImagingError> {
        for (name, value) in [
            ("width", width),
            ("height", height),
            ("left", left),
            ("top", top),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ImagingError::InvalidGeometry(format!(
                    "crop {name} ratio {value} is outside [0, 1]"
                )));
            }
        }
        Ok(Self {
            width,
            height,
            left,
            top,
        })
    }

    /// The whole source: no crop.
    pub fn full() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            left: 0.0,
            top: 0.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn top(&self) -> f64 {
        self.top
    }
}

/// Parses `width,height,left,top`, e.g. `0.5,0.5,0.25,0`.
impl FromStr for CropRatios {
    type Err = ImagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| ImagingError::InvalidGeometry(format!("bad crop ratios '{s}': {e}")))?;
        match values.as_slice() {
            [width, height, left, top] => CropRatios::new(*width, *height, *left, *top),
            _ => Err(ImagingError::InvalidGeometry(format!(
                "expected four crop ratios (width,height,left,top), got '{s}'"
            ))),
        }
    }
}

/// Geometry mode of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransformMode {
    /// Scale to fit inside the target, letterboxing with the background.
    Fit,
    /// Scale to cover the target, clipping overflow according to the anchor.
    FillCrop {
        #[serde(default)]
        anchor: Anchor,
    },
    /// Stretch a fractional source region onto the whole target.
    RatioCrop(CropRatios),
    /// Scale into the target box preserving aspect ratio, never upscaling.
    /// The canvas takes the scaled size rather than the box size.
    BoundedMax,
}

/// Byte encoding of a composited canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Gif,
    #[serde(alias = "hq-jpeg")]
    HighQualityJpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg | OutputFormat::HighQualityJpeg => "jpg",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg | OutputFormat::HighQualityJpeg => "image/jpeg",
            OutputFormat::Gif => "image/gif",
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            OutputFormat::Png => 0,
            OutputFormat::Jpeg => 1,
            OutputFormat::Gif => 2,
            OutputFormat::HighQualityJpeg => 3,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ImagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "gif" => Ok(OutputFormat::Gif),
            "hq-jpeg" | "high-quality-jpeg" => Ok(OutputFormat::HighQualityJpeg),
            _ => Err(ImagingError::UnknownFormat(s.to_string())),
        }
    }
}

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);
    pub const GRAY: Rgb = Rgb::new(0x80, 0x80, 0x80);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse exactly six hexadecimal digits, e.g. `AABB22`.
    pub fn from_hex(hex: &str) -> Result<Self, ImagingError> {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ImagingError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ImagingError::InvalidColor(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 0xFF])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ImagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::from_hex(s)
    }
}

impl TryFrom<String> for Rgb {
    type Error = ImagingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Where the source pixels come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceRef {
    /// No source: render the placeholder. Spelled `Default` in string form.
    Placeholder,
    /// A path resolved by the [`SourceLoader`](super::SourceLoader).
    Path(String),
}

impl SourceRef {
    pub const PLACEHOLDER_NAME: &'static str = "Default";

    pub fn path(path: impl Into<String>) -> Self {
        SourceRef::Path(path.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceRef::Placeholder => Self::PLACEHOLDER_NAME,
            SourceRef::Path(path) => path,
        }
    }
}

impl From<String> for SourceRef {
    fn from(value: String) -> Self {
        if value == Self::PLACEHOLDER_NAME {
            SourceRef::Placeholder
        } else {
            SourceRef::Path(value)
        }
    }
}

impl From<&str> for SourceRef {
    fn from(value: &str) -> Self {
        SourceRef::from(value.to_string())
    }
}

impl From<SourceRef> for String {
    fn from(value: SourceRef) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full specification of one derived image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub source: SourceRef,
    pub width: u32,
    pub height: u32,
    pub mode: TransformMode,
    /// `None` uses the configured default background.
    #[serde(default)]
    pub background: Option<Rgb>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl TransformRequest {
    pub fn new(
        source: impl Into<SourceRef>,
        width: u32,
        height: u32,
        mode: TransformMode,
        format: OutputFormat,
    ) -> Self {
        Self {
            source: source.into(),
            width,
            height,
            mode,
            background: None,
            format,
        }
    }

    pub fn with_background(mut self, colour: Rgb) -> Self {
        self.background = Some(colour);
        self
    }

    /// Set the background from a hex string; rejects anything but six hex digits.
    pub fn with_background_hex(self, hex: &str) -> Result<Self, ImagingError> {
        Ok(self.with_background(Rgb::from_hex(hex)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    // =========================================================================
    // Rgb
    // =========================================================================

    #[test]
    fn rgb_parses_mixed_case_hex() {
        assert_eq!(Rgb::from_hex("aAbB22").unwrap(), Rgb::new(0xAA, 0xBB, 0x22));
    }

    #[test]
    fn rgb_rejects_non_hex_digits() {
        assert_eq!(
            Rgb::from_hex("GGGGGG"),
            Err(ImagingError::InvalidColor("GGGGGG".into()))
        );
    }

    #[test]
    fn rgb_rejects_wrong_length() {
        assert!(Rgb::from_hex("FFF").is_err());
        assert!(Rgb::from_hex("#FFFFFF").is_err());
        assert!(Rgb::from_hex("").is_err());
    }

    #[test]
    fn rgb_rejects_multibyte_input_of_six_bytes() {
        // "ééé" is six bytes but not six hex digits
        assert!(Rgb::from_hex("ééé").is_err());
    }

    #[test]
    fn rgb_display_is_uppercase_hex() {
        assert_eq!(Rgb::new(1, 0xAB, 0xFF).to_string(), "01ABFF");
    }

    // =========================================================================
    // CropRatios
    // =========================================================================

    #[test]
    fn crop_ratios_reject_out_of_range() {
        assert!(CropRatios::new(1.5, 1.0, 0.0, 0.0).is_err());
        assert!(CropRatios::new(1.0, 1.0, -0.1, 0.0).is_err());
        assert!(CropRatios::new(f64::NAN, 1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn crop_ratios_parse_from_csv() {
        let ratios: CropRatios = "0.5, 0.25,0.1,0".parse().unwrap();
        assert_eq!(ratios.width(), 0.5);
        assert_eq!(ratios.height(), 0.25);
        assert_eq!(ratios.left(), 0.1);
        assert_eq!(ratios.top(), 0.0);
    }

    #[test]
    fn crop_ratios_parse_requires_four_values() {
        assert!("0.5,0.5".parse::<CropRatios>().is_err());
    }

    // =========================================================================
    // Enums and sources
    // =========================================================================

    #[test]
    fn anchor_parses_case_insensitively() {
        assert_eq!("TOP".parse::<Anchor>().unwrap(), Anchor::Top);
        assert!("middle".parse::<Anchor>().is_err());
    }

    #[test]
    fn output_format_aliases() {
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!(
            "hq-jpeg".parse::<OutputFormat>().unwrap(),
            OutputFormat::HighQualityJpeg
        );
    }

    #[test]
    fn output_format_json_accepts_cli_spellings() {
        for (json, format) in [
            (r#""png""#, OutputFormat::Png),
            (r#""jpeg""#, OutputFormat::Jpeg),
            (r#""jpg""#, OutputFormat::Jpeg),
            (r#""gif""#, OutputFormat::Gif),
            (r#""hq-jpeg""#, OutputFormat::HighQualityJpeg),
            (r#""high-quality-jpeg""#, OutputFormat::HighQualityJpeg),
        ] {
            assert_eq!(serde_json::from_str::<OutputFormat>(json).unwrap(), format, "{json}");
        }
    }

    #[test]
    fn unknown_output_format_is_its_own_error() {
        assert_eq!(
            "webp".parse::<OutputFormat>(),
            Err(ImagingError::UnknownFormat("webp".into()))
        );
    }

    #[test]
    fn default_string_is_placeholder_source() {
        assert_eq!(SourceRef::from("Default"), SourceRef::Placeholder);
        assert_eq!(
            SourceRef::from("photos/a.jpg"),
            SourceRef::Path("photos/a.jpg".into())
        );
    }

    #[test]
    fn request_with_invalid_background_is_rejected() {
        let request = TransformRequest::new(
            "a.jpg",
            10,
            10,
            TransformMode::Fit,
            OutputFormat::Png,
        );
        assert!(matches!(
            request.with_background_hex("12345"),
            Err(ImagingError::InvalidColor(_))
        ));
    }

    #[test]
    fn request_deserializes_from_json() {
        let json = r#"{
            "source": "photos/a.jpg",
            "width": 200,
            "height": 100,
            "mode": {"type": "fill-crop", "anchor": "top"},
            "background": "102030",
            "format": "high-quality-jpeg"
        }"#;
        let request: TransformRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.source, SourceRef::path("photos/a.jpg"));
        assert_eq!(
            request.mode,
            TransformMode::FillCrop {
                anchor: Anchor::Top
            }
        );
        assert_eq!(request.background, Some(Rgb::new(0x10, 0x20, 0x30)));
        assert_eq!(request.format, OutputFormat::HighQualityJpeg);
    }

    #[test]
    fn request_json_rejects_bad_ratios() {
        let json = r#"{
            "source": "Default",
            "width": 20,
            "height": 20,
            "mode": {"type": "ratio-crop", "width": 2.0, "height": 1.0, "left": 0.0, "top": 0.0}
        }"#;
        assert!(serde_json::from_str::<TransformRequest>(json).is_err());
    }
}
