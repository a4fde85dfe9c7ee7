//! Collaborator seams and shared types.
//!
//! The engine never touches the filesystem itself. It talks to two traits:
//!
//! - [`SourceLoader`] resolves a source identifier and decodes it into an
//!   [`ImageHandle`], or reports that it cannot.
//! - [`ArtifactStore`] persists encoded bytes under an identifier, replacing
//!   any previous artifact atomically.
//!
//! The production implementations live in
//! [`fs_backend`](super::fs_backend). Tests use the recording mocks in this
//! module so they run without touching disk.

use super::params::Resolution;
use image::RgbaImage;
use thiserror::Error;

/// Errors produced by the engine and its collaborators.
///
/// `Clone` so a single-flight leader can hand the same outcome to every
/// waiting caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImagingError {
    #[error("Invalid colour '{0}': expected six hexadecimal digits, e.g. 'AABB22'")]
    InvalidColor(String),
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("The image requested does not exist: {0}")]
    NotFound(String),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Encoding failed: {0}")]
    EncodingFailure(String),
    #[error("Unknown output format '{0}': expected png, jpeg, gif or hq-jpeg")]
    UnknownFormat(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ImagingError {
    fn from(err: std::io::Error) -> Self {
        ImagingError::Io(err.to_string())
    }
}

/// A decoded raster plus the resolution metadata carried into derived images.
///
/// Owned by whichever stage currently holds it; the compositor only borrows
/// its input and always allocates a fresh canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    pub pixels: RgbaImage,
    pub resolution: Resolution,
}

impl ImageHandle {
    pub fn new(pixels: RgbaImage, resolution: Resolution) -> Self {
        Self { pixels, resolution }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Resolves and decodes source images.
pub trait SourceLoader: Sync {
    /// Load a source. Missing or undecodable sources are reported as
    /// [`ImagingError::SourceUnavailable`]; callers decide whether to fall
    /// back to a placeholder.
    fn load(&self, id: &str) -> Result<ImageHandle, ImagingError>;
}

/// Persists encoded artifacts (the SaveForWeb destination).
pub trait ArtifactStore: Sync {
    /// Write `bytes` under `id`, atomically replacing any existing artifact.
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), ImagingError>;

    /// Remove the artifact under `id`. Removing a missing artifact is not an error.
    fn delete(&self, id: &str) -> Result<(), ImagingError>;
}
