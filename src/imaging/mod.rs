//! Image geometry, compositing and encoding in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` (JPEG, PNG, GIF, TIFF, WebP) |
//! | **Resolution** | custom parser (JFIF APP0 + PNG `pHYs`) |
//! | **Resample** | `imageops::resize` (Catmull-Rom) over a mirrored, clipped window |
//! | **Encode** | `image` PNG / JPEG / GIF encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for destination geometry (unit testable)
//! - **Parameters**: Data structures describing a transform request
//! - **Backend**: [`SourceLoader`] / [`ArtifactStore`] traits + filesystem implementations
//! - **Compositor / Encoder**: canvas construction and byte encoding
//! - **Operations**: High-level functions combining the above with a loader

pub mod backend;
mod calculations;
mod compositor;
pub(crate) mod density;
mod encoder;
pub mod fs_backend;
pub mod operations;
mod params;
mod placeholder;
mod resample;

pub use backend::{ArtifactStore, ImageHandle, ImagingError, SourceLoader};
pub use calculations::{
    Rect, SourceRect, bounded_dimensions, fill_crop_rectangle, fit_rectangle,
    ratio_crop_rectangles, scale_factor, thumbnail_dimensions,
};
pub use compositor::{compose, downscale};
pub use encoder::{EncoderSettings, encode};
pub use fs_backend::{FsArtifactStore, FsSourceLoader, supported_input_extensions};
pub use params::{
    Anchor, CropRatios, OutputFormat, Quality, Resolution, Rgb, SourceRef, TransformMode,
    TransformRequest,
};
pub use placeholder::placeholder;
