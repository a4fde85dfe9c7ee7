//! High-level image operations.
//!
//! These functions combine calculations, compositing and encoding with a
//! [`SourceLoader`] / [`ArtifactStore`]. They take resolved settings and know
//! nothing about caching; [`ImageService`](crate::service::ImageService)
//! layers the cache and configuration on top.

use super::backend::{ArtifactStore, ImageHandle, ImagingError, SourceLoader};
use super::calculations::thumbnail_dimensions;
use super::compositor::{compose, downscale};
use super::encoder::{EncoderSettings, encode};
use super::params::{OutputFormat, Rgb, SourceRef, TransformRequest};
use super::placeholder::placeholder;
use log::{info, warn};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Composite and encode one request from an already loaded source.
pub fn transform(
    source: &ImageHandle,
    request: &TransformRequest,
    background: Rgb,
    settings: &EncoderSettings,
) -> Result<Vec<u8>> {
    let canvas = compose(source, request, background)?;
    encode(&canvas, request.format, settings)
}

/// Load the request's source. The placeholder source yields a
/// `placeholder_colour` canvas of the requested size.
pub fn load_source(
    loader: &impl SourceLoader,
    request: &TransformRequest,
    placeholder_colour: Rgb,
) -> Result<ImageHandle> {
    match &request.source {
        SourceRef::Placeholder => placeholder(request.width, request.height, placeholder_colour),
        SourceRef::Path(path) => loader.load(path),
    }
}

/// Load and composite `request`, substituting a placeholder canvas when the
/// source is unavailable. Other errors propagate.
pub fn render_or_placeholder(
    loader: &impl SourceLoader,
    request: &TransformRequest,
    placeholder_colour: Rgb,
    background: Rgb,
) -> Result<ImageHandle> {
    let source = match load_source(loader, request, placeholder_colour) {
        Ok(source) => source,
        Err(ImagingError::SourceUnavailable(reason)) => {
            warn!("{reason}; using placeholder");
            placeholder(request.width, request.height, placeholder_colour)?
        }
        Err(e) => return Err(e),
    };
    compose(&source, request, background)
}

/// Write a PNG copy of `source_id` with the longer edge bounded by
/// `max_dimension` to `target_id`, replacing any previous artifact.
///
/// A missing source is an error here; nothing is written.
pub fn save_for_web(
    loader: &impl SourceLoader,
    artifacts: &impl ArtifactStore,
    source_id: &str,
    target_id: &str,
    max_dimension: u32,
    settings: &EncoderSettings,
) -> Result<(u32, u32)> {
    let source = loader.load(source_id)?;
    let dimensions = thumbnail_dimensions(source.dimensions(), max_dimension)?;
    let scaled = downscale(&source, dimensions)?;
    let bytes = encode(&scaled, OutputFormat::Png, settings)?;
    artifacts.put(target_id, &bytes)?;
    info!(
        "saved {source_id} -> {target_id} ({}x{})",
        dimensions.0, dimensions.1
    );
    Ok(dimensions)
}
