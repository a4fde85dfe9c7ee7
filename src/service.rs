//! Request-level operations.
//!
//! [`ImageService`] owns a source loader, the derived-image cache and the
//! engine configuration. Each public method is one operation callers can
//! ask for:
//!
//! | Operation | Cached | Missing source |
//! |---|---|---|
//! | [`render`](ImageService::render) | no | placeholder |
//! | [`get`](ImageService::get) | no | placeholder |
//! | [`get_cached`](ImageService::get_cached) | yes | `NotFound` |
//! | [`get_and_crop`](ImageService::get_and_crop) | no | placeholder |
//! | [`get_bounded`](ImageService::get_bounded) | no | placeholder |
//! | [`save_for_web`](ImageService::save_for_web) | no | `SourceUnavailable` |
//!
//! A substituted placeholder is never written to the cache. Asking for the
//! placeholder explicitly ([`SourceRef::Placeholder`]) is an ordinary request
//! and is cached like any other.

use crate::cache::{CacheStats, CacheStore, DerivedImageCache, Fingerprint};
use crate::config::EngineConfig;
use crate::imaging::operations;
use crate::imaging::{
    ArtifactStore, CropRatios, ImageHandle, ImagingError, OutputFormat, Rgb, SourceLoader,
    SourceRef, TransformMode, TransformRequest, encode,
};
use log::{debug, info};
use std::sync::Arc;

pub struct ImageService<L: SourceLoader, S: CacheStore> {
    loader: L,
    cache: DerivedImageCache<S>,
    config: EngineConfig,
}

impl<L: SourceLoader, S: CacheStore> ImageService<L, S> {
    pub fn new(loader: L, cache: DerivedImageCache<S>, config: EngineConfig) -> Self {
        Self {
            loader,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &DerivedImageCache<S> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn background(&self, request: &TransformRequest) -> Rgb {
        request.background.unwrap_or(self.config.colors.background)
    }

    /// Composite `request` without encoding, substituting a placeholder for
    /// a source that cannot be loaded.
    pub fn render(&self, request: &TransformRequest) -> Result<ImageHandle, ImagingError> {
        operations::render_or_placeholder(
            &self.loader,
            request,
            self.config.colors.placeholder,
            self.background(request),
        )
    }

    /// Render and encode `request`, bypassing the cache.
    pub fn get(&self, request: &TransformRequest) -> Result<Vec<u8>, ImagingError> {
        let canvas = self.render(request)?;
        encode(&canvas, request.format, &self.config.encoder_settings())
    }

    /// Encoded bytes for `request` through the derived-image cache.
    ///
    /// A missing source is [`ImagingError::NotFound`] and nothing is stored.
    pub fn get_cached(&self, request: &TransformRequest) -> Result<Arc<[u8]>, ImagingError> {
        let background = self.background(request);
        let key = Fingerprint::of(request, background);
        self.cache.get_or_compute(&key, || {
            let source =
                operations::load_source(&self.loader, request, self.config.colors.placeholder)
                    .map_err(|e| match e {
                        ImagingError::SourceUnavailable(reason) => ImagingError::NotFound(reason),
                        other => other,
                    })?;
            debug!("rendering {} for {key}", request.source);
            operations::transform(
                &source,
                request,
                background,
                &self.config.encoder_settings(),
            )
        })
    }

    /// Stretch a fractional region of `source` onto a `width × height` canvas.
    pub fn get_and_crop(
        &self,
        source: impl Into<SourceRef>,
        width: u32,
        height: u32,
        ratios: CropRatios,
        format: OutputFormat,
    ) -> Result<Vec<u8>, ImagingError> {
        let request =
            TransformRequest::new(source, width, height, TransformMode::RatioCrop(ratios), format);
        self.get(&request)
    }

    /// Scale `source` so neither side exceeds `max_side`, never upscaling.
    pub fn get_bounded(
        &self,
        source: impl Into<SourceRef>,
        max_side: u32,
        format: OutputFormat,
    ) -> Result<Vec<u8>, ImagingError> {
        let request =
            TransformRequest::new(source, max_side, max_side, TransformMode::BoundedMax, format);
        self.get(&request)
    }

    /// Write a PNG copy of `source_id`, longer edge bounded by
    /// `max_image_dimension`, to `target_id`. Returns the written size.
    pub fn save_for_web(
        &self,
        source_id: &str,
        target_id: &str,
        artifacts: &impl ArtifactStore,
    ) -> Result<(u32, u32), ImagingError> {
        operations::save_for_web(
            &self.loader,
            artifacts,
            source_id,
            target_id,
            self.config.max_image_dimension,
            &self.config.encoder_settings(),
        )
    }

    /// Remove a previously saved artifact. Missing artifacts are not an error.
    pub fn delete(
        &self,
        target_id: &str,
        artifacts: &impl ArtifactStore,
    ) -> Result<(), ImagingError> {
        artifacts.delete(target_id)?;
        info!("deleted {target_id}");
        Ok(())
    }
}
