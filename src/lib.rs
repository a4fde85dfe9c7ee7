//! # imagecache
//!
//! On-demand derived images: take a source picture and a target size, fit,
//! fill-crop, ratio-crop or bound it onto a canvas, encode the result, and
//! keep the bytes in a sliding-expiration cache so the next identical
//! request is free.
//!
//! # Architecture: Request → Canvas → Bytes
//!
//! ```text
//! TransformRequest ──► Fingerprint ──► cache hit? ──► bytes
//!                                         │ miss (single flight)
//!                                         ▼
//!                    SourceLoader ──► compose ──► encode ──► cache.put
//! ```
//!
//! Geometry is pure and tested without pixels. Compositing only borrows its
//! source and always allocates a fresh canvas, so the engine is reentrant;
//! the cache is the only shared mutable state.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry, resampling, compositing, encoding, filesystem collaborators |
//! | [`cache`] | Request fingerprints, sliding-expiration store, single-flight coordination |
//! | [`service`] | [`ImageService`](service::ImageService): the operations callers use |
//! | [`batch`] | Parallel rendering of a JSON job list through one shared cache |
//! | [`config`] | `imagecache.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Missing Sources
//!
//! A source that cannot be loaded becomes a gray placeholder of the
//! requested size on every uncached path, so pages never show broken
//! images. The cached path reports `NotFound` instead and stores nothing: a
//! placeholder is never cached, so a source that appears later is picked up
//! on the next request. Requesting the placeholder by name (`"Default"`) is
//! an ordinary cached request.
//!
//! ## One Fingerprint per Output
//!
//! The cache key covers every field that changes the bytes, including
//! anchor, crop ratios and background, so two different outputs can never
//! share an entry.
//!
//! ## Mirrored Edges
//!
//! Resampling reflects coordinates at the edges of the sampled region
//! instead of clamping or padding with transparency. Downscaled photos keep
//! clean borders with no dark fringe.

pub mod batch;
pub mod cache;
pub mod config;
pub mod imaging;
pub mod output;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;
