//! Filesystem collaborators.
//!
//! | Concern | Implementation |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::load_from_memory` (format sniffed from bytes) |
//! | Source resolution | [`density::read_resolution`](super::density::read_resolution) |
//! | Artifact write | temp file + `rename` in the destination directory |
//!
//! Identifiers are paths relative to a root directory. Absolute paths and
//! `..` components are refused so an identifier can never escape the root.

use super::backend::{ArtifactStore, ImageHandle, ImagingError, SourceLoader};
use super::density::read_resolution;
use image::ImageFormat;
use log::debug;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

const SOURCE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SOURCE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Source file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Join `id` onto `root`, refusing identifiers that would leave it.
fn resolve(root: &Path, id: &str) -> Option<PathBuf> {
    let relative = Path::new(id);
    let safe = !id.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| root.join(relative))
}

/// Loads sources from files under a root directory.
#[derive(Debug, Clone)]
pub struct FsSourceLoader {
    root: PathBuf,
}

impl FsSourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceLoader for FsSourceLoader {
    fn load(&self, id: &str) -> Result<ImageHandle, ImagingError> {
        let unavailable =
            |reason: String| ImagingError::SourceUnavailable(format!("{id}: {reason}"));

        let path = resolve(&self.root, id).ok_or_else(|| unavailable("invalid path".into()))?;
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| supported_input_extensions().contains(&e.to_lowercase().as_str()));
        if !supported {
            return Err(unavailable("unsupported file type".into()));
        }

        let data = std::fs::read(&path).map_err(|e| unavailable(e.to_string()))?;
        let decoded = image::load_from_memory(&data)
            .map_err(|e| unavailable(format!("failed to decode: {e}")))?;
        let resolution = read_resolution(&data).unwrap_or_default();

        debug!(
            "loaded {} ({}x{}, {} dpi)",
            path.display(),
            decoded.width(),
            decoded.height(),
            resolution.horizontal
        );
        Ok(ImageHandle::new(decoded.to_rgba8(), resolution))
    }
}

/// Stores artifacts as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, ImagingError> {
        resolve(&self.root, id)
            .ok_or_else(|| ImagingError::Io(format!("invalid artifact path '{id}'")))
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write via a sibling temp file and rename, so readers never see a partial file.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "missing file name"))?;
    let tmp = path.with_file_name(format!(
        ".{file_name}.{}.{}.part",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), ImagingError> {
        let path = self.path_for(id)?;
        atomic_write(&path, bytes)?;
        debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), ImagingError> {
        let path = self.path_for(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
