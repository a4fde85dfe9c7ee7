//! Parallel batch rendering through one shared cache.
//!
//! A batch file is a JSON array of jobs, each naming a request and where to
//! write the result:
//!
//! ```json
//! [
//!   {
//!     "output": "thumbs/a.png",
//!     "request": {
//!       "source": "photos/a.jpg",
//!       "width": 400,
//!       "height": 400,
//!       "mode": { "type": "fill-crop", "anchor": "top" },
//!       "format": "png"
//!     }
//!   }
//! ]
//! ```
//!
//! Jobs run on the rayon pool. Identical requests anywhere in the batch are
//! rendered once; the rest are served from (or wait on) the cache.

use crate::cache::CacheStore;
use crate::imaging::{ArtifactStore, ImagingError, SourceLoader, TransformRequest};
use crate::service::ImageService;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::Path;

/// One entry of a batch file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchJob {
    pub output: String,
    pub request: TransformRequest,
}

/// What happened to one job: bytes written, or why not.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub source: String,
    pub output: String,
    pub result: Result<usize, ImagingError>,
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Batch file error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a batch file.
pub fn load_jobs(path: &Path) -> Result<Vec<BatchJob>, BatchError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Render every job through `service`'s cache and store the bytes.
///
/// Outcomes come back in job order. A failing job does not stop the others.
pub fn run_batch<L, S, A>(
    service: &ImageService<L, S>,
    jobs: &[BatchJob],
    artifacts: &A,
) -> Vec<BatchOutcome>
where
    L: SourceLoader,
    S: CacheStore,
    A: ArtifactStore,
{
    jobs.par_iter()
        .map(|job| {
            let result = service.get_cached(&job.request).and_then(|bytes| {
                artifacts.put(&job.output, &bytes)?;
                Ok(bytes.len())
            });
            BatchOutcome {
                source: job.request.source.to_string(),
                output: job.output.clone(),
                result,
            }
        })
        .collect()
}
