//! CLI output formatting.
//!
//! Every command prints what it produced first and where it came from second:
//!
//! ```text
//! photos/a.jpg → out/a.png
//!     400x400 fit, png, 18.2 KB
//! ```
//!
//! Batch runs print one such block per job followed by a summary:
//!
//! ```text
//! Rendered 5 of 6 jobs
//!     Failed: gone.jpg → x.png: The image requested does not exist: gone.jpg
//! Cache: 3 cached, 1 coalesced, 2 rendered (6 total)
//! ```
//!
//! Format functions are pure and return lines; `main` does the printing.

use crate::batch::BatchOutcome;
use crate::cache::CacheStats;
use crate::imaging::{Anchor, TransformMode, TransformRequest};

/// Human-readable byte count.
pub fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn mode_label(mode: &TransformMode) -> String {
    match mode {
        TransformMode::Fit => "fit".into(),
        TransformMode::FillCrop { anchor } => format!("fill-crop ({})", anchor_label(*anchor)),
        TransformMode::RatioCrop(r) => format!(
            "ratio-crop ({},{},{},{})",
            r.width(),
            r.height(),
            r.left(),
            r.top()
        ),
        TransformMode::BoundedMax => "bounded-max".into(),
    }
}

fn anchor_label(anchor: Anchor) -> &'static str {
    match anchor {
        Anchor::Center => "center",
        Anchor::Top => "top",
        Anchor::Bottom => "bottom",
        Anchor::Left => "left",
        Anchor::Right => "right",
    }
}

/// Lines for one rendered request.
pub fn format_render(request: &TransformRequest, destination: &str, bytes: usize) -> Vec<String> {
    let mut lines = vec![
        format!("{} → {}", request.source, destination),
        format!(
            "    {}x{} {}, {}, {}",
            request.width,
            request.height,
            mode_label(&request.mode),
            request.format.extension(),
            format_bytes(bytes)
        ),
    ];
    if let Some(background) = request.background {
        lines.push(format!("    Background: {background}"));
    }
    lines
}

/// Line for a save-for-web copy.
pub fn format_saved(source: &str, target: &str, dimensions: (u32, u32)) -> String {
    format!("{source} → {target} ({}x{})", dimensions.0, dimensions.1)
}

/// One line per batch job.
pub fn format_batch_outcome(outcome: &BatchOutcome) -> String {
    match &outcome.result {
        Ok(bytes) => format!(
            "{} → {} ({})",
            outcome.source,
            outcome.output,
            format_bytes(*bytes)
        ),
        Err(e) => format!("{} → {}: {e}", outcome.source, outcome.output),
    }
}

/// Summary block for a finished batch.
pub fn format_batch_summary(outcomes: &[BatchOutcome], stats: &CacheStats) -> Vec<String> {
    let ok = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let mut lines = vec![format!("Rendered {ok} of {} jobs", outcomes.len())];
    for failed in outcomes.iter().filter(|o| o.result.is_err()) {
        lines.push(format!("    Failed: {}", format_batch_outcome(failed)));
    }
    lines.push(format!("Cache: {stats}"));
    lines
}
