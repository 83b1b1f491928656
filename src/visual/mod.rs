//! Visual activity analysis.
//!
//! Operates on the video stream independently of audio: scene boundaries
//! from luminance histogram distances, per-scene face/motion/brightness
//! signals, and synthetic scene fabrication for sparse-scene ("monolog")
//! sources.

mod frames;
mod scenes;
mod signals;

pub use frames::{FrameStat, fold_plane, histogram_distance, sampling_rate};
pub use scenes::{Scene, SceneSpan, detect_spans, needs_monolog_synthesis, synthesize_monolog};
pub use signals::attach_signals;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::probe::MediaInfo;
use std::path::Path;
use tracing::{debug, info};

/// Analyze the video stream into scenes with signals.
pub fn analyze(
    config: &Config,
    source: &Path,
    media: &MediaInfo,
    work_dir: &Path,
) -> Result<Vec<Scene>> {
    let stats = frames::sample_frames(config, source, media)?;
    let spans = scenes::detect_spans(&stats, media.duration, config);
    debug!("detected {} scene spans", spans.len());

    let mut result: Vec<Scene> = spans
        .iter()
        .enumerate()
        .map(|(i, &span)| signals::attach_signals(config, source, work_dir, span, &stats, i))
        .collect();

    if scenes::needs_monolog_synthesis(&spans, media.duration) {
        let synthetic = scenes::synthesize_monolog(media.duration, config.clips.min_seconds);
        info!(
            "sparse scene structure ({} detected), appending {} synthetic scenes",
            spans.len(),
            synthetic.len()
        );
        result.extend(synthetic);
    }

    if result.is_empty() {
        return Err(Error::VisualAnalysisFailed {
            reason: format!(
                "no scenes produced for a {:.1}s source, even after synthesis",
                media.duration
            ),
        });
    }

    Ok(result)
}
