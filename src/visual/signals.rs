//! Per-scene signal extraction.

use super::frames::FrameStat;
use super::scenes::{Scene, SceneSpan};
use crate::config::Config;
use crate::constants::visual;
use crate::error::Result;
use crate::subprocess::ToolInvocation;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Deadline for a single-frame extraction or detector run.
const FACE_PROBE_DEADLINE: Duration = Duration::from_secs(30);

/// Attach face/motion/brightness signals to a detected span.
///
/// Motion and brightness derive from up to five of the span's sampled
/// frames. Face counts come from the external detector when configured;
/// otherwise every detected scene carries the neutral face ratio.
pub fn attach_signals(
    config: &Config,
    source: &Path,
    work_dir: &Path,
    span: SceneSpan,
    stats: &[FrameStat],
    scene_index: usize,
) -> Scene {
    let chosen = pick_frames(stats, span);

    let motion = if chosen.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let mean_diff =
            chosen.iter().map(|s| s.diff_prev).sum::<f64>() / chosen.len() as f64;
        (mean_diff / visual::MOTION_FULL_SCALE).min(1.0)
    };

    let brightness = if chosen.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let mean_luma =
            chosen.iter().map(|s| s.mean_luma).sum::<f64>() / chosen.len() as f64;
        1.0 - (mean_luma - 127.0).abs() / 127.0
    };

    let face_ratio = config.visual.face_probe_bin.as_deref().map_or(
        visual::NEUTRAL_FACE_RATIO,
        |probe| {
            face_ratio_for(config, probe, source, work_dir, &chosen, scene_index)
                .unwrap_or(visual::NEUTRAL_FACE_RATIO)
        },
    );

    Scene {
        start: span.start,
        end: span.end,
        face_ratio,
        motion,
        brightness,
        synthetic: false,
    }
}

/// Pick up to five frames spread evenly across the span.
fn pick_frames(stats: &[FrameStat], span: SceneSpan) -> Vec<&FrameStat> {
    let in_span: Vec<&FrameStat> = stats
        .iter()
        .filter(|s| s.time >= span.start && s.time < span.end)
        .collect();
    if in_span.len() <= visual::FRAMES_PER_SCENE {
        return in_span;
    }
    let stride = in_span.len() / visual::FRAMES_PER_SCENE;
    in_span
        .iter()
        .step_by(stride.max(1))
        .take(visual::FRAMES_PER_SCENE)
        .copied()
        .collect()
}

#[derive(Debug, Deserialize)]
struct FaceReport {
    faces: u32,
}

/// Mean face count across the chosen frames, mapped to [0,1].
fn face_ratio_for(
    config: &Config,
    probe: &str,
    source: &Path,
    work_dir: &Path,
    chosen: &[&FrameStat],
    scene_index: usize,
) -> Option<f64> {
    if chosen.is_empty() {
        return None;
    }

    let mut counts: Vec<f64> = Vec::with_capacity(chosen.len());
    for (i, stat) in chosen.iter().enumerate() {
        let frame_path = work_dir.join(format!("face_{scene_index:04}_{i}.jpg"));
        match extract_frame(config, source, stat.time, &frame_path)
            .and_then(|()| run_detector(probe, &frame_path))
        {
            Ok(count) => counts.push(f64::from(count)),
            Err(e) => {
                warn!("face probe failed at {:.1}s: {e}", stat.time);
            }
        }
    }

    if counts.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    Some((mean / visual::FACES_FULL_SCALE).clamp(0.0, 1.0))
}

/// Extract one frame at `time` as a JPEG for the detector.
fn extract_frame(config: &Config, source: &Path, time: f64, out: &Path) -> Result<()> {
    let tool = ToolInvocation::new(
        &config.tools.ffmpeg,
        [
            "-y",
            "-v",
            "error",
            "-ss",
            &format!("{time:.3}"),
            "-i",
            &source.to_string_lossy(),
            "-frames:v",
            "1",
            "-q:v",
            "4",
            &out.to_string_lossy(),
        ],
    );
    tool.run(Some(FACE_PROBE_DEADLINE))?
        .ensure_success(&config.tools.ffmpeg)?;
    Ok(())
}

/// Run the external detector over one frame and parse its count report.
fn run_detector(probe: &str, frame: &Path) -> Result<u32> {
    let tool = ToolInvocation::new(probe, [frame.to_string_lossy().into_owned()]);
    let output = tool.run(Some(FACE_PROBE_DEADLINE))?.ensure_success(probe)?;
    let report: FaceReport = serde_json::from_str(output.stdout_str().trim()).map_err(|e| {
        crate::error::Error::ToolReport {
            program: probe.to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(report.faces)
}
