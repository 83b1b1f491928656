//! Scene boundary detection and monolog synthesis.

use super::frames::{FrameStat, histogram_distance};
use crate::config::Config;
use crate::constants::visual;
use serde::{Deserialize, Serialize};

/// A detected or synthesized scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Face presence ratio in [0,1].
    pub face_ratio: f64,
    /// Average motion in [0,1].
    pub motion: f64,
    /// Brightness score in [0,1].
    pub brightness: f64,
    /// Whether this boundary was fabricated for a sparse-scene source.
    pub synthetic: bool,
}

impl Scene {
    /// Span length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A raw time span before signals are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSpan {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

/// Detect scene spans from sampled frame statistics.
///
/// A boundary opens where the luminance histogram distance between
/// consecutive samples exceeds the threshold. Short scenes merge into
/// their successor, long scenes split at equal offsets.
pub fn detect_spans(stats: &[FrameStat], duration: f64, config: &Config) -> Vec<SceneSpan> {
    let mut cuts: Vec<f64> = vec![0.0];
    for pair in stats.windows(2) {
        let distance = histogram_distance(&pair[0].histogram, &pair[1].histogram);
        if distance > config.visual.scene_threshold {
            cuts.push(pair[1].time);
        }
    }

    let mut spans: Vec<SceneSpan> = Vec::new();
    for (i, &start) in cuts.iter().enumerate() {
        let end = cuts.get(i + 1).copied().unwrap_or(duration);
        if end > start {
            spans.push(SceneSpan { start, end });
        }
    }

    let spans = merge_short(spans, config.visual.min_scene_seconds);
    split_long(spans, config.visual.max_scene_seconds)
}

/// Merge scenes shorter than `min_seconds` into their successor.
fn merge_short(spans: Vec<SceneSpan>, min_seconds: f64) -> Vec<SceneSpan> {
    let mut merged: Vec<SceneSpan> = Vec::with_capacity(spans.len());
    let mut carry_start: Option<f64> = None;

    let count = spans.len();
    for (i, span) in spans.into_iter().enumerate() {
        let start = carry_start.take().unwrap_or(span.start);
        let length = span.end - start;
        if length < min_seconds && i + 1 < count {
            // Too short: fold into the successor.
            carry_start = Some(start);
        } else {
            merged.push(SceneSpan {
                start,
                end: span.end,
            });
        }
    }

    // A trailing short scene has no successor; fold it backwards.
    if merged.len() > 1 {
        let last = merged[merged.len() - 1];
        if last.end - last.start < min_seconds {
            merged.pop();
            if let Some(prev) = merged.last_mut() {
                prev.end = last.end;
            }
        }
    }

    merged
}

/// Split scenes longer than `max_seconds` at equal offsets.
fn split_long(spans: Vec<SceneSpan>, max_seconds: f64) -> Vec<SceneSpan> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let length = span.end - span.start;
        if length <= max_seconds {
            out.push(span);
            continue;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let parts = (length / max_seconds).ceil() as usize;
        #[allow(clippy::cast_precision_loss)]
        let part_len = length / parts as f64;
        for p in 0..parts {
            #[allow(clippy::cast_precision_loss)]
            let start = (p as f64).mul_add(part_len, span.start);
            let end = if p + 1 == parts {
                span.end
            } else {
                start + part_len
            };
            out.push(SceneSpan { start, end });
        }
    }
    out
}

/// Whether the detected spans warrant monolog synthesis.
pub fn needs_monolog_synthesis(spans: &[SceneSpan], duration: f64) -> bool {
    if spans.len() < visual::MONOLOG_MIN_SCENES {
        return true;
    }
    #[allow(clippy::cast_precision_loss)]
    let per_minute = spans.len() as f64 / (duration / 60.0);
    per_minute <= visual::MONOLOG_SCENES_PER_MINUTE
}

/// Fabricate synthetic scenes tiling the entire source duration.
///
/// Window lengths rotate through 15/20/25/30 seconds to diversify clip
/// durations; each synthetic scene carries the talking-head prior signals.
pub fn synthesize_monolog(duration: f64, min_scene: f64) -> Vec<Scene> {
    let mut scenes = Vec::new();
    let mut offset = 0.0f64;
    let mut rotation = 0usize;

    while offset < duration {
        let window = visual::MONOLOG_WINDOWS[rotation % visual::MONOLOG_WINDOWS.len()];
        let end = (offset + window).min(duration);
        if end - offset >= min_scene {
            scenes.push(Scene {
                start: offset,
                end,
                face_ratio: visual::MONOLOG_FACE_RATIO,
                motion: visual::MONOLOG_MOTION,
                brightness: visual::MONOLOG_BRIGHTNESS,
                synthetic: true,
            });
        }
        offset = end;
        rotation += 1;
    }

    scenes
}
