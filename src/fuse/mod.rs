//! Scene and speech fusion into candidate windows.
//!
//! Each scene collects the speech segments intersecting its time range by
//! at least half a second; their text concatenates in time order. The
//! fused window inherits the scene's time range and visual signals, never
//! the speech union.

use crate::constants::FUSE_MIN_INTERSECT_SECONDS;
use crate::transcribe::SpeechSegment;
use crate::visual::Scene;
use serde::{Deserialize, Serialize};

/// A scene window with its overlapping speech, ready for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedSegment {
    /// Window start, inherited from the scene.
    pub start: f64,
    /// Window end, inherited from the scene.
    pub end: f64,
    /// Concatenated overlapping speech, single-space separated.
    pub text: String,
    /// Dominant language of the overlapping speech.
    pub language: String,
    /// Face presence ratio from the scene.
    pub face_ratio: f64,
    /// Motion score from the scene.
    pub motion: f64,
    /// Brightness score from the scene.
    pub brightness: f64,
    /// Whether the scene boundary was fabricated.
    pub synthetic: bool,
    /// Largest gap between consecutive speech segments, in seconds.
    pub max_speech_gap: f64,
    /// Mean confidence of the overlapping speech, 0 when silent.
    pub speech_confidence: f64,
}

impl FusedSegment {
    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Fuse scenes with overlapping speech into candidate windows.
///
/// Scenes without intersecting speech still produce a window with empty
/// text; the scorer gives those zero audio-axis scores.
pub fn fuse(scenes: &[Scene], speech: &[SpeechSegment]) -> Vec<FusedSegment> {
    scenes.iter().map(|scene| fuse_one(scene, speech)).collect()
}

fn fuse_one(scene: &Scene, speech: &[SpeechSegment]) -> FusedSegment {
    let overlapping: Vec<&SpeechSegment> = speech
        .iter()
        .filter(|s| intersection(s.start, s.end, scene.start, scene.end) >= FUSE_MIN_INTERSECT_SECONDS)
        .collect();

    let text = overlapping
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let max_speech_gap = overlapping
        .windows(2)
        .map(|pair| (pair[1].start - pair[0].end).max(0.0))
        .fold(0.0f64, f64::max);

    let speech_confidence = if overlapping.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        {
            overlapping.iter().map(|s| s.confidence).sum::<f64>() / overlapping.len() as f64
        }
    };

    let language = dominant_language(&overlapping);

    FusedSegment {
        start: scene.start,
        end: scene.end,
        text,
        language,
        face_ratio: scene.face_ratio,
        motion: scene.motion,
        brightness: scene.brightness,
        synthetic: scene.synthetic,
        max_speech_gap,
        speech_confidence,
    }
}

/// Seconds shared by two intervals.
pub fn intersection(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}

/// Language appearing in the most overlapping segments.
fn dominant_language(overlapping: &[&SpeechSegment]) -> String {
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for segment in overlapping {
        *counts.entry(segment.language.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map_or_else(|| "unknown".to_string(), |(tag, _)| tag.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn scene(start: f64, end: f64) -> Scene {
        Scene {
            start,
            end,
            face_ratio: 0.5,
            motion: 0.4,
            brightness: 0.8,
            synthetic: false,
        }
    }

    fn seg(start: f64, end: f64, text: &str) -> SpeechSegment {
        SpeechSegment {
            start,
            end,
            text: text.to_string(),
            confidence: 0.9,
            language: "en".to_string(),
        }
    }

    #[test]
    fn concatenates_overlapping_speech_in_order() {
        let scenes = vec![scene(0.0, 20.0)];
        let speech = vec![seg(1.0, 5.0, "first part"), seg(6.0, 12.0, "second part")];
        let fused = fuse(&scenes, &speech);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].text, "first part second part");
        assert_eq!(fused[0].max_speech_gap, 1.0);
        assert_eq!(fused[0].language, "en");
    }

    #[test]
    fn window_inherits_scene_range_not_speech_union() {
        let scenes = vec![scene(10.0, 30.0)];
        let speech = vec![seg(5.0, 15.0, "spills in from before")];
        let fused = fuse(&scenes, &speech);
        assert_eq!(fused[0].start, 10.0);
        assert_eq!(fused[0].end, 30.0);
    }

    #[test]
    fn requires_half_second_intersection() {
        let scenes = vec![scene(10.0, 20.0)];
        // Only 0.4s inside the scene: excluded.
        let speech = vec![seg(9.0, 10.4, "barely touches")];
        let fused = fuse(&scenes, &speech);
        assert!(fused[0].text.is_empty());
        assert_eq!(fused[0].speech_confidence, 0.0);
    }

    #[test]
    fn silent_scene_still_produces_a_window() {
        let scenes = vec![scene(0.0, 15.0)];
        let fused = fuse(&scenes, &[]);
        assert_eq!(fused.len(), 1);
        assert!(fused[0].text.is_empty());
        assert_eq!(fused[0].max_speech_gap, 0.0);
        assert_eq!(fused[0].language, "unknown");
    }

    #[test]
    fn signals_carry_over_verbatim() {
        let mut s = scene(0.0, 15.0);
        s.face_ratio = 0.9;
        s.synthetic = true;
        let fused = fuse(&[s], &[]);
        assert_eq!(fused[0].face_ratio, 0.9);
        assert!(fused[0].synthetic);
    }

    #[test]
    fn intersection_math() {
        assert_eq!(intersection(0.0, 10.0, 5.0, 15.0), 5.0);
        assert_eq!(intersection(0.0, 10.0, 10.0, 20.0), 0.0);
        assert_eq!(intersection(0.0, 10.0, 20.0, 30.0), 0.0);
    }
}
