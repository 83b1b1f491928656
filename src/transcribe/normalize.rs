//! Speech segment normalization.

use super::SpeechSegment;
use crate::constants::MAX_SPEECH_OVERLAP_SECONDS;

/// Normalize a decoded segment list.
///
/// Whitespace-only segments are dropped, segments are sorted by start, and
/// overlaps beyond 50 ms are resolved by truncating the earlier segment's
/// end.
pub fn normalize(mut segments: Vec<SpeechSegment>) -> Vec<SpeechSegment> {
    segments.retain(|s| !s.text.trim().is_empty());
    segments.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for i in 1..segments.len() {
        let next_start = segments[i].start;
        let prev = &mut segments[i - 1];
        if prev.end - next_start > MAX_SPEECH_OVERLAP_SECONDS {
            prev.end = next_start + MAX_SPEECH_OVERLAP_SECONDS;
        }
    }

    segments.retain(|s| s.end > s.start);
    segments
}
