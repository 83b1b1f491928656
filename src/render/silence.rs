//! Silence detection and compaction planning.
//!
//! Compaction is two-pass: the detector filter reports silences on the cut
//! range, then the keep-plan drives a trim/concat filtergraph in the
//! actual render. Only the rendered file is compacted; recorded clip time
//! ranges stay in source time.

use crate::config::Config;
use crate::error::Result;
use crate::subprocess::ToolInvocation;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Detection pass deadline.
const DETECT_DEADLINE: Duration = Duration::from_secs(120);

/// A silence interval reported by the detector, clip-local.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceSpan {
    /// Silence start in seconds.
    pub start: f64,
    /// Silence end in seconds.
    pub end: f64,
}

/// Run the detector over a cut range and return silences, clip-local.
pub fn detect_silences(
    config: &Config,
    source: &Path,
    clip_start: f64,
    clip_duration: f64,
) -> Result<Vec<SilenceSpan>> {
    let filter = format!(
        "silencedetect=noise={}dB:d={}",
        config.render.silence_db, config.render.min_silence
    );
    let tool = ToolInvocation::new(
        &config.tools.ffmpeg,
        [
            "-ss",
            &format!("{clip_start:.3}"),
            "-t",
            &format!("{clip_duration:.3}"),
            "-i",
            &source.to_string_lossy(),
            "-af",
            &filter,
            "-f",
            "null",
            "-",
        ],
    );
    let output = tool.run(Some(DETECT_DEADLINE))?.ensure_success(&config.tools.ffmpeg)?;
    let silences = parse_detector_log(&output.stderr, clip_duration);
    debug!("detector found {} silences in cut", silences.len());
    Ok(silences)
}

/// Parse `silence_start:` / `silence_end:` markers from the detector log.
///
/// A trailing `silence_start` without a matching end extends to the cut's
/// end.
pub fn parse_detector_log(log: &str, clip_duration: f64) -> Vec<SilenceSpan> {
    let mut silences = Vec::new();
    let mut open: Option<f64> = None;

    for line in log.lines() {
        if let Some(raw) = field_after(line, "silence_start:") {
            if let Ok(start) = raw.parse::<f64>() {
                open = Some(start);
            }
        } else if let Some(raw) = field_after(line, "silence_end:") {
            if let (Some(start), Ok(end)) = (open.take(), raw.parse::<f64>()) {
                if end > start {
                    silences.push(SilenceSpan { start, end });
                }
            }
        }
    }

    if let Some(start) = open {
        if clip_duration > start {
            silences.push(SilenceSpan {
                start,
                end: clip_duration,
            });
        }
    }

    silences
}

fn field_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let idx = line.find(marker)?;
    let rest = &line[idx + marker.len()..];
    Some(rest.split_whitespace().next().unwrap_or(""))
}

/// Compute the speech intervals to keep, clip-local.
///
/// Preserved speech keeps `padding` seconds on each side; silence at the
/// head and tail is trimmed entirely.
pub fn keep_intervals(
    silences: &[SilenceSpan],
    clip_duration: f64,
    padding: f64,
) -> Vec<(f64, f64)> {
    if clip_duration <= 0.0 {
        return Vec::new();
    }

    // Speech is the complement of the silences within the cut.
    let mut speech: Vec<(f64, f64)> = Vec::new();
    let mut cursor = 0.0f64;
    for silence in silences {
        let start = silence.start.clamp(0.0, clip_duration);
        let end = silence.end.clamp(0.0, clip_duration);
        if start > cursor {
            speech.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < clip_duration {
        speech.push((cursor, clip_duration));
    }

    // Each speech region keeps `padding` of the surrounding silence; head
    // and tail silence beyond the padding is gone. Overlapping keeps merge.
    let mut keeps: Vec<(f64, f64)> = Vec::new();
    for (start, end) in speech {
        let keep = (
            (start - padding).max(0.0),
            (end + padding).min(clip_duration),
        );
        match keeps.last_mut() {
            Some(prev) if keep.0 <= prev.1 => prev.1 = prev.1.max(keep.1),
            _ => keeps.push(keep),
        }
    }

    keeps.retain(|(s, e)| e - s > 1e-6);
    keeps
}

/// Total seconds kept by a plan.
pub fn kept_duration(keeps: &[(f64, f64)]) -> f64 {
    keeps.iter().map(|(s, e)| e - s).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const LOG: &str = "\
[silencedetect @ 0x55] silence_start: 4.2\n\
[silencedetect @ 0x55] silence_end: 6.8 | silence_duration: 2.6\n\
[silencedetect @ 0x55] silence_start: 12.0\n\
[silencedetect @ 0x55] silence_end: 13.1 | silence_duration: 1.1\n";

    #[test]
    fn parses_detector_pairs() {
        let silences = parse_detector_log(LOG, 20.0);
        assert_eq!(
            silences,
            vec![
                SilenceSpan { start: 4.2, end: 6.8 },
                SilenceSpan { start: 12.0, end: 13.1 },
            ]
        );
    }

    #[test]
    fn unterminated_silence_extends_to_cut_end() {
        let log = "[silencedetect @ 0x55] silence_start: 15.0\n";
        let silences = parse_detector_log(log, 20.0);
        assert_eq!(silences, vec![SilenceSpan { start: 15.0, end: 20.0 }]);
    }

    #[test]
    fn no_silence_keeps_whole_cut() {
        let keeps = keep_intervals(&[], 20.0, 0.05);
        assert_eq!(keeps, vec![(0.0, 20.0)]);
    }

    #[test]
    fn interior_silence_is_removed_with_padding() {
        let silences = vec![SilenceSpan { start: 4.0, end: 7.0 }];
        let keeps = keep_intervals(&silences, 20.0, 0.05);
        assert_eq!(keeps.len(), 2);
        // Speech keeps 0.05s of the silence on each side.
        assert!((keeps[0].1 - 4.05).abs() < 1e-9);
        assert!((keeps[1].0 - 6.95).abs() < 1e-9);
        assert_eq!(keeps[1].1, 20.0);
    }

    #[test]
    fn head_silence_is_trimmed_entirely() {
        let silences = vec![SilenceSpan { start: 0.0, end: 2.0 }];
        let keeps = keep_intervals(&silences, 20.0, 0.05);
        assert_eq!(keeps.len(), 1);
        assert!((keeps[0].0 - 1.95).abs() < 1e-9);
        assert_eq!(keeps[0].1, 20.0);
    }

    #[test]
    fn tail_silence_is_trimmed_entirely() {
        let silences = vec![SilenceSpan { start: 16.0, end: 20.0 }];
        let keeps = keep_intervals(&silences, 20.0, 0.05);
        assert_eq!(keeps.len(), 1);
        assert_eq!(keeps[0].0, 0.0);
        assert!((keeps[0].1 - 16.05).abs() < 1e-9);
    }

    #[test]
    fn all_silence_keeps_nothing() {
        let silences = vec![SilenceSpan { start: 0.0, end: 20.0 }];
        assert!(keep_intervals(&silences, 20.0, 0.05).is_empty());
    }

    #[test]
    fn adjacent_speech_keeps_merge() {
        // Tiny silence between two speech spans: padded keeps overlap.
        let silences = vec![SilenceSpan { start: 5.0, end: 5.08 }];
        let keeps = keep_intervals(&silences, 10.0, 0.05);
        assert_eq!(keeps.len(), 1);
        assert_eq!(keeps[0], (0.0, 10.0));
    }

    #[test]
    fn kept_duration_sums_intervals() {
        let keeps = vec![(0.0, 4.0), (6.0, 10.0)];
        assert_eq!(kept_duration(&keeps), 8.0);
    }
}
