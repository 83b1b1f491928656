//! Caption sidecar writing and parsing.
//!
//! Sidecars use the SubRip record format: a 1-indexed counter, an
//! `HH:MM:SS,mmm --> HH:MM:SS,mmm` line, text lines, and a blank
//! terminator. Timestamps are clip-local.

use crate::error::{Error, Result};
use crate::transcribe::SpeechSegment;
use std::fmt::Write as _;

/// Build sidecar content for the speech covering a clip's time range.
///
/// Segment timestamps are re-based against the clip start and clamped to
/// the clip range; segments without any overlap are skipped.
pub fn build_sidecar(speech: &[SpeechSegment], clip_start: f64, clip_end: f64) -> String {
    let mut out = String::new();
    let mut index = 1usize;

    for segment in speech {
        if segment.end <= clip_start || segment.start >= clip_end {
            continue;
        }
        if segment.text.trim().is_empty() {
            continue;
        }
        let local_start = (segment.start - clip_start).max(0.0);
        let local_end = (segment.end.min(clip_end) - clip_start).max(0.0);
        if local_end <= local_start {
            continue;
        }

        let _ = writeln!(out, "{index}");
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(local_start),
            format_timestamp(local_end)
        );
        let _ = writeln!(out, "{}", segment.text.trim());
        let _ = writeln!(out);
        index += 1;
    }

    out
}

/// Parse sidecar content back into clip-local speech segments.
pub fn parse_sidecar(content: &str) -> Result<Vec<SpeechSegment>> {
    let mut segments = Vec::new();
    let mut lines = content.lines().peekable();
    let mut record = 0usize;

    while lines.peek().is_some() {
        // Skip blank separators.
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(counter_line) = lines.next() else {
            break;
        };
        record += 1;

        let counter: usize = counter_line.trim().parse().map_err(|_| Error::CaptionParse {
            record,
            message: format!("expected record counter, got '{counter_line}'"),
        })?;
        if counter != record {
            return Err(Error::CaptionParse {
                record,
                message: format!("record counter {counter} out of sequence"),
            });
        }

        let timing = lines.next().ok_or_else(|| Error::CaptionParse {
            record,
            message: "missing timing line".to_string(),
        })?;
        let (raw_start, raw_end) = timing.split_once("-->").ok_or_else(|| Error::CaptionParse {
            record,
            message: format!("malformed timing line '{timing}'"),
        })?;
        let start = parse_timestamp(raw_start.trim()).ok_or_else(|| Error::CaptionParse {
            record,
            message: format!("bad start timestamp '{raw_start}'"),
        })?;
        let end = parse_timestamp(raw_end.trim()).ok_or_else(|| Error::CaptionParse {
            record,
            message: format!("bad end timestamp '{raw_end}'"),
        })?;

        let mut text_lines: Vec<&str> = Vec::new();
        while let Some(line) = lines.peek() {
            if line.trim().is_empty() {
                break;
            }
            text_lines.push(lines.next().unwrap_or_default());
        }
        if text_lines.is_empty() {
            return Err(Error::CaptionParse {
                record,
                message: "record has no text lines".to_string(),
            });
        }

        segments.push(SpeechSegment {
            start,
            end,
            text: text_lines.join("\n"),
            confidence: 1.0,
            language: String::new(),
        });
    }

    Ok(segments)
}

/// Format seconds as `HH:MM:SS,mmm`.
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds * 1000.0).round().max(0.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total_millis = total_millis as u64;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours:02}:{mins:02}:{secs:02},{millis:03}")
}

/// Parse an `HH:MM:SS,mmm` timestamp.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let (clock, millis) = raw.split_once(',')?;
    let millis: f64 = millis.trim().parse().ok()?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].trim().parse().ok()?;
    let mins: f64 = parts[1].trim().parse().ok()?;
    let secs: f64 = parts[2].trim().parse().ok()?;
    Some(millis.mul_add(0.001, hours * 3600.0 + mins * 60.0 + secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

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
    fn formats_and_parses_timestamps() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(3661.25), "01:01:01,250");
        assert_eq!(parse_timestamp("01:01:01,250"), Some(3661.25));
        assert!(parse_timestamp("1:2").is_none());
    }

    #[test]
    fn sidecar_rebases_to_clip_local_time() {
        let speech = vec![seg(100.0, 104.0, "hello"), seg(105.0, 109.0, "world")];
        let sidecar = build_sidecar(&speech, 100.0, 120.0);
        assert!(sidecar.starts_with("1\n00:00:00,000 --> 00:00:04,000\nhello\n"));
        assert!(sidecar.contains("2\n00:00:05,000 --> 00:00:09,000\nworld\n"));
    }

    #[test]
    fn sidecar_clamps_to_clip_bounds() {
        let speech = vec![seg(95.0, 105.0, "spans the cut")];
        let sidecar = build_sidecar(&speech, 100.0, 110.0);
        assert!(sidecar.contains("00:00:00,000 --> 00:00:05,000"));
    }

    #[test]
    fn sidecar_skips_non_overlapping_speech() {
        let speech = vec![seg(0.0, 5.0, "before"), seg(200.0, 205.0, "after")];
        assert!(build_sidecar(&speech, 100.0, 120.0).is_empty());
    }

    #[test]
    fn round_trip_preserves_segments() {
        let speech = vec![
            seg(100.0, 104.25, "first line"),
            seg(105.5, 109.75, "second line"),
        ];
        let sidecar = build_sidecar(&speech, 100.0, 120.0);
        let parsed = parse_sidecar(&sidecar).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!((parsed[0].start - 0.0).abs() < 1e-3);
        assert!((parsed[0].end - 4.25).abs() < 1e-3);
        assert_eq!(parsed[0].text, "first line");
        assert!((parsed[1].start - 5.5).abs() < 1e-3);
        assert_eq!(parsed[1].text, "second line");
    }

    #[test]
    fn parse_rejects_out_of_sequence_counters() {
        let content = "2\n00:00:00,000 --> 00:00:01,000\nhi\n\n";
        assert!(matches!(
            parse_sidecar(content),
            Err(Error::CaptionParse { .. })
        ));
    }

    #[test]
    fn parse_rejects_missing_text() {
        let content = "1\n00:00:00,000 --> 00:00:01,000\n\n";
        assert!(parse_sidecar(content).is_err());
    }

    #[test]
    fn parse_empty_content_yields_no_segments() {
        assert!(parse_sidecar("").unwrap().is_empty());
    }
}
