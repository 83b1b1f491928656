//! Speech transcription with confidence-tracked retries.
//!
//! The primary decode runs over the whole track under a duration-scaled
//! deadline. Low-confidence segments are re-decoded with a larger model
//! (hybrid retry), then optionally submitted to an external hosted decoder.
//! A deadline hit degrades to independent 5-minute chunks with placeholder
//! segments for failed chunks.

mod backend;
mod decoder;
mod normalize;

pub use backend::{BackendTranscript, parse_backend_response};
pub use decoder::{DecodeRequest, model_file, parse_decoder_report};
pub use normalize::normalize;

use crate::config::Config;
use crate::constants::{
    RETRY_WINDOW_PAD_SECONDS, TRANSCRIBE_CHUNK_SECONDS, TRANSCRIBE_DEADLINE_FLOOR_SECS,
    TRANSCRIBE_MIN_COVERAGE,
};
use crate::error::{Error, Result};
use crate::probe::MediaInfo;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A timestamped span of decoded speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSegment {
    /// Start time in seconds from the source start.
    pub start: f64,
    /// End time in seconds from the source start.
    pub end: f64,
    /// Decoded text, trimmed.
    pub text: String,
    /// Decoder confidence in [0,1].
    pub confidence: f64,
    /// Detected or hinted language tag.
    pub language: String,
}

impl SpeechSegment {
    /// Span length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Deadline for the whole transcriber invocation.
fn invocation_deadline(duration: f64) -> Duration {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = (2.0 * duration + 300.0).ceil() as u64;
    Duration::from_secs(scaled.max(TRANSCRIBE_DEADLINE_FLOOR_SECS))
}

/// Per-chunk deadline in degraded mode.
const CHUNK_DEADLINE: Duration = Duration::from_secs(300);

/// Deadline for a single retry-window decode.
const RETRY_DEADLINE: Duration = Duration::from_secs(300);

/// Transcribe a source's audio track.
///
/// Returns the best-effort segment list when at least 60% of the source
/// duration decoded without placeholders; otherwise raises the appropriate
/// failure kind.
pub fn transcribe(
    config: &Config,
    source: &Path,
    media: &MediaInfo,
    work_dir: &Path,
) -> Result<Vec<SpeechSegment>> {
    if !media.has_audio {
        info!("source has no audio stream, skipping transcription");
        return Ok(Vec::new());
    }

    let wav = decoder::demux_audio(config, source, work_dir)?;
    let deadline = invocation_deadline(media.duration);

    let request = DecodeRequest {
        wav: &wav,
        model: &config.transcriber.model,
        beam: config.transcriber.beam,
        language: &config.transcriber.language,
        time_offset: 0.0,
        deadline,
    };

    let mut segments = match decoder::decode_wav(config, &request) {
        Ok(segments) => segments,
        Err(Error::ToolTimeout { .. }) => {
            warn!(
                "primary decode exceeded {}s deadline, degrading to {}s chunks",
                deadline.as_secs(),
                TRANSCRIBE_CHUNK_SECONDS
            );
            decode_chunked(config, &wav, media.duration, work_dir)?
        }
        Err(e) => {
            return Err(Error::BackendUnavailable {
                reason: format!("primary decode failed: {e}"),
            });
        }
    };

    check_coverage(&segments, media.duration)?;

    if config.transcriber.hybrid_retry {
        retry_pass(config, &wav, work_dir, &mut segments);
    }
    backend_pass(config, &wav, work_dir, &mut segments);

    Ok(normalize(segments))
}

/// Decode the track as independent chunks after a deadline hit.
///
/// Failed chunks yield a placeholder segment; two consecutive failures
/// abort with `transcription-unreliable`.
fn decode_chunked(
    config: &Config,
    wav: &Path,
    duration: f64,
    work_dir: &Path,
) -> Result<Vec<SpeechSegment>> {
    let mut segments = Vec::new();
    let mut consecutive_failures = 0usize;
    let mut chunk_index = 0usize;
    let mut offset = 0.0f64;

    while offset < duration {
        let chunk_len = TRANSCRIBE_CHUNK_SECONDS.min(duration - offset);
        let chunk_wav = work_dir.join(format!("chunk_{chunk_index:03}.wav"));

        let outcome = decoder::extract_window(config, wav, offset, chunk_len, &chunk_wav)
            .and_then(|()| {
                decoder::decode_wav(
                    config,
                    &DecodeRequest {
                        wav: &chunk_wav,
                        model: &config.transcriber.model,
                        beam: config.transcriber.beam,
                        language: &config.transcriber.language,
                        time_offset: offset,
                        deadline: CHUNK_DEADLINE,
                    },
                )
            });

        match outcome {
            Ok(chunk_segments) => {
                segments.extend(chunk_segments);
                consecutive_failures = 0;
            }
            Err(e) => {
                warn!("chunk {chunk_index} failed: {e}");
                segments.push(SpeechSegment {
                    start: offset,
                    end: offset + chunk_len,
                    text: String::new(),
                    confidence: 0.0,
                    language: config.transcriber.language.clone(),
                });
                consecutive_failures += 1;
                if consecutive_failures >= 2 {
                    return Err(Error::TranscriptionUnreliable {
                        reason: "two consecutive chunk failures".to_string(),
                    });
                }
            }
        }

        offset += chunk_len;
        chunk_index += 1;
    }

    Ok(segments)
}

/// Fraction of the source covered by successfully decoded audio.
///
/// Placeholder segments (empty text, zero confidence) mark chunks that
/// failed to decode; only their spans count against coverage.
fn check_coverage(segments: &[SpeechSegment], duration: f64) -> Result<()> {
    if duration <= 0.0 {
        return Ok(());
    }
    let placeholder_span: f64 = segments
        .iter()
        .filter(|s| s.text.is_empty() && s.confidence == 0.0)
        .map(SpeechSegment::duration)
        .sum();
    let covered = (duration - placeholder_span) / duration;
    if covered < TRANSCRIBE_MIN_COVERAGE {
        return Err(Error::TranscriptionUnreliable {
            reason: format!("only {:.0}% of the source decoded", covered * 100.0),
        });
    }
    Ok(())
}

/// Re-decode low-confidence segments with the larger model.
fn retry_pass(config: &Config, wav: &Path, work_dir: &Path, segments: &mut [SpeechSegment]) {
    let threshold = config.transcriber.retry_threshold;
    let mut improved = 0usize;

    for (index, segment) in segments
        .iter_mut()
        .enumerate()
        .filter(|(_, s)| !s.text.is_empty() && s.confidence < config.transcriber.retry_threshold)
    {
        let window_start = (segment.start - RETRY_WINDOW_PAD_SECONDS).max(0.0);
        let window_len = segment.end - window_start + RETRY_WINDOW_PAD_SECONDS;
        let window_wav = work_dir.join(format!("retry_{index:04}.wav"));

        let outcome = decoder::extract_window(config, wav, window_start, window_len, &window_wav)
            .and_then(|()| {
                decoder::decode_wav(
                    config,
                    &DecodeRequest {
                        wav: &window_wav,
                        model: &config.transcriber.retry_model,
                        beam: 5,
                        language: &segment.language,
                        time_offset: window_start,
                        deadline: RETRY_DEADLINE,
                    },
                )
            });

        match outcome {
            Ok(retry_segments) => {
                if let Some((text, confidence)) = combine_window(&retry_segments) {
                    // Ties keep the primary result.
                    if confidence > segment.confidence {
                        segment.text = text;
                        segment.confidence = confidence;
                        improved += 1;
                    }
                }
            }
            Err(e) => warn!("retry decode for segment {index} failed: {e}"),
        }
    }

    if improved > 0 {
        debug!("hybrid retry improved {improved} segments below {threshold}");
    }
}

/// Submit still-low segments to the hosted decoder, lowest confidence first.
fn backend_pass(config: &Config, wav: &Path, work_dir: &Path, segments: &mut [SpeechSegment]) {
    if config.transcriber.backend_key.is_none() {
        return;
    }
    let threshold = config.transcriber.retry_threshold;

    let mut order: Vec<usize> = (0..segments.len())
        .filter(|&i| !segments[i].text.is_empty() && segments[i].confidence < threshold)
        .collect();
    order.sort_by(|&a, &b| {
        segments[a]
            .confidence
            .partial_cmp(&segments[b].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for index in order {
        let segment = &mut segments[index];
        let window_wav = work_dir.join(format!("backend_{index:04}.wav"));
        let outcome = decoder::extract_window(
            config,
            wav,
            segment.start,
            segment.duration(),
            &window_wav,
        )
        .and_then(|()| backend::decode_remote(config, &window_wav));

        match outcome {
            Ok(Some(transcript)) => {
                if transcript.confidence > segment.confidence {
                    segment.text = transcript.text.trim().to_string();
                    segment.confidence = transcript.confidence;
                    if let Some(language) = transcript.language {
                        segment.language = language;
                    }
                }
            }
            Ok(None) => return,
            Err(e) => {
                // One failure is taken as backend-wide; stop submitting.
                warn!("hosted decoder pass stopped: {e}");
                return;
            }
        }
    }
}

/// Collapse a retry window's segments into replacement text and confidence.
///
/// Confidence is the duration-weighted mean over the window's segments.
fn combine_window(segments: &[SpeechSegment]) -> Option<(String, f64)> {
    let spoken: Vec<&SpeechSegment> =
        segments.iter().filter(|s| !s.text.trim().is_empty()).collect();
    if spoken.is_empty() {
        return None;
    }
    let text = spoken
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let total: f64 = spoken.iter().map(|s| s.duration().max(0.01)).sum();
    let weighted: f64 = spoken
        .iter()
        .map(|s| s.confidence * s.duration().max(0.01))
        .sum();
    Some((text, weighted / total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str, confidence: f64) -> SpeechSegment {
        SpeechSegment {
            start,
            end,
            text: text.to_string(),
            confidence,
            language: "en".to_string(),
        }
    }

    #[test]
    fn deadline_scales_with_duration() {
        // Short sources keep the 10-minute floor.
        assert_eq!(invocation_deadline(60.0), Duration::from_secs(600));
        // A one-hour source gets 2h + 5min.
        assert_eq!(invocation_deadline(3600.0), Duration::from_secs(7500));
    }

    #[test]
    fn coverage_passes_without_placeholders() {
        let segments = vec![seg(0.0, 5.0, "hello", 0.9)];
        assert!(check_coverage(&segments, 600.0).is_ok());
    }

    #[test]
    fn coverage_fails_when_placeholders_dominate() {
        let segments = vec![
            seg(0.0, 300.0, "", 0.0),
            seg(300.0, 600.0, "ok", 0.8),
            seg(600.0, 900.0, "", 0.0),
        ];
        // 600 of 900 seconds are placeholders: 33% coverage.
        assert!(matches!(
            check_coverage(&segments, 900.0),
            Err(Error::TranscriptionUnreliable { .. })
        ));
    }

    #[test]
    fn coverage_boundary_at_sixty_percent() {
        // Exactly 60% covered passes.
        let segments = vec![seg(0.0, 400.0, "", 0.0)];
        assert!(check_coverage(&segments, 1000.0).is_ok());
        let segments = vec![seg(0.0, 401.0, "", 0.0)];
        assert!(check_coverage(&segments, 1000.0).is_err());
    }

    #[test]
    fn combine_window_weights_by_duration() {
        let segments = vec![seg(0.0, 3.0, "long part", 0.9), seg(3.0, 4.0, "short", 0.3)];
        let (text, confidence) = combine_window(&segments).unwrap();
        assert_eq!(text, "long part short");
        // (0.9*3 + 0.3*1) / 4 = 0.75
        assert!((confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn combine_window_skips_empty_segments() {
        assert!(combine_window(&[seg(0.0, 1.0, "  ", 0.5)]).is_none());
    }
}
