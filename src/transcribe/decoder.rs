//! Speech decoder invocation and report parsing.
//!
//! The decoder is the whisper.cpp CLI run as a child process with JSON
//! output. Audio reaches it as 16 kHz mono WAV demuxed by ffmpeg into the
//! job's scratch directory.

use super::SpeechSegment;
use crate::config::{Config, Precision};
use crate::error::{Error, Result};
use crate::subprocess::ToolInvocation;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Decoder sample rate; whisper models are trained on 16 kHz mono.
const DECODE_SAMPLE_RATE: u32 = 16_000;

/// Demux the source's audio track to a decoder-ready WAV.
///
/// Fails with `unreadable-media` when the demux step cannot read the
/// container.
pub fn demux_audio(config: &Config, source: &Path, work_dir: &Path) -> Result<PathBuf> {
    let wav = work_dir.join("audio.wav");
    let tool = ToolInvocation::new(
        &config.tools.ffmpeg,
        [
            "-y",
            "-v",
            "error",
            "-i",
            &source.to_string_lossy(),
            "-vn",
            "-ac",
            "1",
            "-ar",
            &DECODE_SAMPLE_RATE.to_string(),
            "-c:a",
            "pcm_s16le",
            &wav.to_string_lossy(),
        ],
    );

    let output = tool.run(None)?;
    if !output.success() {
        return Err(Error::UnreadableMedia {
            path: source.to_path_buf(),
        });
    }
    Ok(wav)
}

/// Extract a window of an already-demuxed WAV into `out`.
pub fn extract_window(
    config: &Config,
    wav: &Path,
    start: f64,
    duration: f64,
    out: &Path,
) -> Result<()> {
    let tool = ToolInvocation::new(
        &config.tools.ffmpeg,
        [
            "-y",
            "-v",
            "error",
            "-ss",
            &format!("{start:.3}"),
            "-t",
            &format!("{duration:.3}"),
            "-i",
            &wav.to_string_lossy(),
            "-c:a",
            "pcm_s16le",
            &out.to_string_lossy(),
        ],
    );
    tool.run(None)?.ensure_success(&config.tools.ffmpeg)?;
    Ok(())
}

/// One decoder invocation over a WAV file.
#[derive(Debug, Clone)]
pub struct DecodeRequest<'a> {
    /// WAV to decode.
    pub wav: &'a Path,
    /// Decoder model name (e.g. "medium").
    pub model: &'a str,
    /// Beam width.
    pub beam: u32,
    /// Language hint; "auto" enables detection.
    pub language: &'a str,
    /// Seconds added to every reported timestamp (chunk/window offset).
    pub time_offset: f64,
    /// Invocation deadline.
    pub deadline: Duration,
}

/// Run the decoder and parse its JSON report.
pub fn decode_wav(config: &Config, request: &DecodeRequest<'_>) -> Result<Vec<SpeechSegment>> {
    let model_path = model_file(
        &config.transcriber.model_dir,
        request.model,
        config.hardware.precision,
    );
    let report_base = request.wav.with_extension("report");

    let mut args: Vec<String> = vec![
        "-m".to_string(),
        model_path.to_string_lossy().into_owned(),
        "-f".to_string(),
        request.wav.to_string_lossy().into_owned(),
        "-ojf".to_string(),
        "-of".to_string(),
        report_base.to_string_lossy().into_owned(),
        "--beam-size".to_string(),
        request.beam.to_string(),
        "--temperature".to_string(),
        "0".to_string(),
        "--no-prints".to_string(),
    ];
    if request.language != "auto" {
        args.push("-l".to_string());
        args.push(request.language.to_string());
    }
    if config.transcriber.vad {
        args.push("--vad".to_string());
    }
    if config.hardware.accelerator.is_none() {
        args.push("--no-gpu".to_string());
    }

    let tool = ToolInvocation::new(&config.tools.whisper, args);
    tool.run(Some(request.deadline))?
        .ensure_success(&config.tools.whisper)?;

    // The decoder appends ".json" to the -of base name.
    let report_path = PathBuf::from(format!("{}.json", report_base.to_string_lossy()));
    let raw = std::fs::read_to_string(&report_path)?;
    let segments = parse_decoder_report(&raw, request.time_offset)?;
    debug!(
        "decoded {} segments from {}",
        segments.len(),
        request.wav.display()
    );
    Ok(segments)
}

/// Resolve the decoder model file for a model name and precision.
///
/// Quantized weights carry a `-q8_0` suffix; half-precision models use the
/// plain file name.
pub fn model_file(dir: &Path, model: &str, precision: Precision) -> PathBuf {
    match precision {
        Precision::Float16 => dir.join(format!("ggml-{model}.bin")),
        Precision::Int8 => dir.join(format!("ggml-{model}-q8_0.bin")),
    }
}

#[derive(Debug, Deserialize)]
struct DecoderReport {
    result: Option<DecoderResult>,
    #[serde(default)]
    transcription: Vec<DecoderSegment>,
}

#[derive(Debug, Deserialize)]
struct DecoderResult {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecoderSegment {
    offsets: DecoderOffsets,
    text: String,
    #[serde(default)]
    tokens: Vec<DecoderToken>,
}

#[derive(Debug, Deserialize)]
struct DecoderOffsets {
    from: i64,
    to: i64,
}

#[derive(Debug, Deserialize)]
struct DecoderToken {
    p: Option<f64>,
}

/// Parse the decoder's JSON report into speech segments.
///
/// The decoder reports millisecond offsets and per-token probabilities; the
/// per-segment mean token log-probability maps monotonically to a [0,1]
/// confidence via `exp(mean ln p)`.
pub fn parse_decoder_report(raw: &str, time_offset: f64) -> Result<Vec<SpeechSegment>> {
    let report: DecoderReport =
        serde_json::from_str(raw).map_err(|e| Error::ToolReport {
            program: "whisper".to_string(),
            message: e.to_string(),
        })?;

    let language = report
        .result
        .and_then(|r| r.language)
        .unwrap_or_else(|| "unknown".to_string());

    let segments = report
        .transcription
        .into_iter()
        .map(|seg| {
            let confidence = token_confidence(&seg.tokens);
            SpeechSegment {
                start: time_offset + seg.offsets.from as f64 / 1000.0,
                end: time_offset + seg.offsets.to as f64 / 1000.0,
                text: seg.text.trim().to_string(),
                confidence,
                language: language.clone(),
            }
        })
        .collect();

    Ok(segments)
}

/// Geometric-mean token probability, clamped to [0,1].
fn token_confidence(tokens: &[DecoderToken]) -> f64 {
    let probs: Vec<f64> = tokens
        .iter()
        .filter_map(|t| t.p)
        .filter(|p| *p > 0.0)
        .collect();
    if probs.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean_log = probs.iter().map(|p| p.ln()).sum::<f64>() / probs.len() as f64;
    mean_log.exp().clamp(0.0, 1.0)
}
