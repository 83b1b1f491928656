//! Media container probing.
//!
//! Runs the external probe tool and parses its structured report into
//! [`MediaInfo`]. Results are cached per path until the file's modification
//! time changes.

use crate::config::ToolPaths;
use crate::error::{Error, Result};
use crate::subprocess::ToolInvocation;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Probe invocations are quick; a stuck tool must not stall a job.
const PROBE_DEADLINE: Duration = Duration::from_secs(30);

/// Media stream facts for an admitted source.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    /// Container duration in seconds.
    pub duration: f64,
    /// Video frame rate.
    pub fps: f64,
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Codec family of the first video stream.
    pub codec: String,
    /// Whether the container carries an audio stream.
    pub has_audio: bool,
}

static PROBE_CACHE: LazyLock<Mutex<HashMap<PathBuf, (SystemTime, MediaInfo)>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Probe a media container, using the per-path cache when fresh.
pub fn probe_media(tools: &ToolPaths, path: &Path) -> Result<MediaInfo> {
    let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();

    if let Some(mtime) = mtime {
        if let Ok(cache) = PROBE_CACHE.lock() {
            if let Some((cached_mtime, info)) = cache.get(path) {
                if *cached_mtime == mtime {
                    debug!("probe cache hit: {}", path.display());
                    return Ok(info.clone());
                }
            }
        }
    }

    let tool = ToolInvocation::new(
        &tools.ffprobe,
        [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            &path.to_string_lossy(),
        ],
    );

    let output = tool.run(Some(PROBE_DEADLINE))?;
    if !output.success() {
        return Err(Error::UnreadableMedia {
            path: path.to_path_buf(),
        });
    }

    let info = parse_probe_report(&output.stdout_str())
        .ok_or_else(|| Error::UnreadableMedia {
            path: path.to_path_buf(),
        })?;

    if let (Some(mtime), Ok(mut cache)) = (mtime, PROBE_CACHE.lock()) {
        cache.insert(path.to_path_buf(), (mtime, info.clone()));
    }

    Ok(info)
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse the probe tool's JSON report.
///
/// Returns `None` when the report lacks a video stream or a determinable
/// duration, both of which are `unreadable-media` for the caller.
pub fn parse_probe_report(report: &str) -> Option<MediaInfo> {
    let report: ProbeReport = serde_json::from_str(report).ok()?;

    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;
    let has_audio = report
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let duration = report
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)?;

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);

    Some(MediaInfo {
        duration,
        fps,
        width: video.width?,
        height: video.height?,
        codec: video.codec_name.clone().unwrap_or_default(),
        has_audio,
    })
}

/// Parse an ffprobe rate fraction like "30000/1001" or "25/1".
fn parse_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    if den == 0.0 || !num.is_finite() {
        return None;
    }
    Some(num / den).filter(|r| *r > 0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920,
             "height": 1080, "avg_frame_rate": "30000/1001"},
            {"codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"duration": "1800.250000"}
    }"#;

    #[test]
    fn parses_full_report() {
        let info = parse_probe_report(REPORT).unwrap();
        assert!((info.duration - 1800.25).abs() < 1e-9);
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.codec, "h264");
        assert!(info.has_audio);
    }

    #[test]
    fn missing_video_stream_is_unreadable() {
        let report = r#"{
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}],
            "format": {"duration": "60.0"}
        }"#;
        assert!(parse_probe_report(report).is_none());
    }

    #[test]
    fn missing_duration_is_unreadable() {
        let report = r#"{
            "streams": [{"codec_type": "video", "codec_name": "h264",
                         "width": 640, "height": 480}],
            "format": {}
        }"#;
        assert!(parse_probe_report(report).is_none());
    }

    #[test]
    fn duration_falls_back_to_video_stream() {
        let report = r#"{
            "streams": [{"codec_type": "video", "codec_name": "vp9",
                         "width": 640, "height": 480,
                         "r_frame_rate": "25/1", "duration": "42.5"}]
        }"#;
        let info = parse_probe_report(report).unwrap();
        assert!((info.duration - 42.5).abs() < 1e-9);
        assert!((info.fps - 25.0).abs() < 1e-9);
        assert!(!info.has_audio);
    }

    #[test]
    fn rate_fraction_parsing() {
        assert_eq!(parse_rate("25/1"), Some(25.0));
        assert!(parse_rate("0/0").is_none());
        assert!(parse_rate("nonsense").is_none());
    }
}
