//! Configuration type definitions.

use crate::constants::{
    DEFAULT_CLIP_MAX, DEFAULT_CLIP_MIN, DEFAULT_MAX_CLIPS, DEFAULT_MIN_CLIPS_FLOOR,
    DEFAULT_MIN_VIRAL, visual,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete process configuration, frozen into each job's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Artifact store root directory.
    pub root: PathBuf,

    /// Number of process-wide job workers.
    pub processing_concurrency: usize,

    /// Cooldown between jobs taken by the same worker, in seconds.
    pub processing_cooldown_secs: u64,

    /// Maximum admitted source size in bytes.
    pub max_source_size: u64,

    /// Maximum admitted source duration in seconds.
    pub max_source_duration: f64,

    /// Speech decoding settings.
    pub transcriber: TranscriberConfig,

    /// Scene detection settings.
    pub visual: VisualConfig,

    /// Clip duration and selection settings.
    pub clips: ClipConfig,

    /// Rendering settings.
    pub render: RenderConfig,

    /// External tool binaries.
    pub tools: ToolPaths,

    /// Optional lexicon file overriding the built-in keyword tables.
    pub lexicon_file: Option<PathBuf>,

    /// Optional cookie file consumed by the downloader tool.
    pub fetch_cookies: Option<PathBuf>,

    /// Hardware profile chosen by the one-time startup probe.
    pub hardware: HardwareProfile,
}

/// Speech decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Primary decoder model name (e.g. "medium").
    pub model: String,
    /// Beam width for the primary pass (1-5).
    pub beam: u32,
    /// Language hint; "auto" enables detection.
    pub language: String,
    /// Voice-activity gating.
    pub vad: bool,
    /// Whether the larger-model retry pass runs.
    pub hybrid_retry: bool,
    /// Retry decoder model name (e.g. "large").
    pub retry_model: String,
    /// Confidence below which segments are re-decoded.
    pub retry_threshold: f64,
    /// Credential for the external hosted decoder; pass skipped when unset.
    #[serde(skip_serializing)]
    pub backend_key: Option<String>,
    /// Endpoint of the external hosted decoder.
    pub backend_url: Option<String>,
    /// Directory holding decoder model files.
    pub model_dir: PathBuf,
}

/// Scene detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualConfig {
    /// Histogram distance that triggers a scene boundary.
    pub scene_threshold: f64,
    /// Scenes shorter than this merge into their successor, in seconds.
    pub min_scene_seconds: f64,
    /// Scenes longer than this split at equal offsets, in seconds.
    pub max_scene_seconds: f64,
    /// Optional external face detector command.
    pub face_probe_bin: Option<String>,
}

/// Clip duration bounds and selection knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipConfig {
    /// Minimum clip duration in seconds (>= 5).
    pub min_seconds: f64,
    /// Maximum clip duration in seconds.
    pub max_seconds: f64,
    /// Minimum number of clips a completed job must produce.
    pub min_floor: usize,
    /// Maximum number of clips per job.
    pub max_clips: usize,
    /// Viral-score cutoff for selection.
    pub min_viral: f64,
}

/// Rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Target width for landscape output.
    pub target_width: u32,
    /// Target height for landscape output.
    pub target_height: u32,
    /// Video bitrate passed to the encoder (e.g. "4M").
    pub video_bitrate: String,
    /// Audio bitrate passed to the encoder (e.g. "192k").
    pub audio_bitrate: String,
    /// Whether hook overlays are drawn.
    pub hook_enabled: bool,
    /// Seconds the hook overlay stays on screen.
    pub hook_duration: f64,
    /// Vertical position of the hook overlay.
    pub hook_position: HookPosition,
    /// Hook overlay font size in points.
    pub hook_font_size: u32,
    /// Hook overlay text color.
    pub hook_font_color: String,
    /// Hook overlay box color (with alpha).
    pub hook_box_color: String,
    /// Whether silence compaction runs.
    pub silence_removal: bool,
    /// Silence threshold in dBFS.
    pub silence_db: f64,
    /// Minimum silence length eligible for removal, in seconds.
    pub min_silence: f64,
    /// Padding preserved around speech, in seconds.
    pub silence_padding: f64,
    /// Concurrent render invocations per job.
    pub max_parallel_renders: usize,
}

/// External tool binary paths, overridable per environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// ffmpeg binary.
    pub ffmpeg: String,
    /// ffprobe binary.
    pub ffprobe: String,
    /// whisper.cpp CLI binary.
    pub whisper: String,
    /// Downloader tool binary.
    pub ytdlp: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            whisper: "whisper-cli".to_string(),
            ytdlp: "yt-dlp".to_string(),
        }
    }
}

/// Decoder compute precision chosen by the hardware probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Half precision, used on accelerators.
    Float16,
    /// 8-bit integer quantization, used on CPU.
    Int8,
}

/// Hardware profile chosen once at startup and frozen for the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Detected accelerator name, if any.
    pub accelerator: Option<String>,
    /// Accelerator memory in MiB, if detected.
    pub accelerator_mem_mib: Option<u64>,
    /// Decoder compute precision.
    pub precision: Precision,
    /// Renderer video codec.
    pub video_codec: String,
    /// Default job worker count for this hardware class.
    pub default_concurrency: usize,
    /// Default per-job render pool size for this hardware class.
    pub default_parallel_renders: usize,
}

/// Requested clip duration class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DurationClass {
    /// 9-15 seconds.
    Short,
    /// 18-22 seconds.
    Medium,
    /// 28-32 seconds.
    Long,
    /// 40-50 seconds.
    Extended,
    /// No duration preference.
    #[default]
    Any,
}

impl DurationClass {
    /// Nominal duration bounds for the class, `None` for [`Self::Any`].
    pub fn bounds(self) -> Option<(f64, f64)> {
        match self {
            Self::Short => Some((9.0, 15.0)),
            Self::Medium => Some((18.0, 22.0)),
            Self::Long => Some((28.0, 32.0)),
            Self::Extended => Some((40.0, 50.0)),
            Self::Any => None,
        }
    }
}

/// Requested scoring style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// No style preference.
    #[default]
    Balanced,
    /// Prefer humor and spectacle.
    Funny,
    /// Prefer explanatory content.
    Educational,
    /// Prefer emotionally charged content.
    Dramatic,
    /// Prefer opinion and dispute.
    Controversial,
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    /// 16:9, the configured target dimensions as-is.
    #[default]
    Landscape,
    /// 9:16, the configured target dimensions swapped.
    Portrait,
}

/// Vertical position of the hook overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HookPosition {
    /// Upper third.
    Top,
    /// Vertically centered.
    #[default]
    Center,
    /// Lower third.
    Bottom,
}

/// Per-job options supplied at enqueue time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Language hint overriding the process default.
    pub language: Option<String>,
    /// Requested duration class.
    pub duration_class: DurationClass,
    /// Requested scoring style.
    pub style: Style,
    /// Whether hook overlays are drawn for this job.
    pub use_hook: bool,
    /// Whether caption sidecars are written for this job.
    pub auto_caption: bool,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
}

impl Config {
    /// Output pixel dimensions for the requested aspect ratio.
    pub fn output_dimensions(&self, aspect: AspectRatio) -> (u32, u32) {
        let (w, h) = (self.render.target_width, self.render.target_height);
        match aspect {
            AspectRatio::Landscape => (w.max(h), w.min(h)),
            AspectRatio::Portrait => (w.min(h), w.max(h)),
        }
    }

    /// Validate invariants that env parsing cannot express.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.clips.min_seconds < 5.0 {
            return Err(crate::error::Error::ConfigValidation {
                message: format!(
                    "CLIP_MIN must be >= 5 seconds, got {}",
                    self.clips.min_seconds
                ),
            });
        }
        if self.clips.min_seconds >= self.clips.max_seconds {
            return Err(crate::error::Error::ConfigValidation {
                message: format!(
                    "CLIP_MIN ({}) must be below CLIP_MAX ({})",
                    self.clips.min_seconds, self.clips.max_seconds
                ),
            });
        }
        if self.processing_concurrency == 0 {
            return Err(crate::error::Error::ConfigValidation {
                message: "PROCESSING_CONCURRENCY must be at least 1".to_string(),
            });
        }
        if !(1..=5).contains(&self.transcriber.beam) {
            return Err(crate::error::Error::ConfigValidation {
                message: format!("TRANSCRIBER_BEAM must be 1-5, got {}", self.transcriber.beam),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            processing_concurrency: 1,
            processing_cooldown_secs: 1,
            max_source_size: 2 * 1024 * 1024 * 1024,
            max_source_duration: 3600.0,
            transcriber: TranscriberConfig::default(),
            visual: VisualConfig::default(),
            clips: ClipConfig::default(),
            render: RenderConfig::default(),
            tools: ToolPaths::default(),
            lexicon_file: None,
            fetch_cookies: None,
            hardware: HardwareProfile::default(),
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            model: "medium".to_string(),
            beam: 5,
            language: "auto".to_string(),
            vad: true,
            hybrid_retry: true,
            retry_model: "large".to_string(),
            retry_threshold: 0.7,
            backend_key: None,
            backend_url: None,
            model_dir: PathBuf::from("./models"),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_width: 1920,
            target_height: 1080,
            video_bitrate: "4M".to_string(),
            audio_bitrate: "192k".to_string(),
            hook_enabled: true,
            hook_duration: 4.0,
            hook_position: HookPosition::Center,
            hook_font_size: 48,
            hook_font_color: "white".to_string(),
            hook_box_color: "black@0.6".to_string(),
            silence_removal: false,
            silence_db: -35.0,
            min_silence: 0.4,
            silence_padding: 0.05,
            max_parallel_renders: 2,
        }
    }
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            accelerator: None,
            accelerator_mem_mib: None,
            precision: Precision::Int8,
            video_codec: "libx264".to_string(),
            default_concurrency: 1,
            default_parallel_renders: 2,
        }
    }
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            min_seconds: DEFAULT_CLIP_MIN,
            max_seconds: DEFAULT_CLIP_MAX,
            min_floor: DEFAULT_MIN_CLIPS_FLOOR,
            max_clips: DEFAULT_MAX_CLIPS,
            min_viral: DEFAULT_MIN_VIRAL,
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            scene_threshold: visual::DEFAULT_SCENE_THRESHOLD,
            min_scene_seconds: visual::DEFAULT_MIN_SCENE_SECONDS,
            max_scene_seconds: visual::DEFAULT_MAX_SCENE_SECONDS,
            face_probe_bin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_class_bounds() {
        assert_eq!(DurationClass::Medium.bounds(), Some((18.0, 22.0)));
        assert_eq!(DurationClass::Any.bounds(), None);
    }

    #[test]
    fn portrait_swaps_dimensions() {
        let config = Config::default();
        assert_eq!(config.output_dimensions(AspectRatio::Landscape), (1920, 1080));
        assert_eq!(config.output_dimensions(AspectRatio::Portrait), (1080, 1920));
    }

    #[test]
    fn validate_rejects_tiny_clip_min() {
        let mut config = Config::default();
        config.clips.min_seconds = 4.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
