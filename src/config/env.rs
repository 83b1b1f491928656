//! Environment-variable configuration loading.
//!
//! Every knob is optional; unset knobs take the documented defaults, and
//! the concurrency knobs default to the hardware profile's choice. Loading
//! goes through an injectable lookup so tests can supply knob maps without
//! touching the process environment.

use super::types::{
    ClipConfig, Config, HardwareProfile, HookPosition, RenderConfig, ToolPaths, TranscriberConfig,
    VisualConfig,
};
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// A source of configuration values, keyed by env-var name.
pub trait KnobSource {
    /// Raw value for `key`, or `None` when unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
pub struct ProcessEnv;

impl KnobSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl KnobSource for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

fn knob_parse<T: FromStr>(source: &dyn KnobSource, key: &str, default: T) -> Result<T> {
    match source.get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| Error::ConfigValidation {
            message: format!("invalid value for {key}: '{raw}'"),
        }),
        None => Ok(default),
    }
}

fn knob_opt(source: &dyn KnobSource, key: &str) -> Option<String> {
    source.get(key).filter(|v| !v.trim().is_empty())
}

fn knob_string(source: &dyn KnobSource, key: &str, default: &str) -> String {
    knob_opt(source, key).unwrap_or_else(|| default.to_string())
}

/// Parse booleans the way the rest of the tooling writes them.
fn knob_bool(source: &dyn KnobSource, key: &str, default: bool) -> Result<bool> {
    match source.get(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::ConfigValidation {
                message: format!("invalid boolean for {key}: '{raw}'"),
            }),
        },
        None => Ok(default),
    }
}

/// Parse a byte size with an optional binary suffix ("2GiB", "512MiB", "1024").
pub fn parse_size(raw: &str) -> Option<u64> {
    let s = raw.trim();
    let (digits, multiplier) = if let Some(n) = s.strip_suffix("GiB").or_else(|| s.strip_suffix('G'))
    {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MiB").or_else(|| s.strip_suffix('M')) {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("KiB").or_else(|| s.strip_suffix('K')) {
        (n, 1024)
    } else {
        (s, 1)
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}

fn knob_size(source: &dyn KnobSource, key: &str, default: u64) -> Result<u64> {
    match source.get(key) {
        Some(raw) => parse_size(&raw).ok_or_else(|| Error::ConfigValidation {
            message: format!("invalid size for {key}: '{raw}'"),
        }),
        None => Ok(default),
    }
}

fn knob_hook_position(
    source: &dyn KnobSource,
    key: &str,
    default: HookPosition,
) -> Result<HookPosition> {
    match source.get(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(HookPosition::Top),
            "center" => Ok(HookPosition::Center),
            "bottom" => Ok(HookPosition::Bottom),
            _ => Err(Error::ConfigValidation {
                message: format!("invalid hook position for {key}: '{raw}'"),
            }),
        },
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from the process environment over a hardware profile.
    pub fn from_env(hardware: HardwareProfile) -> Result<Self> {
        Self::from_source(&ProcessEnv, hardware)
    }

    /// Load configuration from an arbitrary knob source.
    pub fn from_source(source: &dyn KnobSource, hardware: HardwareProfile) -> Result<Self> {
        let config = Self {
            root: PathBuf::from(knob_string(source, "CLIPFORGE_ROOT", "./data")),
            processing_concurrency: knob_parse(
                source,
                "PROCESSING_CONCURRENCY",
                hardware.default_concurrency,
            )?,
            processing_cooldown_secs: knob_parse(source, "PROCESSING_COOLDOWN", 1)?,
            max_source_size: knob_size(source, "MAX_SOURCE_SIZE", 2 * 1024 * 1024 * 1024)?,
            max_source_duration: knob_parse(source, "MAX_SOURCE_DURATION", 3600.0)?,
            transcriber: TranscriberConfig {
                model: knob_string(source, "TRANSCRIBER_MODEL", "medium"),
                beam: knob_parse(source, "TRANSCRIBER_BEAM", 5)?,
                language: knob_string(source, "TRANSCRIBER_LANG", "auto"),
                vad: knob_bool(source, "TRANSCRIBER_VAD", true)?,
                hybrid_retry: knob_bool(source, "HYBRID_RETRY", true)?,
                retry_model: knob_string(source, "RETRY_MODEL", "large"),
                retry_threshold: knob_parse(source, "RETRY_THRESHOLD", 0.7)?,
                backend_key: knob_opt(source, "EXTERNAL_BACKEND_KEY"),
                backend_url: knob_opt(source, "EXTERNAL_BACKEND_URL"),
                model_dir: PathBuf::from(knob_string(source, "WHISPER_MODEL_DIR", "./models")),
            },
            visual: VisualConfig {
                scene_threshold: knob_parse(source, "SCENE_THRESHOLD", 12.0)?,
                min_scene_seconds: knob_parse(source, "MIN_SCENE_SECONDS", 3.0)?,
                max_scene_seconds: knob_parse(source, "MAX_SCENE_SECONDS", 60.0)?,
                face_probe_bin: knob_opt(source, "FACE_PROBE_BIN"),
            },
            clips: ClipConfig {
                min_seconds: knob_parse(source, "CLIP_MIN", 9.0)?,
                max_seconds: knob_parse(source, "CLIP_MAX", 50.0)?,
                min_floor: knob_parse(source, "MIN_CLIPS_FLOOR", 5)?,
                max_clips: knob_parse(source, "MAX_CLIPS", 20)?,
                min_viral: knob_parse(source, "MIN_VIRAL", 0.08)?,
            },
            render: RenderConfig {
                target_width: knob_parse(source, "TARGET_WIDTH", 1920)?,
                target_height: knob_parse(source, "TARGET_HEIGHT", 1080)?,
                video_bitrate: knob_string(source, "VIDEO_BITRATE", "4M"),
                audio_bitrate: knob_string(source, "AUDIO_BITRATE", "192k"),
                hook_enabled: knob_bool(source, "HOOK_ENABLED", true)?,
                hook_duration: knob_parse(source, "HOOK_DURATION", 4.0)?,
                hook_position: knob_hook_position(source, "HOOK_POSITION", HookPosition::Center)?,
                hook_font_size: knob_parse(source, "HOOK_FONT_SIZE", 48)?,
                hook_font_color: knob_string(source, "HOOK_FONT_COLOR", "white"),
                hook_box_color: knob_string(source, "HOOK_BOX_COLOR", "black@0.6"),
                silence_removal: knob_bool(source, "SILENCE_REMOVAL", false)?,
                silence_db: knob_parse(source, "SILENCE_DB", -35.0)?,
                min_silence: knob_parse(source, "MIN_SILENCE", 0.4)?,
                silence_padding: knob_parse(source, "SILENCE_PAD", 0.05)?,
                max_parallel_renders: knob_parse(
                    source,
                    "MAX_PARALLEL_RENDERS",
                    hardware.default_parallel_renders,
                )?,
            },
            tools: ToolPaths {
                ffmpeg: knob_string(source, "FFMPEG_BIN", "ffmpeg"),
                ffprobe: knob_string(source, "FFPROBE_BIN", "ffprobe"),
                whisper: knob_string(source, "WHISPER_BIN", "whisper-cli"),
                ytdlp: knob_string(source, "YTDLP_BIN", "yt-dlp"),
            },
            lexicon_file: knob_opt(source, "LEXICON_FILE").map(PathBuf::from),
            fetch_cookies: knob_opt(source, "FETCH_COOKIES").map(PathBuf::from),
            hardware,
        };

        config.validate()?;
        Ok(config)
    }
}
