//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for directories and user-facing messages.
pub const APP_NAME: &str = "clipforge";

/// Default minimum clip duration in seconds.
pub const DEFAULT_CLIP_MIN: f64 = 9.0;

/// Default maximum clip duration in seconds.
pub const DEFAULT_CLIP_MAX: f64 = 50.0;

/// Default minimum number of clips a completed job must produce.
pub const DEFAULT_MIN_CLIPS_FLOOR: usize = 5;

/// Default maximum number of clips per job.
pub const DEFAULT_MAX_CLIPS: usize = 20;

/// Default viral-score cutoff for selection.
pub const DEFAULT_MIN_VIRAL: f64 = 0.08;

/// Default window length for coverage-fallback tiling, in seconds.
pub const COVERAGE_WINDOW_SECONDS: f64 = 20.0;

/// Two selected clips may share at most this much time, in seconds.
pub const MAX_CLIP_OVERLAP_SECONDS: f64 = 0.5;

/// Minimum speech/scene intersection for fusion, in seconds.
pub const FUSE_MIN_INTERSECT_SECONDS: f64 = 0.5;

/// Speech segments of one job may overlap by at most this much, in seconds.
pub const MAX_SPEECH_OVERLAP_SECONDS: f64 = 0.05;

/// Audio window expansion for the transcription retry pass, in seconds.
pub const RETRY_WINDOW_PAD_SECONDS: f64 = 0.25;

/// Chunk length for the transcription timeout ladder, in seconds.
pub const TRANSCRIBE_CHUNK_SECONDS: f64 = 300.0;

/// Minimum fraction of the source that must decode without placeholders.
pub const TRANSCRIBE_MIN_COVERAGE: f64 = 0.6;

/// Scene boundary and signal extraction.
pub mod visual {
    /// Default luminance histogram distance that triggers a scene boundary.
    pub const DEFAULT_SCENE_THRESHOLD: f64 = 12.0;
    /// Default minimum scene length in seconds; shorter scenes merge forward.
    pub const DEFAULT_MIN_SCENE_SECONDS: f64 = 3.0;
    /// Default maximum scene length in seconds; longer scenes split evenly.
    pub const DEFAULT_MAX_SCENE_SECONDS: f64 = 60.0;
    /// Scene density (scenes per minute) at or below which monolog synthesis runs.
    pub const MONOLOG_SCENES_PER_MINUTE: f64 = 0.5;
    /// Scene count below which monolog synthesis runs regardless of density.
    pub const MONOLOG_MIN_SCENES: usize = 3;
    /// Rotating synthetic window lengths for monolog sources, in seconds.
    pub const MONOLOG_WINDOWS: [f64; 4] = [15.0, 20.0, 25.0, 30.0];
    /// Face ratio assigned to synthetic scenes (talking-head prior).
    pub const MONOLOG_FACE_RATIO: f64 = 1.0;
    /// Motion assigned to synthetic scenes.
    pub const MONOLOG_MOTION: f64 = 0.3;
    /// Brightness assigned to synthetic scenes.
    pub const MONOLOG_BRIGHTNESS: f64 = 0.6;
    /// Neutral face ratio when no face detector is configured.
    pub const NEUTRAL_FACE_RATIO: f64 = 0.5;
    /// Maximum frames sampled per scene for signal extraction.
    pub const FRAMES_PER_SCENE: usize = 5;
    /// Luma delta that maps to full motion score.
    pub const MOTION_FULL_SCALE: f64 = 50.0;
    /// Detected face count that maps to full face ratio.
    pub const FACES_FULL_SCALE: f64 = 2.0;
}

/// Scoring weights and bounds.
pub mod score {
    /// Keyword matches that map an axis to its full score.
    pub const AXIS_FULL_MATCHES: f64 = 3.0;
    /// Penalty per filler-word match.
    pub const FILLER_PENALTY_PER_MATCH: f64 = 0.08;
    /// Cap on the total filler penalty.
    pub const FILLER_PENALTY_CAP: f64 = 0.4;
    /// Multiplier applied to the viral score of context-incomplete candidates.
    pub const INCOMPLETE_CONTEXT_PENALTY: f64 = 0.6;
    /// Largest in-text speech gap allowed for context completeness, in seconds.
    pub const MAX_CONTEXT_SPEECH_GAP: f64 = 3.0;
    /// Axis score above which a rationale phrase is emitted.
    pub const RATIONALE_THRESHOLD: f64 = 0.5;
    /// Raw category score below which a candidate is tagged balanced.
    pub const CATEGORY_THRESHOLD: f64 = 0.3;
    /// Viral score at or above which a clip is tier "high".
    pub const TIER_HIGH: f64 = 0.75;
    /// Viral score at or above which a clip is tier "medium".
    pub const TIER_MEDIUM: f64 = 0.5;
}

/// Canonical job progress points, in percent.
pub mod progress {
    /// Media probe completed.
    pub const PROBE: u8 = 5;
    /// Transcription started.
    pub const TRANSCRIBE_START: u8 = 10;
    /// Transcription completed.
    pub const TRANSCRIBE_DONE: u8 = 40;
    /// Visual analysis completed.
    pub const VISUAL_DONE: u8 = 55;
    /// Fusion and scoring completed.
    pub const FUSE_SCORE: u8 = 70;
    /// Selection completed.
    pub const SELECT: u8 = 75;
    /// Rendering started.
    pub const RENDER_START: u8 = 80;
    /// Rendering completed.
    pub const RENDER_DONE: u8 = 95;
    /// Job finalized.
    pub const FINALIZE: u8 = 100;
}

/// Job log ring capacity.
pub const JOB_LOG_CAPACITY: usize = 10;

/// Renderer deadline floor in seconds.
pub const RENDER_DEADLINE_FLOOR_SECS: u64 = 60;

/// Renderer deadline multiplier over clip duration.
pub const RENDER_DEADLINE_FACTOR: f64 = 4.0;

/// Transcriber deadline floor in seconds (10 minutes).
pub const TRANSCRIBE_DEADLINE_FLOOR_SECS: u64 = 600;

/// Fetcher retry schedule.
pub mod fetch {
    /// Maximum retry attempts for transient failures.
    pub const MAX_RETRIES: u32 = 3;
    /// Initial backoff before the first retry, in seconds.
    pub const INITIAL_BACKOFF_SECS: u64 = 2;
}

/// File-name pieces of the artifact store layout.
pub mod store {
    /// Directory for admitted source videos.
    pub const UPLOADS_DIR: &str = "uploads";
    /// Directory for per-job outputs.
    pub const OUTPUTS_DIR: &str = "outputs";
    /// Directory for per-job scratch space.
    pub const WORK_DIR: &str = "work";
    /// Per-job metadata file name.
    pub const METADATA_FILE: &str = "metadata.json";
    /// Caption sidecar extension.
    pub const CAPTIONS_EXT: &str = "captions";
}
