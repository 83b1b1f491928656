//! Error types for clipforge.

/// Result type alias for clipforge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for clipforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to read lexicon file.
    #[error("failed to read lexicon file '{path}'")]
    LexiconRead {
        /// Path to the lexicon file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse lexicon file.
    #[error("failed to parse lexicon file '{path}'")]
    LexiconParse {
        /// Path to the lexicon file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// External tool could not be launched.
    #[error("failed to launch '{program}'")]
    ToolSpawn {
        /// Program that failed to launch.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// External tool exited with a failure status.
    #[error("'{program}' exited with status {status}: {stderr_tail}")]
    ToolFailed {
        /// Program that failed.
        program: String,
        /// Exit status code, or -1 when killed by signal.
        status: i32,
        /// Last lines of the tool's stderr.
        stderr_tail: String,
    },

    /// External tool exceeded its deadline and was killed.
    #[error("'{program}' timed out after {deadline_secs}s")]
    ToolTimeout {
        /// Program that timed out.
        program: String,
        /// Deadline that was exceeded, in seconds.
        deadline_secs: u64,
    },

    /// Failed to parse an external tool's report.
    #[error("failed to parse {program} report: {message}")]
    ToolReport {
        /// Program whose report could not be parsed.
        program: String,
        /// Description of the parse failure.
        message: String,
    },

    /// Media container could not be read or has no video stream.
    #[error("unreadable media: {path}")]
    UnreadableMedia {
        /// Path to the media file.
        path: std::path::PathBuf,
    },

    /// Source exceeds the configured duration or size limits.
    #[error("source too large: {reason}")]
    SourceTooLarge {
        /// Which limit was violated.
        reason: String,
    },

    /// Transcription could not produce reliable coverage of the source.
    #[error("transcription unreliable: {reason}")]
    TranscriptionUnreliable {
        /// Description of the coverage failure.
        reason: String,
    },

    /// All transcription passes errored.
    #[error("speech decoding backend unavailable: {reason}")]
    BackendUnavailable {
        /// Description of the last failure.
        reason: String,
    },

    /// Visual analysis produced no usable scenes.
    #[error("visual analysis failed: {reason}")]
    VisualAnalysisFailed {
        /// Description of the failure.
        reason: String,
    },

    /// Source is too short to satisfy the minimum clip output.
    #[error("insufficient material: {reason}")]
    InsufficientMaterial {
        /// Description of the shortfall.
        reason: String,
    },

    /// Every selected clip failed to render.
    #[error("all {count} clip renders failed")]
    RenderFailedAll {
        /// Number of clips attempted.
        count: usize,
    },

    /// Fetching the source from a remote URL failed permanently.
    #[error("failed to fetch '{url}': {reason}")]
    FetchFailed {
        /// URL that failed.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// Job was cancelled.
    #[error("job cancelled")]
    Cancelled,

    /// Job queue is at capacity.
    #[error("job queue is at capacity")]
    Busy,

    /// Job not found.
    #[error("job '{id}' not found")]
    JobNotFound {
        /// Job identifier.
        id: String,
    },

    /// Operation rejected for a job in its current state.
    #[error("job '{id}' is {state}")]
    JobState {
        /// Job identifier.
        id: String,
        /// Current state that rejected the operation.
        state: String,
    },

    /// Source video not found in the artifact store.
    #[error("source '{id}' not found")]
    SourceNotFound {
        /// Source identifier.
        id: String,
    },

    /// Failed to write a metadata file.
    #[error("failed to write metadata file '{path}'")]
    MetadataWrite {
        /// Path to the metadata file.
        path: std::path::PathBuf,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to parse a caption sidecar.
    #[error("invalid caption sidecar at record {record}: {message}")]
    CaptionParse {
        /// 1-indexed record number where parsing failed.
        record: usize,
        /// Description of the parse failure.
        message: String,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Public error kind surfaced in `Job.message` when a job fails.
    ///
    /// Every error maps to exactly one of the documented kind strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnreadableMedia { .. } => "unreadable-media",
            Self::SourceTooLarge { .. } => "source-too-large",
            Self::TranscriptionUnreliable { .. } => "transcription-unreliable",
            Self::BackendUnavailable { .. } => "backend-unavailable",
            Self::VisualAnalysisFailed { .. } => "visual-analysis-failed",
            Self::InsufficientMaterial { .. } => "insufficient-material",
            Self::RenderFailedAll { .. } => "render-failed-all",
            Self::Cancelled => "cancelled",
            _ => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_documented_kinds() {
        assert_eq!(
            Error::UnreadableMedia {
                path: "x.mp4".into()
            }
            .kind(),
            "unreadable-media"
        );
        assert_eq!(
            Error::InsufficientMaterial {
                reason: "too short".into()
            }
            .kind(),
            "insufficient-material"
        );
        assert_eq!(Error::Cancelled.kind(), "cancelled");
        assert_eq!(Error::RenderFailedAll { count: 3 }.kind(), "render-failed-all");
    }

    #[test]
    fn kind_defaults_to_internal() {
        assert_eq!(
            Error::Internal {
                message: "boom".into()
            }
            .kind(),
            "internal"
        );
        assert_eq!(
            Error::ToolSpawn {
                program: "ffmpeg".into(),
                source: std::io::Error::other("gone"),
            }
            .kind(),
            "internal"
        );
    }
}
