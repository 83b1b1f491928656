//! Command-line argument surface.

use crate::config::{AspectRatio, DurationClass, Style};
use clap::Parser;
use std::path::PathBuf;

/// Produce ranked short-form clips from a long-form video.
#[derive(Debug, Parser)]
#[command(name = "clipforge", version, about)]
pub struct Cli {
    /// Local source file, or a public URL with --url.
    pub input: String,

    /// Treat the input as a public video URL and fetch it first.
    #[arg(long)]
    pub url: bool,

    /// Maximum quality label for fetched sources (e.g. 1080p, best).
    #[arg(long, default_value = "1080p")]
    pub quality: String,

    /// Speech language hint (e.g. en, id); auto-detect by default.
    #[arg(short, long)]
    pub language: Option<String>,

    /// Requested clip duration class.
    #[arg(short = 'd', long, value_enum, default_value_t = DurationClass::Any)]
    pub duration_class: DurationClass,

    /// Scoring style preference.
    #[arg(short, long, value_enum, default_value_t = Style::Balanced)]
    pub style: Style,

    /// Draw the opening-hook overlay on each clip.
    #[arg(long)]
    pub hook: bool,

    /// Write a timed-caption sidecar next to each clip.
    #[arg(long)]
    pub captions: bool,

    /// Output aspect ratio.
    #[arg(short, long, value_enum, default_value_t = AspectRatio::Landscape)]
    pub aspect_ratio: AspectRatio,

    /// Artifact store root.
    #[arg(long, env = "CLIPFORGE_ROOT")]
    pub root: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Per-job options derived from the flags.
    pub fn job_options(&self) -> crate::config::JobOptions {
        crate::config::JobOptions {
            language: self.language.clone(),
            duration_class: self.duration_class,
            style: self.style,
            use_hook: self.hook,
            auto_caption: self.captions,
            aspect_ratio: self.aspect_ratio,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let cli = Cli::try_parse_from(["clipforge", "talk.mp4"]).unwrap();
        assert_eq!(cli.input, "talk.mp4");
        assert!(!cli.url);
        assert_eq!(cli.duration_class, DurationClass::Any);
        assert_eq!(cli.style, Style::Balanced);
        assert!(!cli.hook);
    }

    #[test]
    fn parses_full_invocation() {
        let cli = Cli::try_parse_from([
            "clipforge",
            "https://example.com/watch?v=x",
            "--url",
            "--quality",
            "720p",
            "--language",
            "id",
            "--duration-class",
            "medium",
            "--style",
            "educational",
            "--hook",
            "--captions",
            "--aspect-ratio",
            "portrait",
        ])
        .unwrap();
        assert!(cli.url);
        assert_eq!(cli.quality, "720p");
        let options = cli.job_options();
        assert_eq!(options.language.as_deref(), Some("id"));
        assert_eq!(options.duration_class, DurationClass::Medium);
        assert_eq!(options.style, Style::Educational);
        assert!(options.use_hook);
        assert!(options.auto_caption);
        assert_eq!(options.aspect_ratio, AspectRatio::Portrait);
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(Cli::try_parse_from(["clipforge"]).is_err());
    }
}
