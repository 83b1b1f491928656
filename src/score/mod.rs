//! Candidate scoring.
//!
//! Assigns per-axis scores, the audio/visual composites and the final
//! viral score; tags each candidate with a category, a deterministic
//! rationale and a context-completeness verdict.

mod axes;
mod context;
mod rationale;

pub use axes::{AxisScores, audio_engagement, count_matches, normalize_text, score_axes,
    visual_engagement};
pub use context::is_context_complete;
pub use rationale::build_rationale;

use crate::config::{Config, JobOptions, LexiconSet, Style};
use crate::constants::score::{CATEGORY_THRESHOLD, INCOMPLETE_CONTEXT_PENALTY, TIER_HIGH, TIER_MEDIUM};
use crate::fuse::FusedSegment;
use serde::{Deserialize, Serialize};

/// Content category of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Explanatory content.
    Educational,
    /// Humor or spectacle.
    Entertaining,
    /// Affective content.
    Emotional,
    /// Opinion or dispute.
    Controversial,
    /// Nothing dominant.
    #[default]
    Balanced,
}

impl Category {
    /// Stable string form used in metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Educational => "educational",
            Self::Entertaining => "entertaining",
            Self::Emotional => "emotional",
            Self::Controversial => "controversial",
            Self::Balanced => "balanced",
        }
    }
}

/// Coarse viral-score bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViralTier {
    /// Score at or above 0.75.
    High,
    /// Score at or above 0.5.
    Medium,
    /// Everything below.
    Low,
}

impl ViralTier {
    /// Bucket a viral score.
    pub fn for_score(score: f64) -> Self {
        if score >= TIER_HIGH {
            Self::High
        } else if score >= TIER_MEDIUM {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Stable string form used in metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A scored candidate window, eligible for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Window start in seconds.
    pub start: f64,
    /// Window end in seconds.
    pub end: f64,
    /// Concatenated overlapping speech.
    pub text: String,
    /// Dominant speech language.
    pub language: String,
    /// Face presence ratio from the scene roll-up.
    pub face_ratio: f64,
    /// Motion score from the scene roll-up.
    pub motion: f64,
    /// Brightness score from the scene roll-up.
    pub brightness: f64,
    /// Whether the underlying scene was fabricated.
    pub synthetic: bool,
    /// Raw per-axis scores.
    pub axes: AxisScores,
    /// Audio engagement composite.
    pub audio_engagement: f64,
    /// Visual engagement composite.
    pub visual_engagement: f64,
    /// Final composite in [0,1], penalized when context-incomplete.
    pub viral_score: f64,
    /// Dominant category.
    pub category: Category,
    /// Deterministic rationale string.
    pub rationale: String,
    /// Whether the window is a self-contained statement.
    pub context_complete: bool,
    /// Selected only to satisfy the minimum-output floor.
    pub fallback: bool,
    /// Opening-hook text for the overlay, when derivable.
    pub hook_text: Option<String>,
}

impl Candidate {
    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Ranking comparator: viral score descending, then hook axis
    /// descending, then start ascending.
    pub fn ranking_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .viral_score
            .partial_cmp(&self.viral_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                other
                    .axes
                    .hook
                    .partial_cmp(&self.axes.hook)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                self.start
                    .partial_cmp(&other.start)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Pacing bonus for short, punchy windows.
fn pacing_bonus(duration: f64) -> f64 {
    if duration <= 15.0 {
        0.15
    } else if duration <= 25.0 {
        0.10
    } else {
        0.05
    }
}

/// Style bonus: a tenth of the named style's axis.
fn style_bonus(style: Style, axes: &AxisScores) -> f64 {
    let axis = match style {
        Style::Balanced => return 0.0,
        Style::Funny => axes.entertaining,
        Style::Educational => axes.educational,
        Style::Dramatic => axes.emotional,
        Style::Controversial => axes.controversial,
    };
    0.10 * axis
}

/// Dominant category among the four content axes.
///
/// Ties resolve in the listed order; everything below the threshold is
/// balanced.
fn categorize(axes: &AxisScores) -> Category {
    let ranked = [
        (Category::Educational, axes.educational),
        (Category::Entertaining, axes.entertaining),
        (Category::Emotional, axes.emotional),
        (Category::Controversial, axes.controversial),
    ];
    let (category, best) = ranked
        .into_iter()
        .reduce(|acc, item| if item.1 > acc.1 { item } else { acc })
        .unwrap_or((Category::Balanced, 0.0));
    if best < CATEGORY_THRESHOLD {
        Category::Balanced
    } else {
        category
    }
}

/// Maximum hook overlay length in characters.
const HOOK_MAX_CHARS: usize = 60;

/// Derive overlay text from the window's opening sentence.
fn hook_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let sentence_end = trimmed
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map_or(trimmed.len(), |(i, _)| i);
    let sentence = trimmed[..sentence_end].trim();
    if sentence.is_empty() {
        return None;
    }
    let clipped: String = sentence.chars().take(HOOK_MAX_CHARS).collect();
    Some(clipped)
}

/// Score fused windows into candidates.
pub fn score_candidates(
    fused: Vec<FusedSegment>,
    options: &JobOptions,
    config: &Config,
    lexicons: &LexiconSet,
) -> Vec<Candidate> {
    fused
        .into_iter()
        .map(|segment| score_one(segment, options, config, lexicons))
        .collect()
}

fn score_one(
    segment: FusedSegment,
    options: &JobOptions,
    config: &Config,
    lexicons: &LexiconSet,
) -> Candidate {
    // Lexicon choice: decoded language first, then the job's hint.
    let language_tag = if segment.language == "unknown" {
        options
            .language
            .clone()
            .unwrap_or_else(|| config.transcriber.language.clone())
    } else {
        segment.language.clone()
    };
    let lexicon = lexicons.for_language(&language_tag);

    let axes = score_axes(&segment.text, lexicon);
    let audio = audio_engagement(&axes);
    let visual = visual_engagement(segment.face_ratio, segment.motion, segment.brightness);
    let duration = segment.duration();

    let context_complete = is_context_complete(
        &segment.text,
        duration,
        segment.max_speech_gap,
        &config.clips,
        lexicon,
    );

    let mut viral = 0.35 * axes.hook
        + 0.25 * audio
        + 0.25 * visual
        + pacing_bonus(duration)
        + style_bonus(options.style, &axes);
    viral = viral.clamp(0.0, 1.0);
    if !context_complete {
        viral *= INCOMPLETE_CONTEXT_PENALTY;
    }

    let category = categorize(&axes);
    let rationale = build_rationale(&axes, segment.face_ratio, segment.motion);
    let hook = hook_text(&segment.text);

    Candidate {
        start: segment.start,
        end: segment.end,
        text: segment.text,
        language: language_tag,
        face_ratio: segment.face_ratio,
        motion: segment.motion,
        brightness: segment.brightness,
        synthetic: segment.synthetic,
        axes,
        audio_engagement: audio,
        visual_engagement: visual,
        viral_score: viral,
        category,
        rationale,
        context_complete,
        fallback: false,
        hook_text: hook,
    }
}
