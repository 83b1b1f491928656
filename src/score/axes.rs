//! Keyword matching and per-axis scoring.

use crate::config::Lexicon;
use crate::constants::score::{AXIS_FULL_MATCHES, FILLER_PENALTY_CAP, FILLER_PENALTY_PER_MATCH};
use serde::{Deserialize, Serialize};

/// Raw per-axis scores for one candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxisScores {
    /// Opening-strength axis.
    pub hook: f64,
    /// Affective vocabulary axis.
    pub emotional: f64,
    /// Opinion and dispute axis.
    pub controversial: f64,
    /// Explanatory axis.
    pub educational: f64,
    /// Humor and spectacle axis.
    pub entertaining: f64,
    /// Monetization axis.
    pub money: f64,
    /// Time-pressure axis.
    pub urgency: f64,
    /// Accumulated filler penalty, subtracted from the audio composite.
    pub filler_penalty: f64,
    /// Whether the text contains a question mark.
    pub has_question: bool,
    /// Whether the text contains a digit.
    pub has_number: bool,
    /// Whether the text contains an exclamation mark.
    pub has_exclamation: bool,
}

/// Normalize text for keyword matching: lowercase tokens joined by single
/// spaces, punctuation stripped at token edges.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count whole-word occurrences of `keyword` (itself normalized) in
/// normalized text. Multi-word keywords match as phrases.
pub fn count_matches(normalized: &str, keyword: &str) -> usize {
    let keyword = normalize_text(keyword);
    if keyword.is_empty() || normalized.is_empty() {
        return 0;
    }
    let text_tokens: Vec<&str> = normalized.split(' ').collect();
    let keyword_tokens: Vec<&str> = keyword.split(' ').collect();
    text_tokens
        .windows(keyword_tokens.len())
        .filter(|window| *window == keyword_tokens.as_slice())
        .count()
}

/// Total matches across an axis's keyword list.
fn axis_matches(normalized: &str, keywords: &[String]) -> usize {
    keywords.iter().map(|k| count_matches(normalized, k)).sum()
}

/// Map a match count to a [0,1] axis score.
fn axis_score(matches: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    (matches as f64 / AXIS_FULL_MATCHES).min(1.0)
}

/// Score all axes of a candidate's text against a language's lexicon.
pub fn score_axes(text: &str, lexicon: &Lexicon) -> AxisScores {
    let normalized = normalize_text(text);

    let filler_matches = axis_matches(&normalized, &lexicon.filler);
    #[allow(clippy::cast_precision_loss)]
    let filler_penalty =
        (FILLER_PENALTY_PER_MATCH * filler_matches as f64).min(FILLER_PENALTY_CAP);

    AxisScores {
        hook: axis_score(axis_matches(&normalized, &lexicon.hook)),
        emotional: axis_score(axis_matches(&normalized, &lexicon.emotional)),
        controversial: axis_score(axis_matches(&normalized, &lexicon.controversial)),
        educational: axis_score(axis_matches(&normalized, &lexicon.educational)),
        entertaining: axis_score(axis_matches(&normalized, &lexicon.entertaining)),
        money: axis_score(axis_matches(&normalized, &lexicon.money)),
        urgency: axis_score(axis_matches(&normalized, &lexicon.urgency)),
        filler_penalty,
        has_question: text.contains('?'),
        has_number: text.chars().any(|c| c.is_ascii_digit()),
        has_exclamation: text.contains('!'),
    }
}

/// Audio engagement composite, clipped to [0,1].
pub fn audio_engagement(axes: &AxisScores) -> f64 {
    let boolean = |b: bool| if b { 0.05 } else { 0.0 };
    let raw = 0.25 * axes.hook
        + 0.18 * axes.emotional
        + 0.12 * axes.controversial
        + 0.12 * axes.educational
        + 0.12 * axes.entertaining
        + 0.15 * axes.money
        + 0.15 * axes.urgency
        + boolean(axes.has_question)
        + boolean(axes.has_number)
        + boolean(axes.has_exclamation)
        - axes.filler_penalty;
    raw.clamp(0.0, 1.0)
}

/// Visual engagement composite, clipped to [0,1].
///
/// Carries a closeup bonus above 0.5 face ratio and a motion bonus above
/// 0.6 motion.
pub fn visual_engagement(face_ratio: f64, motion: f64, brightness: f64) -> f64 {
    let mut raw = 0.5 * face_ratio + 0.3 * motion + 0.2 * brightness;
    if face_ratio > 0.5 {
        raw += 0.08;
    }
    if motion > 0.6 {
        raw += 0.08;
    }
    raw.clamp(0.0, 1.0)
}
