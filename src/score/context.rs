//! Context-completeness evaluation.
//!
//! A candidate is context-complete only when its text reads as a
//! self-contained statement: it opens at a sentence-like boundary, closes
//! on terminal punctuation or a conclusion phrase, fits the configured
//! clip range, and has no long dead air inside its speech coverage.

use super::axes::normalize_text;
use crate::config::{ClipConfig, Lexicon};
use crate::constants::score::MAX_CONTEXT_SPEECH_GAP;

/// Characters that close a sentence.
const TERMINAL_PUNCTUATION: [char; 4] = ['.', '!', '?', '…'];

/// Evaluate context completeness for a candidate window.
pub fn is_context_complete(
    text: &str,
    duration: f64,
    max_speech_gap: f64,
    clips: &ClipConfig,
    lexicon: &Lexicon,
) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if !(clips.min_seconds..=clips.max_seconds).contains(&duration) {
        return false;
    }
    if max_speech_gap > MAX_CONTEXT_SPEECH_GAP {
        return false;
    }
    if !starts_at_sentence_boundary(trimmed, lexicon) {
        return false;
    }
    if !ends_conclusively(trimmed, lexicon) {
        return false;
    }
    has_content_word(trimmed, lexicon)
}

/// The first token must not be a mid-sentence transition word.
fn starts_at_sentence_boundary(text: &str, lexicon: &Lexicon) -> bool {
    let normalized = normalize_text(text);
    let Some(first) = normalized.split(' ').next().filter(|t| !t.is_empty()) else {
        return false;
    };
    !lexicon
        .transitions
        .iter()
        .any(|t| normalize_text(t) == first)
}

/// The text must end with terminal punctuation or a conclusion phrase.
fn ends_conclusively(text: &str, lexicon: &Lexicon) -> bool {
    let end = text.trim_end_matches(['"', '\'', ')', ']']);
    if end.ends_with(TERMINAL_PUNCTUATION) {
        return true;
    }
    let normalized = normalize_text(text);
    lexicon.conclusions.iter().any(|phrase| {
        let phrase = normalize_text(phrase);
        !phrase.is_empty()
            && (normalized == phrase || normalized.ends_with(&format!(" {phrase}")))
    })
}

/// At least one token outside the filler table.
fn has_content_word(text: &str, lexicon: &Lexicon) -> bool {
    let fillers: Vec<String> = lexicon.filler.iter().map(|f| normalize_text(f)).collect();
    normalize_text(text)
        .split(' ')
        .any(|token| !token.is_empty() && !fillers.iter().any(|f| f == token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LexiconSet;

    fn english() -> Lexicon {
        LexiconSet::builtin().for_language("en").clone()
    }

    fn clips() -> ClipConfig {
        ClipConfig::default()
    }

    fn complete(text: &str, duration: f64, gap: f64) -> bool {
        is_context_complete(text, duration, gap, &clips(), &english())
    }

    #[test]
    fn accepts_a_self_contained_statement() {
        assert!(complete("Compound interest doubles your money over time.", 20.0, 0.5));
    }

    #[test]
    fn rejects_transition_word_opening() {
        assert!(!complete("But the market crashed the next day.", 20.0, 0.5));
        assert!(!complete("because it rained.", 20.0, 0.5));
    }

    #[test]
    fn rejects_dangling_ending() {
        assert!(!complete("The secret to saving money is", 20.0, 0.5));
    }

    #[test]
    fn accepts_conclusion_phrase_ending() {
        assert!(complete("Save early and save often, that's it", 20.0, 0.5));
    }

    #[test]
    fn accepts_quoted_terminal_punctuation() {
        assert!(complete("She said \"never give up.\"", 20.0, 0.5));
    }

    #[test]
    fn rejects_out_of_range_duration() {
        assert!(!complete("A fine statement.", 4.0, 0.5));
        assert!(!complete("A fine statement.", 80.0, 0.5));
    }

    #[test]
    fn rejects_long_speech_gap() {
        assert!(!complete("A fine statement.", 20.0, 3.5));
        assert!(complete("A fine statement.", 20.0, 3.0));
    }

    #[test]
    fn rejects_empty_and_filler_only_text() {
        assert!(!complete("", 20.0, 0.0));
        assert!(!complete("um uh like.", 20.0, 0.0));
    }
}
