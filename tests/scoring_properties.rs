//! Scorer properties over the fused pipeline.

use clipforge::config::{Config, JobOptions, LexiconSet, Style};
use clipforge::fuse::{FusedSegment, fuse};
use clipforge::score::{score_candidates, visual_engagement};
use clipforge::transcribe::SpeechSegment;
use clipforge::visual::{Scene, synthesize_monolog};

fn fused(text: &str, start: f64, end: f64) -> FusedSegment {
    FusedSegment {
        start,
        end,
        text: text.to_string(),
        language: "en".to_string(),
        face_ratio: 0.6,
        motion: 0.3,
        brightness: 0.7,
        synthetic: false,
        max_speech_gap: 0.4,
        speech_confidence: 0.9,
    }
}

fn score_one(segment: FusedSegment) -> clipforge::score::Candidate {
    score_candidates(
        vec![segment],
        &JobOptions::default(),
        &Config::default(),
        &LexiconSet::builtin(),
    )
    .remove(0)
}

#[test]
fn scorer_twice_yields_identical_results() {
    let text = "Imagine the secret nobody shares: invest 100 dollars today!";
    let a = score_one(fused(text, 10.0, 24.0));
    let b = score_one(fused(text, 10.0, 24.0));

    assert_eq!(a.viral_score.to_bits(), b.viral_score.to_bits());
    assert_eq!(a.audio_engagement.to_bits(), b.audio_engagement.to_bits());
    assert_eq!(a.visual_engagement.to_bits(), b.visual_engagement.to_bits());
    assert_eq!(a.category, b.category);
    assert_eq!(a.rationale, b.rationale);
}

#[test]
fn incomplete_context_penalty_is_exactly_point_six() {
    // Same axes; only the terminal punctuation differs.
    let complete = score_one(fused("Patience beats timing in markets.", 0.0, 20.0));
    let incomplete = score_one(fused("Patience beats timing in markets", 0.0, 20.0));

    assert!(complete.context_complete);
    assert!(!incomplete.context_complete);
    assert!((incomplete.viral_score - 0.6 * complete.viral_score).abs() < 1e-6);
}

#[test]
fn style_changes_ranking_but_not_determinism() {
    let educational_text = "Learn why this method works, step by step.";
    let base = score_candidates(
        vec![fused(educational_text, 0.0, 20.0)],
        &JobOptions::default(),
        &Config::default(),
        &LexiconSet::builtin(),
    )
    .remove(0);

    let styled = score_candidates(
        vec![fused(educational_text, 0.0, 20.0)],
        &JobOptions {
            style: Style::Educational,
            ..JobOptions::default()
        },
        &Config::default(),
        &LexiconSet::builtin(),
    )
    .remove(0);

    assert!(styled.viral_score > base.viral_score);
}

#[test]
fn monolog_scenes_carry_the_prior_closed_form() {
    // Scenario: a sparse-scene talking head. Synthetic scenes carry the
    // fixed prior, so their visual engagement equals the closed form.
    let scenes: Vec<Scene> = synthesize_monolog(480.0, 9.0);
    assert!(!scenes.is_empty());
    let speech: Vec<SpeechSegment> = Vec::new();
    let fused_segments = fuse(&scenes, &speech);
    let candidates = score_candidates(
        fused_segments,
        &JobOptions::default(),
        &Config::default(),
        &LexiconSet::builtin(),
    );

    let expected = visual_engagement(1.0, 0.3, 0.6);
    for candidate in &candidates {
        assert!(candidate.synthetic);
        assert!((candidate.visual_engagement - expected).abs() < 1e-9);
    }
}

#[test]
fn silent_windows_score_zero_audio_axes() {
    let candidate = score_one(FusedSegment {
        text: String::new(),
        ..fused("", 0.0, 15.0)
    });
    assert_eq!(candidate.audio_engagement, 0.0);
    assert_eq!(candidate.axes.hook, 0.0);
    assert_eq!(candidate.axes.money, 0.0);
    assert!(!candidate.context_complete);
}

#[test]
fn indonesian_lexicon_scores_indonesian_text() {
    let mut segment = fused(
        "Bayangkan rahasia investasi yang bikin untung jutaan rupiah sekarang!",
        0.0,
        14.0,
    );
    segment.language = "id".to_string();
    let candidate = score_candidates(
        vec![segment],
        &JobOptions::default(),
        &Config::default(),
        &LexiconSet::builtin(),
    )
    .remove(0);

    assert!(candidate.axes.hook > 0.0, "hook keywords should match");
    assert!(candidate.axes.money > 0.0, "money keywords should match");
    assert!(candidate.audio_engagement > 0.0);
}
