//! Deterministic rationale strings.

use super::axes::AxisScores;
use crate::constants::score::RATIONALE_THRESHOLD;

/// Build the human-readable rationale for a candidate.
///
/// Phrases are emitted in a fixed order for whichever signals exceed the
/// threshold, so identical inputs always produce identical strings.
pub fn build_rationale(axes: &AxisScores, face_ratio: f64, motion: f64) -> String {
    let mut phrases: Vec<&str> = Vec::new();

    if axes.hook > RATIONALE_THRESHOLD {
        phrases.push("strong hook");
    }
    if axes.emotional > RATIONALE_THRESHOLD {
        phrases.push("emotional content");
    }
    if axes.controversial > RATIONALE_THRESHOLD {
        phrases.push("sparks debate");
    }
    if axes.educational > RATIONALE_THRESHOLD {
        phrases.push("clear takeaway");
    }
    if axes.entertaining > RATIONALE_THRESHOLD {
        phrases.push("high entertainment");
    }
    if axes.money > RATIONALE_THRESHOLD {
        phrases.push("money angle");
    }
    if axes.urgency > RATIONALE_THRESHOLD {
        phrases.push("time pressure");
    }
    if face_ratio > RATIONALE_THRESHOLD {
        phrases.push("closeup speaker");
    }
    if motion > 0.6 {
        phrases.push("dynamic visuals");
    }

    if phrases.is_empty() {
        "general interest".to_string()
    } else {
        phrases.join(" + ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_phrases_in_fixed_order() {
        let axes = AxisScores {
            hook: 0.9,
            emotional: 0.7,
            ..AxisScores::default()
        };
        assert_eq!(
            build_rationale(&axes, 0.8, 0.1),
            "strong hook + emotional content + closeup speaker"
        );
    }

    #[test]
    fn below_threshold_yields_general_interest() {
        let axes = AxisScores::default();
        assert_eq!(build_rationale(&axes, 0.2, 0.1), "general interest");
    }

    #[test]
    fn identical_inputs_identical_output() {
        let axes = AxisScores {
            educational: 0.6,
            money: 0.55,
            ..AxisScores::default()
        };
        let a = build_rationale(&axes, 0.0, 0.7);
        let b = build_rationale(&axes, 0.0, 0.7);
        assert_eq!(a, b);
        assert_eq!(a, "clear takeaway + money angle + dynamic visuals");
    }
}
