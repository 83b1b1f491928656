//! Clip selection.
//!
//! Enforces duration classes, the minimum-output floor, the viral-score
//! cutoff and non-overlap. Falls back first to score relaxation, then to
//! coverage tiling, before declaring the source insufficient.

use crate::config::{Config, JobOptions};
use crate::constants::{COVERAGE_WINDOW_SECONDS, MAX_CLIP_OVERLAP_SECONDS};
use crate::error::{Error, Result};
use crate::fuse::intersection;
use crate::score::{Candidate, Category};
use tracing::{debug, info};

/// Duration-class tolerance around the nominal bounds.
const CLASS_TOLERANCE: f64 = 0.10;

/// Result of selection.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Selected candidates, time-sorted.
    pub candidates: Vec<Candidate>,
    /// True when the floor could not be met; the job completes with a
    /// warning instead of failing.
    pub coverage_warning: bool,
}

/// Select the rendered set from all scored candidates.
pub fn select(
    candidates: &[Candidate],
    options: &JobOptions,
    config: &Config,
    source_duration: f64,
) -> Result<Selection> {
    if source_duration < config.clips.min_seconds {
        return Err(Error::InsufficientMaterial {
            reason: format!(
                "source is {source_duration:.1}s, below the {:.0}s clip minimum",
                config.clips.min_seconds
            ),
        });
    }

    let floor = config.clips.min_floor.min(config.clips.max_clips);

    // The clip range bound is unconditional; candidates outside it are
    // never eligible, whatever the duration class says.
    let eligible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| {
            (config.clips.min_seconds..=config.clips.max_seconds).contains(&c.duration())
        })
        .collect();

    // Step 1: duration-class filter, widened when it starves the floor.
    let mut pool: Vec<&Candidate> = filter_by_class(&eligible, options);
    if pool.len() < floor {
        debug!(
            "duration class keeps only {} candidates, widening to any",
            pool.len()
        );
        pool = eligible.clone();
    }

    // Step 2: rank.
    let mut ranked = pool;
    ranked.sort_by(|a, b| a.ranking_cmp(b));

    // Step 3: greedy non-overlapping pick above the score cutoff.
    let mut picked: Vec<Candidate> = Vec::new();
    for candidate in &ranked {
        if picked.len() >= config.clips.max_clips {
            break;
        }
        if candidate.viral_score < config.clips.min_viral {
            break;
        }
        if !overlaps_any(candidate, &picked) {
            picked.push((*candidate).clone());
        }
    }

    // Step 4: relax the cutoff over all eligible candidates to reach the
    // floor.
    if picked.len() < floor {
        let mut all = eligible;
        all.sort_by(|a, b| a.ranking_cmp(b));
        for candidate in all {
            if picked.len() >= floor {
                break;
            }
            if overlaps_any(candidate, &picked) {
                continue;
            }
            let mut fallback = candidate.clone();
            fallback.fallback = true;
            picked.push(fallback);
        }
        if !picked.is_empty() && picked.len() < floor {
            debug!("score relaxation reached only {} of {floor}", picked.len());
        }
    }

    // Step 5: fabricate coverage windows over free timeline space.
    if picked.len() < floor {
        let fabricated = tile_coverage(&picked, source_duration, config, floor);
        info!(
            "coverage fallback fabricated {} windows",
            fabricated.len()
        );
        picked.extend(fabricated);
    }

    // Step 6: a source where nothing fits at all is insufficient.
    if picked.is_empty() {
        return Err(Error::InsufficientMaterial {
            reason: "no candidate or coverage window fits the clip range".to_string(),
        });
    }

    let coverage_warning = picked.len() < floor;
    picked.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(Selection {
        candidates: picked,
        coverage_warning,
    })
}

/// Candidates whose duration falls inside the class bounds ± tolerance.
fn filter_by_class<'a>(
    candidates: &[&'a Candidate],
    options: &JobOptions,
) -> Vec<&'a Candidate> {
    match options.duration_class.bounds() {
        None => candidates.to_vec(),
        Some((lo, hi)) => {
            let lo = lo * (1.0 - CLASS_TOLERANCE);
            let hi = hi * (1.0 + CLASS_TOLERANCE);
            candidates
                .iter()
                .filter(|c| (lo..=hi).contains(&c.duration()))
                .copied()
                .collect()
        }
    }
}

/// Whether a candidate overlaps any picked window by at least half a second.
fn overlaps_any(candidate: &Candidate, picked: &[Candidate]) -> bool {
    picked.iter().any(|p| {
        intersection(candidate.start, candidate.end, p.start, p.end) >= MAX_CLIP_OVERLAP_SECONDS
    })
}

/// Fabricate non-overlapping coverage windows over the source timeline.
///
/// The window length is the coverage default, shrunk so `floor` windows
/// could tile the source, but never below the clip minimum.
fn tile_coverage(
    picked: &[Candidate],
    source_duration: f64,
    config: &Config,
    floor: usize,
) -> Vec<Candidate> {
    #[allow(clippy::cast_precision_loss)]
    let ideal = source_duration / floor.max(1) as f64;
    let window = ideal
        .min(COVERAGE_WINDOW_SECONDS)
        .max(config.clips.min_seconds)
        .min(config.clips.max_seconds);

    let mut fabricated = Vec::new();
    let mut offset = 0.0f64;
    let mut total = picked.len();

    while total < floor && offset + window <= source_duration + 1e-9 {
        let end = offset + window;
        let collision = picked
            .iter()
            .chain(fabricated.iter())
            .find(|p| intersection(offset, end, p.start, p.end) >= MAX_CLIP_OVERLAP_SECONDS);

        match collision {
            Some(blocking) => {
                // Jump past the blocking window and try again.
                offset = blocking.end.max(offset + 1.0);
            }
            None => {
                fabricated.push(coverage_candidate(offset, end));
                total += 1;
                offset = end;
            }
        }
    }

    fabricated
}

/// A fabricated candidate for a coverage window.
fn coverage_candidate(start: f64, end: f64) -> Candidate {
    Candidate {
        start,
        end,
        text: String::new(),
        language: "unknown".to_string(),
        face_ratio: 0.0,
        motion: 0.0,
        brightness: 0.0,
        synthetic: false,
        axes: crate::score::AxisScores::default(),
        audio_engagement: 0.0,
        visual_engagement: 0.0,
        viral_score: 0.0,
        category: Category::Balanced,
        rationale: "coverage fallback".to_string(),
        context_complete: false,
        fallback: true,
        hook_text: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::DurationClass;
    use crate::score::AxisScores;

    fn candidate(start: f64, end: f64, viral: f64) -> Candidate {
        Candidate {
            start,
            end,
            text: "words".to_string(),
            language: "en".to_string(),
            face_ratio: 0.5,
            motion: 0.3,
            brightness: 0.6,
            synthetic: false,
            axes: AxisScores::default(),
            audio_engagement: 0.2,
            visual_engagement: 0.5,
            viral_score: viral,
            category: Category::Balanced,
            rationale: "general interest".to_string(),
            context_complete: true,
            fallback: false,
            hook_text: None,
        }
    }

    fn config() -> Config {
        Config::default()
    }

    fn options() -> JobOptions {
        JobOptions::default()
    }

    #[test]
    fn sub_minimum_source_is_insufficient() {
        let err = select(&[], &options(), &config(), 5.0).unwrap_err();
        assert!(matches!(err, Error::InsufficientMaterial { .. }));
    }

    #[test]
    fn picks_top_scores_without_overlap() {
        // Ten disjoint 20s candidates with rising scores.
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| candidate(f64::from(i) * 25.0, f64::from(i) * 25.0 + 20.0, 0.1 + 0.05 * f64::from(i)))
            .collect();
        let selection = select(&candidates, &options(), &config(), 300.0).unwrap();
        assert_eq!(selection.candidates.len(), 10);
        assert!(!selection.coverage_warning);
        // Output is time-sorted regardless of rank order.
        let starts: Vec<f64> = selection.candidates.iter().map(|c| c.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(starts, sorted);
    }

    #[test]
    fn overlapping_candidates_keep_best_only() {
        let candidates = vec![
            candidate(0.0, 20.0, 0.9),
            candidate(10.0, 30.0, 0.8),
            candidate(40.0, 60.0, 0.7),
            candidate(70.0, 90.0, 0.6),
            candidate(100.0, 120.0, 0.5),
            candidate(130.0, 150.0, 0.4),
        ];
        let selection = select(&candidates, &options(), &config(), 300.0).unwrap();
        assert_eq!(selection.candidates.len(), 5);
        assert!(!selection
            .candidates
            .iter()
            .any(|c| c.start == 10.0 && c.end == 30.0));
    }

    #[test]
    fn pairwise_overlap_stays_under_half_second() {
        let candidates = vec![
            candidate(0.0, 20.0, 0.9),
            candidate(19.6, 40.0, 0.8),
            candidate(50.0, 70.0, 0.7),
            candidate(80.0, 100.0, 0.6),
            candidate(110.0, 130.0, 0.5),
        ];
        let selection = select(&candidates, &options(), &config(), 300.0).unwrap();
        // 0.4s overlap is tolerated.
        assert_eq!(selection.candidates.len(), 5);
        for (i, a) in selection.candidates.iter().enumerate() {
            for b in &selection.candidates[i + 1..] {
                assert!(intersection(a.start, a.end, b.start, b.end) < 0.5);
            }
        }
    }

    #[test]
    fn duration_class_filters_with_tolerance() {
        let mut opts = options();
        opts.duration_class = DurationClass::Medium;
        // 24.2s is exactly at 22 * 1.1: inside. 25s is outside.
        let candidates = vec![
            candidate(0.0, 24.2, 0.9),
            candidate(30.0, 55.0, 0.9),
            candidate(60.0, 80.0, 0.8),
            candidate(90.0, 110.0, 0.7),
            candidate(120.0, 140.0, 0.6),
            candidate(150.0, 170.0, 0.5),
        ];
        let selection = select(&candidates, &opts, &config(), 300.0).unwrap();
        assert!(selection
            .candidates
            .iter()
            .all(|c| c.duration() <= 24.2 + 1e-9));
    }

    #[test]
    fn low_scores_fall_back_with_flag() {
        // All below MIN_VIRAL: step 3 picks none, step 4 relaxes.
        let candidates = vec![
            candidate(0.0, 20.0, 0.01),
            candidate(30.0, 50.0, 0.02),
            candidate(60.0, 80.0, 0.03),
            candidate(90.0, 110.0, 0.04),
            candidate(120.0, 140.0, 0.05),
        ];
        let selection = select(&candidates, &options(), &config(), 300.0).unwrap();
        assert_eq!(selection.candidates.len(), 5);
        assert!(selection.candidates.iter().all(|c| c.fallback));
        assert!(!selection.coverage_warning);
    }

    #[test]
    fn no_speech_source_tiles_coverage_windows() {
        // One candidate covering nothing useful; a 60s source must still
        // yield the floor via fabricated windows.
        let selection = select(&[], &options(), &config(), 60.0).unwrap();
        assert_eq!(selection.candidates.len(), 5);
        assert!(selection.candidates.iter().all(|c| c.fallback));
        assert!(selection
            .candidates
            .iter()
            .all(|c| c.rationale == "coverage fallback"));
        // 60s / 5 = 12s windows.
        assert!(selection.candidates.iter().all(|c| (c.duration() - 12.0).abs() < 1e-9));
        assert_eq!(selection.candidates[0].start, 0.0);
        assert!(!selection.coverage_warning);
    }

    #[test]
    fn nine_second_source_yields_single_fallback_clip() {
        let selection = select(&[], &options(), &config(), 9.0).unwrap();
        assert_eq!(selection.candidates.len(), 1);
        let clip = &selection.candidates[0];
        assert!(clip.fallback);
        assert!(!clip.context_complete);
        assert_eq!(clip.duration(), 9.0);
        assert!(selection.coverage_warning);
    }

    #[test]
    fn tiling_respects_existing_picks() {
        let candidates = vec![candidate(10.0, 30.0, 0.9)];
        let selection = select(&candidates, &options(), &config(), 120.0).unwrap();
        assert_eq!(selection.candidates.len(), 5);
        for (i, a) in selection.candidates.iter().enumerate() {
            for b in &selection.candidates[i + 1..] {
                assert!(intersection(a.start, a.end, b.start, b.end) < 0.5);
            }
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates: Vec<Candidate> = (0..8)
            .map(|i| candidate(f64::from(i) * 30.0, f64::from(i) * 30.0 + 20.0, 0.3))
            .collect();
        let a = select(&candidates, &options(), &config(), 300.0).unwrap();
        let b = select(&candidates, &options(), &config(), 300.0).unwrap();
        let key = |s: &Selection| -> Vec<(u64, u64)> {
            s.candidates
                .iter()
                .map(|c| (c.start.to_bits(), c.viral_score.to_bits()))
                .collect()
        };
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn respects_max_clips_cap() {
        let mut cfg = config();
        cfg.clips.max_clips = 3;
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| candidate(f64::from(i) * 30.0, f64::from(i) * 30.0 + 20.0, 0.5))
            .collect();
        let selection = select(&candidates, &options(), &cfg, 400.0).unwrap();
        assert_eq!(selection.candidates.len(), 3);
    }
}
