//! The per-job pipeline driver.
//!
//! Runs the fixed stage sequence for one job, publishing progress at the
//! canonical points and polling the cancel flag between stages.

use super::types::JobHandle;
use crate::config::LexiconSet;
use crate::constants::progress;
use crate::error::{Error, Result};
use crate::fuse;
use crate::probe::probe_media;
use crate::render::{RenderOutcome, render_all};
use crate::score::score_candidates;
use crate::select::select;
use crate::store::{ArtifactStore, build_metadata};
use crate::transcribe::transcribe;
use crate::visual::analyze;
use tracing::{info, warn};

/// Drive one job through the pipeline.
///
/// The handle is already in running state; this function finishes it as
/// completed or error and never returns an unhandled failure.
pub fn run_job(store: &ArtifactStore, lexicons: &LexiconSet, job: &JobHandle) {
    match execute(store, lexicons, job) {
        Ok(()) => {}
        Err(Error::Cancelled) => {
            info!("job {} cancelled", job.id);
            job.finish_error("cancelled", "cancelled between stages");
            store.remove_work_dir(&job.id);
        }
        Err(e) => {
            warn!("job {} failed: {e}", job.id);
            job.finish_error(e.kind(), e.to_string());
            store.remove_work_dir(&job.id);
        }
    }
}

fn check_cancel(job: &JobHandle) -> Result<()> {
    if job.cancel_requested() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn execute(store: &ArtifactStore, lexicons: &LexiconSet, job: &JobHandle) -> Result<()> {
    let config = &job.config;
    let source = store.find_source(&job.source_id)?;
    let (output_dir, work_dir) = store.create_job_dirs(&job.id)?;

    // Stage: probe.
    let media = probe_media(&config.tools, &source)?;
    job.set_progress(progress::PROBE, "probed source");
    if media.duration < config.clips.min_seconds {
        return Err(Error::InsufficientMaterial {
            reason: format!(
                "source is {:.1}s, below the {:.0}s clip minimum",
                media.duration, config.clips.min_seconds
            ),
        });
    }
    check_cancel(job)?;

    // Stage: transcribe. Runs before visual analysis; the two compete for
    // the same hardware and are deliberately sequential.
    job.set_progress(progress::TRANSCRIBE_START, "transcribing");
    let speech = transcribe(config, &source, &media, &work_dir)?;
    job.set_progress(
        progress::TRANSCRIBE_DONE,
        format!("transcribed {} segments", speech.len()),
    );
    check_cancel(job)?;

    // Stage: visual analysis.
    let scenes = analyze(config, &source, &media, &work_dir)?;
    job.set_progress(progress::VISUAL_DONE, format!("analyzed {} scenes", scenes.len()));
    check_cancel(job)?;

    // Stage: fuse and score.
    let fused = fuse::fuse(&scenes, &speech);
    let candidates = score_candidates(fused, &job.options, config, lexicons);
    job.set_progress(
        progress::FUSE_SCORE,
        format!("scored {} candidates", candidates.len()),
    );
    check_cancel(job)?;

    // Stage: select.
    let selection = select(&candidates, &job.options, config, media.duration)?;
    job.set_progress(
        progress::SELECT,
        format!("selected {} clips", selection.candidates.len()),
    );
    check_cancel(job)?;

    // Stage: render.
    job.set_progress(progress::RENDER_START, "rendering");
    let outcome = run_renders(job, &source, &speech, &selection.candidates, &output_dir)?;
    job.set_progress(
        progress::RENDER_DONE,
        format!("rendered {} clips", outcome.clips.len()),
    );
    check_cancel(job)?;

    // Stage: finalize.
    let snapshot = serde_json::json!({
        "process": config,
        "job": &job.options,
    });
    let metadata = build_metadata(
        &job.id,
        &source.to_string_lossy(),
        media.duration,
        snapshot,
        &outcome.clips,
    );
    store.write_metadata(&job.id, &metadata)?;
    store.remove_work_dir(&job.id);

    let floor = config.clips.min_floor.min(config.clips.max_clips);
    let warning = if outcome.clips.len() < floor {
        Some(format!(
            "completed with {} of {floor} clips (coverage shortfall)",
            outcome.clips.len()
        ))
    } else if selection.coverage_warning {
        Some(format!(
            "completed with {} of {floor} clips (source too short for full coverage)",
            outcome.clips.len()
        ))
    } else {
        None
    };

    job.set_progress(progress::FINALIZE, "finalized");
    job.finish_completed(outcome.clips, warning);
    Ok(())
}

fn run_renders(
    job: &JobHandle,
    source: &std::path::Path,
    speech: &[crate::transcribe::SpeechSegment],
    selection: &[crate::score::Candidate],
    output_dir: &std::path::Path,
) -> Result<RenderOutcome> {
    let total = selection.len().max(1);
    let span = progress::RENDER_DONE - progress::RENDER_START;
    let on_clip_done = move |done: usize, _total: usize| {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let step = progress::RENDER_START
            + ((f64::from(span) * done as f64 / total as f64) as u8).min(span);
        job.set_progress(step, format!("rendered clip {done}/{total}"));
    };

    render_all(
        &job.config,
        &job.options,
        source,
        speech,
        selection,
        output_dir,
        job.cancel_flag(),
        &on_clip_done,
    )
}
