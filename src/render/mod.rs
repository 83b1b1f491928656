//! Clip rendering through the external media tool.
//!
//! Each selected candidate is cut, re-encoded and optionally decorated in
//! its own tool invocation. Invocations run in a bounded pool, carry a
//! duration-scaled deadline, and retry once without overlays or silence
//! compaction before the clip is dropped.

mod captions;
mod command;
mod silence;

pub use captions::{build_sidecar, format_timestamp, parse_sidecar, parse_timestamp};
pub use command::{RenderPlan, build_args, escape_drawtext};
pub use silence::{SilenceSpan, detect_silences, keep_intervals, kept_duration, parse_detector_log};

use crate::config::{Config, JobOptions};
use crate::constants::{RENDER_DEADLINE_FACTOR, RENDER_DEADLINE_FLOOR_SECS, store};
use crate::error::{Error, Result};
use crate::score::{Candidate, ViralTier};
use crate::subprocess::ToolInvocation;
use crate::transcribe::SpeechSegment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// A rendered clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    /// The candidate this clip was rendered from. Its time range is the
    /// pre-compaction source range.
    pub candidate: Candidate,
    /// Rendered file path.
    pub output: PathBuf,
    /// Duration of the rendered file in seconds; shorter than the source
    /// range when silence compaction ran.
    pub rendered_duration: f64,
    /// Caption sidecar path, when written.
    pub caption_file: Option<PathBuf>,
    /// Overlay text that was drawn, if any.
    pub hook_text: Option<String>,
    /// Viral tier bucket.
    pub tier: ViralTier,
}

/// Outcome of rendering a selection.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Clips that rendered, in selection (time) order.
    pub clips: Vec<Clip>,
    /// Number of clips dropped after both attempts failed.
    pub failed: usize,
}

/// Render all selected candidates.
///
/// The pool runs up to `max_parallel_renders` invocations; the cancel flag
/// is honored between clip renders, never mid-invocation.
pub fn render_all(
    config: &Config,
    options: &JobOptions,
    source: &Path,
    speech: &[SpeechSegment],
    selection: &[Candidate],
    output_dir: &Path,
    cancel: &AtomicBool,
    on_clip_done: &(dyn Fn(usize, usize) + Sync),
) -> Result<RenderOutcome> {
    std::fs::create_dir_all(output_dir)?;

    let total = selection.len();
    let next = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let results: Mutex<Vec<Option<Clip>>> = Mutex::new(vec![None; total]);

    let pool_size = config.render.max_parallel_renders.clamp(1, total.max(1));

    std::thread::scope(|scope| {
        for _ in 0..pool_size {
            scope.spawn(|| {
                loop {
                    if cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    if index >= total {
                        return;
                    }

                    match render_one(config, options, source, speech, &selection[index], index, output_dir) {
                        Some(clip) => {
                            if let Ok(mut slots) = results.lock() {
                                slots[index] = Some(clip);
                            }
                        }
                        None => {
                            failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    on_clip_done(finished, total);
                }
            });
        }
    });

    if cancel.load(Ordering::SeqCst) {
        return Err(Error::Cancelled);
    }

    let mut clips: Vec<Clip> = results
        .into_inner()
        .map_err(|_| Error::Internal {
            message: "render result lock poisoned".to_string(),
        })?
        .into_iter()
        .flatten()
        .collect();

    // Dropped clips leave gaps in the provisional numbering; renumber the
    // survivors contiguously so file names always match their final
    // 1-indexed time-order position, which metadata records as `index`.
    for (position, clip) in clips.iter_mut().enumerate() {
        renumber_clip(clip, position + 1, output_dir)?;
    }

    let failed = failed.load(Ordering::SeqCst);
    if clips.is_empty() && total > 0 {
        return Err(Error::RenderFailedAll { count: total });
    }
    if failed > 0 {
        warn!("{failed} of {total} clip renders failed and were dropped");
    }

    Ok(RenderOutcome { clips, failed })
}

/// Render one clip, retrying once without decorations.
fn render_one(
    config: &Config,
    options: &JobOptions,
    source: &Path,
    speech: &[SpeechSegment],
    candidate: &Candidate,
    index: usize,
    output_dir: &Path,
) -> Option<Clip> {
    let output = output_dir.join(format!("clip_{:03}.mp4", index + 1));
    let duration = candidate.duration();
    let (width, height) = config.output_dimensions(options.aspect_ratio);

    let hook_text = if options.use_hook && config.render.hook_enabled {
        candidate.hook_text.clone()
    } else {
        None
    };

    let keeps = if config.render.silence_removal {
        match detect_silences(config, source, candidate.start, duration) {
            Ok(silences) => {
                let keeps =
                    keep_intervals(&silences, duration, config.render.silence_padding);
                if keeps.is_empty() { None } else { Some(keeps) }
            }
            Err(e) => {
                warn!("silence detection failed for clip {}: {e}", index + 1);
                None
            }
        }
    } else {
        None
    };

    let plan = RenderPlan {
        start: candidate.start,
        duration,
        width,
        height,
        hook_text: hook_text.clone(),
        keep_intervals: keeps.clone(),
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let deadline = Duration::from_secs(
        ((RENDER_DEADLINE_FACTOR * duration).ceil() as u64).max(RENDER_DEADLINE_FLOOR_SECS),
    );

    let rendered = invoke(config, &plan, source, &output, deadline).or_else(|e| {
        warn!(
            "clip {} render failed ({e}), retrying without decorations",
            index + 1
        );
        invoke(config, &plan.stripped(), source, &output, deadline)
    });

    if let Err(e) = rendered {
        warn!("clip {} dropped after second failure: {e}", index + 1);
        // A killed invocation can leave a partial file behind.
        let _ = std::fs::remove_file(&output);
        return None;
    }

    let caption_file = if options.auto_caption {
        write_sidecar(speech, candidate, index, output_dir)
    } else {
        None
    };

    let rendered_duration = keeps.as_deref().map_or(duration, kept_duration);

    info!(
        "rendered clip {} ({:.1}s, score {:.2})",
        index + 1,
        rendered_duration,
        candidate.viral_score
    );

    Some(Clip {
        candidate: candidate.clone(),
        output,
        rendered_duration,
        caption_file,
        hook_text,
        tier: ViralTier::for_score(candidate.viral_score),
    })
}

/// Move a clip's output and sidecar to the file names of its final
/// position.
///
/// Survivors only ever move to lower numbers, in ascending order, so a
/// rename target is either the clip's current name or a slot vacated by a
/// dropped clip.
fn renumber_clip(clip: &mut Clip, position: usize, output_dir: &Path) -> Result<()> {
    let desired = output_dir.join(format!("clip_{position:03}.mp4"));
    if clip.output != desired {
        std::fs::rename(&clip.output, &desired)?;
        clip.output = desired;
    }
    if let Some(captions) = &clip.caption_file {
        let desired = output_dir.join(format!("clip_{position:03}.{}", store::CAPTIONS_EXT));
        if captions != &desired {
            std::fs::rename(captions, &desired)?;
            clip.caption_file = Some(desired);
        }
    }
    Ok(())
}

fn invoke(
    config: &Config,
    plan: &RenderPlan,
    source: &Path,
    output: &Path,
    deadline: Duration,
) -> Result<()> {
    let args = build_args(
        config,
        plan,
        &source.to_string_lossy(),
        &output.to_string_lossy(),
    );
    ToolInvocation::new(&config.tools.ffmpeg, args)
        .run(Some(deadline))?
        .ensure_success(&config.tools.ffmpeg)?;
    Ok(())
}

/// Write the caption sidecar for a clip, if it has any speech.
fn write_sidecar(
    speech: &[SpeechSegment],
    candidate: &Candidate,
    index: usize,
    output_dir: &Path,
) -> Option<PathBuf> {
    let content = build_sidecar(speech, candidate.start, candidate.end);
    if content.is_empty() {
        return None;
    }
    let path = output_dir.join(format!("clip_{:03}.{}", index + 1, store::CAPTIONS_EXT));
    match std::fs::write(&path, content) {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("failed to write caption sidecar: {e}");
            None
        }
    }
}
