//! Frame sampling and per-frame statistics.
//!
//! Frames are sampled by ffmpeg writing downscaled 8-bit grayscale planes
//! to stdout. Only per-frame statistics are retained; pixel data is
//! discarded as soon as a frame is folded in, so memory stays flat for
//! hours-long sources.

use crate::config::Config;
use crate::error::Result;
use crate::probe::MediaInfo;
use crate::subprocess::{FrameAssembler, ToolInvocation};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Sampling never takes longer than decoding the stream once.
const SAMPLE_DEADLINE: Duration = Duration::from_secs(1800);

/// Statistics for one sampled frame.
#[derive(Debug, Clone)]
pub struct FrameStat {
    /// Presentation time of the sample, in seconds.
    pub time: f64,
    /// Mean luminance in [0,255].
    pub mean_luma: f64,
    /// Luminance histogram, normalized to fractions summing to 1.
    pub histogram: [f64; 256],
    /// Mean absolute luma difference against the previous sample, 0 for the first.
    pub diff_prev: f64,
}

/// Adaptive sampling rate for a source duration.
pub fn sampling_rate(duration: f64) -> f64 {
    if duration < 600.0 {
        1.0
    } else if duration < 1800.0 {
        0.5
    } else {
        0.2
    }
}

/// Sample the video stream and compute per-frame statistics.
pub fn sample_frames(config: &Config, source: &Path, media: &MediaInfo) -> Result<Vec<FrameStat>> {
    let rate = sampling_rate(media.duration);
    let width = (media.width / 2).max(1);
    let height = (media.height / 2).max(1);
    let frame_bytes = width as usize * height as usize;

    let tool = ToolInvocation::new(
        &config.tools.ffmpeg,
        [
            "-v",
            "error",
            "-i",
            &source.to_string_lossy(),
            "-vf",
            &format!("fps={rate},scale={width}:{height}"),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "gray",
            "pipe:1",
        ],
    );

    let mut stats: Vec<FrameStat> = Vec::new();
    let mut prev_plane: Option<Vec<u8>> = None;
    let mut assembler = FrameAssembler::new(frame_bytes);

    let mut on_chunk = |chunk: &[u8]| -> Result<()> {
        assembler.feed(chunk, &mut |plane| {
            #[allow(clippy::cast_precision_loss)]
            let time = stats.len() as f64 / rate;
            let stat = fold_plane(plane, prev_plane.as_deref(), time);
            prev_plane = Some(plane.to_vec());
            stats.push(stat);
        });
        Ok(())
    };

    tool.run_streaming(Some(SAMPLE_DEADLINE), &mut on_chunk)?
        .ensure_success(&config.tools.ffmpeg)?;

    debug!(
        "sampled {} frames at {rate} fps ({width}x{height})",
        stats.len()
    );
    Ok(stats)
}

/// Fold one grayscale plane into a [`FrameStat`].
pub fn fold_plane(plane: &[u8], prev: Option<&[u8]>, time: f64) -> FrameStat {
    let mut counts = [0u64; 256];
    let mut sum = 0u64;
    for &p in plane {
        counts[p as usize] += 1;
        sum += u64::from(p);
    }

    #[allow(clippy::cast_precision_loss)]
    let pixels = plane.len().max(1) as f64;
    let mut histogram = [0.0f64; 256];
    for (bin, &count) in counts.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        {
            histogram[bin] = count as f64 / pixels;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let mean_luma = sum as f64 / pixels;

    let diff_prev = prev.map_or(0.0, |prev_plane| {
        let overlap = plane.len().min(prev_plane.len());
        if overlap == 0 {
            return 0.0;
        }
        let total: u64 = plane[..overlap]
            .iter()
            .zip(&prev_plane[..overlap])
            .map(|(&a, &b)| u64::from(a.abs_diff(b)))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        {
            total as f64 / overlap as f64
        }
    });

    FrameStat {
        time,
        mean_luma,
        histogram,
        diff_prev,
    }
}

/// L1 distance between two normalized histograms, in percentage points.
///
/// Identical frames score 0; disjoint luminance distributions score 100.
pub fn histogram_distance(a: &[f64; 256], b: &[f64; 256]) -> f64 {
    let total: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
    total / 2.0 * 100.0
}
