//! Per-job metadata file schema.

use crate::render::Clip;
use serde::{Deserialize, Serialize};

/// The `metadata.json` document written after job completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataFile {
    /// Job identifier.
    pub job_id: String,
    /// Source video facts.
    pub source: SourceRecord,
    /// The job's frozen configuration snapshot.
    pub config_snapshot: serde_json::Value,
    /// Rendered clips in time order.
    pub clips: Vec<ClipRecord>,
}

/// Source video facts recorded in metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source path in the upload store.
    pub path: String,
    /// Source duration in seconds.
    pub duration: f64,
}

/// One clip's metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRecord {
    /// 1-indexed position in clip time order.
    pub index: usize,
    /// Output file name, relative to the job's output directory.
    pub file: String,
    /// Cut start in source time.
    pub start_seconds: f64,
    /// Cut end in source time.
    pub end_seconds: f64,
    /// Rendered duration in seconds.
    pub duration_seconds: f64,
    /// Composite viral score.
    pub viral_score: f64,
    /// Tier bucket: high, medium or low.
    pub viral_tier: String,
    /// Dominant category.
    pub category: String,
    /// Deterministic rationale.
    pub rationale: String,
    /// Whether the window was context-complete.
    pub context_complete: bool,
    /// Whether the clip was selected only to satisfy the floor.
    pub fallback: bool,
    /// Overlay text, when one was drawn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_text: Option<String>,
    /// Caption sidecar file name, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_file: Option<String>,
}

/// Build the metadata document for a completed job.
pub fn build_metadata(
    job_id: &str,
    source_path: &str,
    source_duration: f64,
    config_snapshot: serde_json::Value,
    clips: &[Clip],
) -> MetadataFile {
    let records = clips
        .iter()
        .enumerate()
        .map(|(i, clip)| ClipRecord {
            index: i + 1,
            file: file_name_of(&clip.output),
            start_seconds: clip.candidate.start,
            end_seconds: clip.candidate.end,
            duration_seconds: clip.rendered_duration,
            viral_score: clip.candidate.viral_score,
            viral_tier: clip.tier.as_str().to_string(),
            category: clip.candidate.category.as_str().to_string(),
            rationale: clip.candidate.rationale.clone(),
            context_complete: clip.candidate.context_complete,
            fallback: clip.candidate.fallback,
            hook_text: clip.hook_text.clone(),
            caption_file: clip.caption_file.as_deref().map(file_name_of),
        })
        .collect();

    MetadataFile {
        job_id: job_id.to_string(),
        source: SourceRecord {
            path: source_path.to_string(),
            duration: source_duration,
        },
        config_snapshot,
        clips: records,
    }
}

fn file_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::score::{AxisScores, Candidate, Category, ViralTier};
    use std::path::PathBuf;

    fn clip(start: f64, end: f64, score: f64, index: usize) -> Clip {
        Clip {
            candidate: Candidate {
                start,
                end,
                text: "words".to_string(),
                language: "en".to_string(),
                face_ratio: 0.5,
                motion: 0.3,
                brightness: 0.6,
                synthetic: false,
                axes: AxisScores::default(),
                audio_engagement: 0.4,
                visual_engagement: 0.5,
                viral_score: score,
                category: Category::Educational,
                rationale: "clear takeaway".to_string(),
                context_complete: true,
                fallback: false,
                hook_text: None,
            },
            output: PathBuf::from(format!("/data/outputs/j1/clip_{index:03}.mp4")),
            rendered_duration: end - start,
            caption_file: Some(PathBuf::from(format!(
                "/data/outputs/j1/clip_{index:03}.captions"
            ))),
            hook_text: Some("A hook".to_string()),
            tier: ViralTier::for_score(score),
        }
    }

    #[test]
    fn builds_records_in_order_with_relative_names() {
        let clips = vec![clip(10.0, 30.0, 0.8, 1), clip(50.0, 70.0, 0.4, 2)];
        let metadata = build_metadata(
            "j1",
            "/data/uploads/talk.mp4",
            600.0,
            serde_json::json!({"style": "balanced"}),
            &clips,
        );

        assert_eq!(metadata.clips.len(), 2);
        assert_eq!(metadata.clips[0].index, 1);
        assert_eq!(metadata.clips[0].file, "clip_001.mp4");
        assert_eq!(metadata.clips[0].caption_file.as_deref(), Some("clip_001.captions"));
        assert_eq!(metadata.clips[0].viral_tier, "high");
        assert_eq!(metadata.clips[1].viral_tier, "low");
        assert_eq!(metadata.clips[1].index, 2);
    }

    #[test]
    fn serializes_to_documented_schema() {
        let metadata = build_metadata(
            "j1",
            "/data/uploads/talk.mp4",
            600.0,
            serde_json::json!({}),
            &[clip(10.0, 30.0, 0.8, 1)],
        );
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["job_id"], "j1");
        assert_eq!(value["source"]["duration"], 600.0);
        assert_eq!(value["clips"][0]["start_seconds"], 10.0);
        assert_eq!(value["clips"][0]["category"], "educational");
        assert_eq!(value["clips"][0]["context_complete"], true);
        // Round-trips through the schema.
        let parsed: MetadataFile = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.clips[0].file, "clip_001.mp4");
    }
}
