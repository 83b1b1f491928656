//! Artifact store layout and metadata integration.

use clipforge::render::Clip;
use clipforge::score::{AxisScores, Candidate, Category, ViralTier};
use clipforge::store::{ArtifactStore, MetadataFile, build_metadata, sanitize_source_id};

fn clip(start: f64, end: f64, score: f64, index: usize, dir: &std::path::Path) -> Clip {
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
            category: Category::Entertaining,
            rationale: "high entertainment".to_string(),
            context_complete: true,
            fallback: false,
            hook_text: None,
        },
        output: dir.join(format!("clip_{index:03}.mp4")),
        rendered_duration: end - start,
        caption_file: None,
        hook_text: None,
        tier: ViralTier::for_score(score),
    }
}

#[test]
fn metadata_writes_atomically_and_parses_back() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(tmp.path());
    store.ensure_layout().expect("layout");

    let out_dir = store.output_dir("job-1");
    let clips = vec![
        clip(10.0, 30.0, 0.8, 1, &out_dir),
        clip(60.0, 80.0, 0.4, 2, &out_dir),
    ];
    let metadata = build_metadata(
        "job-1",
        "/data/uploads/talk.mp4",
        600.0,
        serde_json::json!({"clips": {"min_seconds": 9.0}}),
        &clips,
    );

    let path = store.write_metadata("job-1", &metadata).expect("write");
    assert!(path.ends_with("metadata.json"));
    // No temp file is left behind.
    assert!(!path.with_extension("json.tmp").exists());
    let listing: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
        .expect("read dir")
        .filter_map(|e| e.ok().map(|e| e.file_name()))
        .collect();
    assert_eq!(listing.len(), 1);

    let raw = std::fs::read_to_string(&path).expect("read back");
    let parsed: MetadataFile = serde_json::from_str(&raw).expect("parses");
    assert_eq!(parsed.job_id, "job-1");
    assert_eq!(parsed.clips.len(), 2);
    assert_eq!(parsed.clips[0].index, 1);
    assert_eq!(parsed.clips[0].file, "clip_001.mp4");
    assert_eq!(parsed.clips[1].viral_tier, "low");
    assert!((parsed.source.duration - 600.0).abs() < 1e-9);
}

#[test]
fn clip_indices_follow_time_order() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(tmp.path());
    let out_dir = store.output_dir("job-2");

    // Clips arrive time-sorted from the selector; indices are 1-based and
    // zero-padded in file names.
    let clips: Vec<Clip> = (0..12)
        .map(|i| clip(f64::from(i) * 30.0, f64::from(i) * 30.0 + 20.0, 0.5, i as usize + 1, &out_dir))
        .collect();
    let metadata = build_metadata("job-2", "src.mp4", 600.0, serde_json::json!({}), &clips);

    for (i, record) in metadata.clips.iter().enumerate() {
        assert_eq!(record.index, i + 1);
        assert_eq!(record.file, format!("clip_{:03}.mp4", i + 1));
        if i > 0 {
            assert!(record.start_seconds > metadata.clips[i - 1].start_seconds);
        }
    }
    assert_eq!(metadata.clips[9].file, "clip_010.mp4");
}

#[test]
fn source_ids_are_filesystem_safe() {
    for (raw, expected) in [
        ("My Talk @ Conf (final).mp4", "My_Talk___Conf__final_"),
        ("episode.12.part-3.mkv", "episode_12_part_3"),
    ] {
        assert_eq!(sanitize_source_id(raw), expected);
    }
}
