//! On-disk artifact layout.
//!
//! ```text
//! <root>/uploads/<source-id>.<ext>
//! <root>/outputs/<job-id>/clip_<nnn>.<ext>
//! <root>/outputs/<job-id>/clip_<nnn>.captions
//! <root>/outputs/<job-id>/metadata.json
//! <root>/work/<job-id>/            (scratch, removed on completion)
//! ```

mod metadata;

pub use metadata::{ClipRecord, MetadataFile, SourceRecord, build_metadata};

use crate::constants::store as names;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The artifact store rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store handle; directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the top-level layout.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [names::UPLOADS_DIR, names::OUTPUTS_DIR, names::WORK_DIR] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// Uploads directory.
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(names::UPLOADS_DIR)
    }

    /// Upload path for a source id and extension.
    pub fn upload_path(&self, source_id: &str, ext: &str) -> PathBuf {
        self.uploads_dir().join(format!("{source_id}.{ext}"))
    }

    /// Locate an admitted source by id, whatever its extension.
    pub fn find_source(&self, source_id: &str) -> Result<PathBuf> {
        let dir = self.uploads_dir();
        let entries = std::fs::read_dir(&dir).map_err(|_| Error::SourceNotFound {
            id: source_id.to_string(),
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            let stem = path.file_stem().and_then(|s| s.to_str());
            if stem == Some(source_id) && path.is_file() {
                return Ok(path);
            }
        }
        Err(Error::SourceNotFound {
            id: source_id.to_string(),
        })
    }

    /// Remove an admitted source.
    pub fn remove_source(&self, source_id: &str) -> Result<()> {
        let path = self.find_source(source_id)?;
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Per-job output directory.
    pub fn output_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(names::OUTPUTS_DIR).join(job_id)
    }

    /// Per-job scratch directory.
    pub fn work_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(names::WORK_DIR).join(job_id)
    }

    /// Create both per-job directories.
    pub fn create_job_dirs(&self, job_id: &str) -> Result<(PathBuf, PathBuf)> {
        let output = self.output_dir(job_id);
        let work = self.work_dir(job_id);
        std::fs::create_dir_all(&output)?;
        std::fs::create_dir_all(&work)?;
        Ok((output, work))
    }

    /// Remove a job's scratch directory, keeping outputs.
    pub fn remove_work_dir(&self, job_id: &str) {
        let work = self.work_dir(job_id);
        if work.exists() {
            if let Err(e) = std::fs::remove_dir_all(&work) {
                debug!("failed to remove work dir {}: {e}", work.display());
            }
        }
    }

    /// Remove every artifact of a job.
    pub fn remove_job(&self, job_id: &str) -> Result<()> {
        self.remove_work_dir(job_id);
        let output = self.output_dir(job_id);
        if output.exists() {
            std::fs::remove_dir_all(&output)?;
        }
        Ok(())
    }

    /// Write a job's metadata file atomically (temp file + rename).
    pub fn write_metadata(&self, job_id: &str, metadata: &MetadataFile) -> Result<PathBuf> {
        let dir = self.output_dir(job_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(names::METADATA_FILE);
        let tmp = dir.join(format!("{}.tmp", names::METADATA_FILE));

        let json = serde_json::to_string_pretty(metadata).map_err(|source| {
            Error::MetadataWrite {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

/// Derive a storage-unique source id from an original filename.
///
/// Non-alphanumerics in the stem are replaced by underscores.
pub fn sanitize_source_id(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "source".to_string()
    } else {
        sanitized
    }
}

/// Extension of an original filename, defaulting to `mp4`.
pub fn source_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map_or_else(|| "mp4".to_string(), str::to_lowercase)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(sanitize_source_id("my video (1).mp4"), "my_video__1_");
        assert_eq!(sanitize_source_id("podcast-ep42.mkv"), "podcast_ep42");
        assert_eq!(sanitize_source_id("žluťoučký.mp4"), "_lu_ou_k_");
    }

    #[test]
    fn extension_defaults_to_mp4() {
        assert_eq!(source_extension("a.MKV"), "mkv");
        assert_eq!(source_extension("noext"), "mp4");
    }

    #[test]
    fn layout_paths() {
        let store = ArtifactStore::new("/data");
        assert_eq!(
            store.upload_path("podcast_ep42", "mkv"),
            PathBuf::from("/data/uploads/podcast_ep42.mkv")
        );
        assert_eq!(
            store.output_dir("job-7"),
            PathBuf::from("/data/outputs/job-7")
        );
        assert_eq!(store.work_dir("job-7"), PathBuf::from("/data/work/job-7"));
    }

    #[test]
    fn find_source_matches_any_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.ensure_layout().unwrap();
        std::fs::write(store.upload_path("talk", "webm"), b"x").unwrap();

        let found = store.find_source("talk").unwrap();
        assert!(found.ends_with("talk.webm"));
        assert!(matches!(
            store.find_source("missing"),
            Err(Error::SourceNotFound { .. })
        ));
    }

    #[test]
    fn remove_job_clears_outputs_and_work() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let (output, work) = store.create_job_dirs("j1").unwrap();
        std::fs::write(output.join("clip_001.mp4"), b"x").unwrap();
        std::fs::write(work.join("audio.wav"), b"x").unwrap();

        store.remove_job("j1").unwrap();
        assert!(!output.exists());
        assert!(!work.exists());
    }
}
