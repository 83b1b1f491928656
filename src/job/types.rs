//! Job state, snapshots and the bounded log ring.

use crate::config::{Config, JobOptions};
use crate::constants::JOB_LOG_CAPACITY;
use crate::render::Clip;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Admitted, waiting for a worker.
    Queued,
    /// Owned by a worker.
    Running,
    /// Finished with at least one clip.
    Completed,
    /// Finished with a failure kind in the message.
    Error,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Stable string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// One timestamped log ring entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was appended.
    pub at: DateTime<Utc>,
    /// Log message.
    pub message: String,
}

/// Mutable job state, guarded by the per-job lock.
#[derive(Debug)]
struct JobState {
    status: JobStatus,
    progress: u8,
    message: String,
    last_activity: DateTime<Utc>,
    log: VecDeque<LogEntry>,
    clips: Vec<Clip>,
    error_kind: Option<&'static str>,
}

/// Deep copy of a job's public fields, safe to hand to any reader.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    /// Job identifier.
    pub id: String,
    /// Source identifier the job processes.
    pub source_id: String,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Progress 0..100, monotone.
    pub progress: u8,
    /// Status message; the failure kind when status is error.
    pub message: String,
    /// Timestamp of the last state change.
    pub last_activity: DateTime<Utc>,
    /// Bounded log, oldest first.
    pub log: Vec<LogEntry>,
    /// Rendered clips, present once completed.
    pub clips: Vec<Clip>,
    /// Failure kind, when status is error.
    pub error_kind: Option<&'static str>,
}

/// A job record: immutable identity plus lock-guarded mutable state.
#[derive(Debug)]
pub struct JobHandle {
    /// Job identifier.
    pub id: String,
    /// Source identifier.
    pub source_id: String,
    /// Per-job options.
    pub options: JobOptions,
    /// Frozen configuration snapshot.
    pub config: Config,
    state: Mutex<JobState>,
    cancel: AtomicBool,
}

static JOB_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Mint a fresh job id.
pub fn next_job_id() -> String {
    let seq = JOB_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("job-{:08x}-{seq:04}", Utc::now().timestamp_millis() & 0xffff_ffff)
}

impl JobHandle {
    /// Create a queued job.
    pub fn new(source_id: &str, options: JobOptions, config: Config) -> Self {
        Self {
            id: next_job_id(),
            source_id: source_id.to_string(),
            options,
            config,
            state: Mutex::new(JobState {
                status: JobStatus::Queued,
                progress: 0,
                message: "queued".to_string(),
                last_activity: Utc::now(),
                log: VecDeque::with_capacity(JOB_LOG_CAPACITY),
                clips: Vec::new(),
                error_kind: None,
            }),
            cancel: AtomicBool::new(false),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut JobState) -> T) -> T {
        // Lock poisoning would mean a panicked stage while holding the
        // per-job lock; the state itself is still structurally sound.
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    /// Deep snapshot under the per-job lock, held only for the copy.
    pub fn snapshot(&self) -> JobSnapshot {
        self.with_state(|state| JobSnapshot {
            id: self.id.clone(),
            source_id: self.source_id.clone(),
            status: state.status,
            progress: state.progress,
            message: state.message.clone(),
            last_activity: state.last_activity,
            log: state.log.iter().cloned().collect(),
            clips: state.clips.clone(),
            error_kind: state.error_kind,
        })
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.with_state(|state| state.status)
    }

    /// Append to the bounded log ring.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_state(|state| push_log(state, message));
    }

    /// Publish progress; regressions are clamped to keep progress monotone.
    pub fn set_progress(&self, progress: u8, message: impl Into<String>) {
        let message = message.into();
        self.with_state(|state| {
            state.progress = state.progress.max(progress.min(100));
            state.message.clone_from(&message);
            state.last_activity = Utc::now();
            push_log(state, message);
        });
    }

    /// Transition queued → running.
    pub fn set_running(&self) {
        self.with_state(|state| {
            state.status = JobStatus::Running;
            state.message = "running".to_string();
            state.last_activity = Utc::now();
        });
    }

    /// Terminal success, optionally with a coverage warning message.
    pub fn finish_completed(&self, clips: Vec<Clip>, warning: Option<String>) {
        self.with_state(|state| {
            state.status = JobStatus::Completed;
            state.progress = 100;
            state.clips = clips;
            state.message = warning.unwrap_or_else(|| "completed".to_string());
            state.last_activity = Utc::now();
            push_log(state, state.message.clone());
        });
    }

    /// Terminal failure; the kind string becomes the public message.
    pub fn finish_error(&self, kind: &'static str, detail: impl Into<String>) {
        let detail = detail.into();
        self.with_state(|state| {
            state.status = JobStatus::Error;
            state.message = kind.to_string();
            state.error_kind = Some(kind);
            state.clips.clear();
            state.last_activity = Utc::now();
            push_log(state, detail);
        });
    }

    /// Set the cooperative cancel flag.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// The raw cancel flag, for the renderer pool.
    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel
    }
}

fn push_log(state: &mut JobState, message: String) {
    if state.log.len() == JOB_LOG_CAPACITY {
        state.log.pop_front();
    }
    state.log.push_back(LogEntry {
        at: Utc::now(),
        message,
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn handle() -> JobHandle {
        JobHandle::new("src", JobOptions::default(), Config::default())
    }

    #[test]
    fn ids_are_unique() {
        let a = next_job_id();
        let b = next_job_id();
        assert_ne!(a, b);
    }

    #[test]
    fn progress_is_monotone() {
        let job = handle();
        job.set_progress(40, "transcribed");
        job.set_progress(10, "stale update");
        assert_eq!(job.snapshot().progress, 40);
        job.set_progress(55, "visual done");
        assert_eq!(job.snapshot().progress, 55);
    }

    #[test]
    fn log_ring_is_bounded() {
        let job = handle();
        for i in 0..25 {
            job.log(format!("entry {i}"));
        }
        let snapshot = job.snapshot();
        assert_eq!(snapshot.log.len(), JOB_LOG_CAPACITY);
        assert_eq!(snapshot.log[0].message, "entry 15");
        assert_eq!(snapshot.log[9].message, "entry 24");
    }

    #[test]
    fn error_puts_kind_in_message_and_clears_clips() {
        let job = handle();
        job.finish_error("insufficient-material", "source is 5s");
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert_eq!(snapshot.message, "insufficient-material");
        assert!(snapshot.clips.is_empty());
        // The detail lands in the log ring, not the public message.
        assert!(snapshot.log.iter().any(|e| e.message.contains("5s")));
    }

    #[test]
    fn cancel_flag_round_trip() {
        let job = handle();
        assert!(!job.cancel_requested());
        job.request_cancel();
        assert!(job.cancel_requested());
    }

    #[test]
    fn status_transitions() {
        let job = handle();
        assert_eq!(job.status(), JobStatus::Queued);
        job.set_running();
        assert_eq!(job.status(), JobStatus::Running);
        job.finish_completed(Vec::new(), None);
        assert!(job.status().is_terminal());
    }
}
