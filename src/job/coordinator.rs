//! Process-wide job coordination.
//!
//! The coordinator owns the job table, the bounded queue and the worker
//! threads. The table and queue share one mutex; each job's mutable state
//! carries its own lock, so status reads never block a worker's progress
//! writes for long.

use super::types::{JobHandle, JobSnapshot, JobStatus};
use super::worker::run_job;
use crate::config::{Config, JobOptions, LexiconSet};
use crate::error::{Error, Result};
use crate::store::ArtifactStore;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

struct Table {
    jobs: HashMap<String, Arc<JobHandle>>,
    queue: VecDeque<String>,
    running: usize,
    shutdown: bool,
}

struct Shared {
    config: Config,
    lexicons: LexiconSet,
    store: ArtifactStore,
    table: Mutex<Table>,
    queue_signal: Condvar,
}

/// The process-wide job coordinator.
pub struct Coordinator {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Start the coordinator and its worker threads.
    pub fn start(config: Config, lexicons: LexiconSet) -> Result<Self> {
        let store = ArtifactStore::new(config.root.clone());
        store.ensure_layout()?;

        let shared = Arc::new(Shared {
            table: Mutex::new(Table {
                jobs: HashMap::new(),
                queue: VecDeque::new(),
                running: 0,
                shutdown: false,
            }),
            queue_signal: Condvar::new(),
            config,
            lexicons,
            store,
        });

        let workers = (0..shared.config.processing_concurrency)
            .map(|index| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("job-worker-{index}"))
                    .spawn(move || worker_loop(&shared))
                    .map_err(Error::Io)
            })
            .collect::<Result<Vec<_>>>()?;

        info!("coordinator started with {} workers", workers.len());
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// The artifact store this coordinator writes into.
    pub fn store(&self) -> &ArtifactStore {
        &self.shared.store
    }

    /// Admit a new job for an already-admitted source.
    ///
    /// Rejects with `busy` when all workers are occupied and the queue is
    /// at capacity (queue capacity equals the worker count).
    pub fn enqueue(&self, source_id: &str, options: JobOptions) -> Result<String> {
        // Admission requires the source to exist.
        self.shared.store.find_source(source_id)?;

        let mut table = lock_table(&self.shared);
        // Queue capacity equals the worker count: with every worker busy
        // and the queue full, admission is rejected. Queued-but-unclaimed
        // jobs count against the worker slots so a slow pickup cannot
        // overfill the queue.
        let capacity = self.shared.config.processing_concurrency;
        if table.running + table.queue.len() >= capacity * 2 {
            return Err(Error::Busy);
        }

        // Freeze the config snapshot, with the job's language hint applied
        // so the transcriber sees it.
        let mut snapshot = self.shared.config.clone();
        if let Some(language) = &options.language {
            snapshot.transcriber.language.clone_from(language);
        }
        let handle = Arc::new(JobHandle::new(source_id, options, snapshot));
        let id = handle.id.clone();
        table.jobs.insert(id.clone(), handle);
        table.queue.push_back(id.clone());
        drop(table);
        self.shared.queue_signal.notify_one();

        debug!("enqueued job {id} for source {source_id}");
        Ok(id)
    }

    /// Deep snapshot of a job's public fields.
    pub fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        let handle = self.handle(job_id)?;
        Ok(handle.snapshot())
    }

    /// Cooperatively cancel a job.
    ///
    /// A queued job transitions to error/cancelled immediately; a running
    /// job has its flag set and transitions at the next stage boundary.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let handle = {
            let mut table = lock_table(&self.shared);
            let handle = table
                .jobs
                .get(job_id)
                .cloned()
                .ok_or_else(|| Error::JobNotFound {
                    id: job_id.to_string(),
                })?;
            match handle.status() {
                JobStatus::Queued => {
                    table.queue.retain(|queued| queued != job_id);
                    handle.finish_error("cancelled", "cancelled while queued");
                    return Ok(());
                }
                JobStatus::Running => handle,
                status @ (JobStatus::Completed | JobStatus::Error) => {
                    return Err(Error::JobState {
                        id: job_id.to_string(),
                        state: status.as_str().to_string(),
                    });
                }
            }
        };
        handle.request_cancel();
        Ok(())
    }

    /// Remove a job's artifacts and record.
    ///
    /// Rejected while the job is running; a second call for the same id
    /// reports the job as unknown.
    pub fn cleanup(&self, job_id: &str) -> Result<()> {
        {
            let mut table = lock_table(&self.shared);
            let handle = table
                .jobs
                .get(job_id)
                .ok_or_else(|| Error::JobNotFound {
                    id: job_id.to_string(),
                })?;
            if handle.status() == JobStatus::Running {
                return Err(Error::JobState {
                    id: job_id.to_string(),
                    state: "running".to_string(),
                });
            }
            table.queue.retain(|queued| queued != job_id);
            table.jobs.remove(job_id);
        }
        self.shared.store.remove_job(job_id)?;
        Ok(())
    }

    /// Block until a job reaches a terminal state.
    pub fn wait(&self, job_id: &str) -> Result<JobSnapshot> {
        loop {
            let snapshot = self.status(job_id)?;
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    /// Stop accepting work and join the workers. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut table = lock_table(&self.shared);
            table.shutdown = true;
        }
        self.shared.queue_signal.notify_all();
        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for worker in workers {
            let _ = worker.join();
        }
    }

    fn handle(&self, job_id: &str) -> Result<Arc<JobHandle>> {
        let table = lock_table(&self.shared);
        table
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound {
                id: job_id.to_string(),
            })
    }
}

fn lock_table(shared: &Shared) -> std::sync::MutexGuard<'_, Table> {
    match shared.table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Each worker services one job at a time, with a cooldown between jobs.
fn worker_loop(shared: &Shared) {
    loop {
        let handle = {
            let mut table = lock_table(shared);
            loop {
                if let Some(id) = table.queue.pop_front() {
                    if let Some(handle) = table.jobs.get(&id).cloned() {
                        table.running += 1;
                        break handle;
                    }
                    // Cleaned up while queued; take the next one.
                    continue;
                }
                if table.shutdown {
                    return;
                }
                table = match shared.queue_signal.wait(table) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        };

        handle.set_running();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_job(&shared.store, &shared.lexicons, &handle);
        }));
        if let Err(panic) = outcome {
            let detail = panic
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| panic.downcast_ref::<&str>().map(ToString::to_string))
                .unwrap_or_else(|| "panic with non-string payload".to_string());
            handle.finish_error("internal", format!("stage panicked: {detail}"));
            shared.store.remove_work_dir(&handle.id);
        }

        {
            let mut table = lock_table(shared);
            table.running = table.running.saturating_sub(1);
        }

        std::thread::sleep(Duration::from_secs(
            shared.config.processing_cooldown_secs,
        ));
    }
}
