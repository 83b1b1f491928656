//! Clipforge - ranked short-form clip production from long-form video.
//!
//! This crate runs the clip pipeline: probe, transcription with
//! confidence-tracked retries, visual scene analysis, fusion, scoring,
//! selection under coverage guarantees, and rendering through the external
//! media tool.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod fuse;
pub mod job;
pub mod probe;
pub mod render;
pub mod score;
pub mod select;
pub mod store;
pub mod subprocess;
pub mod transcribe;
pub mod visual;

use clap::Parser;
use cli::Cli;
use config::{Config, LexiconSet};
use indicatif::{ProgressBar, ProgressStyle};
use job::{Coordinator, JobSnapshot, JobStatus};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use store::{ArtifactStore, sanitize_source_id, source_extension};
use tracing::info;

pub use error::{Error, Result};

/// Exit code for a job cancelled by signal.
const EXIT_CANCELLED: i32 = 130;

/// Exit code for an unrecoverable runtime failure.
const EXIT_RUNTIME: i32 = 2;

/// Map an error to the CLI exit code contract.
pub fn exit_code_for(error: &Error) -> i32 {
    match error {
        Error::ConfigValidation { .. }
        | Error::LexiconRead { .. }
        | Error::LexiconParse { .. } => 1,
        Error::Cancelled => EXIT_CANCELLED,
        _ => EXIT_RUNTIME,
    }
}

/// Run the CLI end to end. Returns the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let hardware = config::probe_hardware();
    let mut config = Config::from_env(hardware)?;
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }

    let lexicons = match &config.lexicon_file {
        Some(path) => LexiconSet::load(path)?,
        None => LexiconSet::builtin(),
    };

    let coordinator = Arc::new(Coordinator::start(config.clone(), lexicons)?);

    let source_id = if cli.url {
        let fetched = fetch::fetch(&config, coordinator.store(), &cli.input, &cli.quality)?;
        if let Some(title) = &fetched.title {
            info!("fetched '{title}' ({:.0}s)", fetched.duration);
        }
        fetched.source_id
    } else {
        admit_local(&config, coordinator.store(), Path::new(&cli.input))?
    };

    let job_id = coordinator.enqueue(&source_id, cli.job_options())?;
    info!("job {job_id} admitted for source {source_id}");

    let signalled = Arc::new(AtomicBool::new(false));
    {
        let coordinator = Arc::clone(&coordinator);
        let job_id = job_id.clone();
        let signalled = Arc::clone(&signalled);
        ctrlc::set_handler(move || {
            signalled.store(true, Ordering::SeqCst);
            let _ = coordinator.cancel(&job_id);
        })
        .map_err(|e| Error::Internal {
            message: format!("failed to install signal handler: {e}"),
        })?;
    }

    let snapshot = watch(&coordinator, &job_id)?;
    coordinator.shutdown();

    match snapshot.status {
        JobStatus::Completed => {
            print_summary(&snapshot, &config);
            Ok(0)
        }
        JobStatus::Error if snapshot.message == "cancelled" || signalled.load(Ordering::SeqCst) => {
            eprintln!("cancelled");
            Ok(EXIT_CANCELLED)
        }
        _ => {
            eprintln!("job failed: {}", snapshot.message);
            for entry in &snapshot.log {
                eprintln!("  {} {}", entry.at.format("%H:%M:%S"), entry.message);
            }
            Ok(EXIT_RUNTIME)
        }
    }
}

/// Poll a job to completion with a progress bar.
fn watch(coordinator: &Coordinator, job_id: &str) -> Result<JobSnapshot> {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }

    loop {
        let snapshot = coordinator.status(job_id)?;
        bar.set_position(u64::from(snapshot.progress));
        bar.set_message(snapshot.message.clone());
        if snapshot.status.is_terminal() {
            bar.finish_and_clear();
            return Ok(snapshot);
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}

/// Admit a local file into the upload store, enforcing the source limits.
fn admit_local(config: &Config, store: &ArtifactStore, path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::SourceNotFound {
            id: path.to_string_lossy().into_owned(),
        });
    }

    let size = std::fs::metadata(path)?.len();
    if size > config.max_source_size {
        return Err(Error::SourceTooLarge {
            reason: format!(
                "{size} bytes exceeds the {} byte limit",
                config.max_source_size
            ),
        });
    }

    let media = probe::probe_media(&config.tools, path)?;
    if media.duration > config.max_source_duration {
        return Err(Error::SourceTooLarge {
            reason: format!(
                "duration {:.0}s exceeds the {:.0}s limit",
                media.duration, config.max_source_duration
            ),
        });
    }

    store.ensure_layout()?;
    let file_name = path
        .file_name()
        .map_or_else(|| "source.mp4".to_string(), |n| n.to_string_lossy().into_owned());
    let source_id = sanitize_source_id(&file_name);
    let dest = store.upload_path(&source_id, &source_extension(&file_name));
    if dest.as_path() != path {
        std::fs::copy(path, &dest)?;
    }

    info!("admitted {} as {source_id}", path.display());
    Ok(source_id)
}

/// Print the completed job's clip table.
fn print_summary(snapshot: &JobSnapshot, config: &Config) {
    #[allow(clippy::print_stdout)]
    {
        println!("{} clips:", snapshot.clips.len());
        for (i, clip) in snapshot.clips.iter().enumerate() {
            println!(
                "  {:>2}. {}  {:6.2}-{:6.2}s  score {:.2} ({})  {}  {}",
                i + 1,
                clip.output
                    .file_name()
                    .map_or_else(|| clip.output.to_string_lossy().into_owned(), |n| n
                        .to_string_lossy()
                        .into_owned()),
                clip.candidate.start,
                clip.candidate.end,
                clip.candidate.viral_score,
                clip.tier.as_str(),
                clip.candidate.category.as_str(),
                clip.candidate.rationale,
            );
        }
        println!(
            "outputs: {}",
            config.root.join("outputs").join(&snapshot.id).display()
        );
        if snapshot.message != "completed" {
            println!("note: {}", snapshot.message);
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default = if verbose { "clipforge=debug" } else { "clipforge=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
