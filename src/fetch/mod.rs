//! Remote source retrieval.
//!
//! Platform URLs go through the external downloader tool; direct media
//! URLs stream over HTTP. Both paths enforce the source duration and size
//! limits and classify network failures into transient (retried with
//! exponential backoff) and permanent.

use crate::config::Config;
use crate::constants::fetch::{INITIAL_BACKOFF_SECS, MAX_RETRIES};
use crate::error::{Error, Result};
use crate::probe::probe_media;
use crate::store::{ArtifactStore, sanitize_source_id, source_extension};
use crate::subprocess::ToolInvocation;
use futures_util::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Downloader metadata probe deadline.
const PROBE_DEADLINE: Duration = Duration::from_secs(120);

/// Download deadline; generous, the size limits do the real bounding.
const DOWNLOAD_DEADLINE: Duration = Duration::from_secs(3600);

/// Extensions treated as directly downloadable media files.
const DIRECT_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "webm", "mov", "avi", "m4v"];

/// A source admitted by the fetcher.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    /// Storage-unique source id.
    pub source_id: String,
    /// Path in the upload store.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration: f64,
    /// Title reported by the downloader, if any.
    pub title: Option<String>,
    /// Channel reported by the downloader, if any.
    pub channel: Option<String>,
}

/// Fetch a public URL into the upload store at a maximum quality label.
pub fn fetch(
    config: &Config,
    store: &ArtifactStore,
    url: &str,
    quality: &str,
) -> Result<FetchedSource> {
    store.ensure_layout()?;
    if is_direct_url(url) {
        fetch_direct(config, store, url)
    } else {
        fetch_with_downloader(config, store, url, quality)
    }
}

/// Whether the URL points at a bare media file.
fn is_direct_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    DIRECT_EXTENSIONS
        .iter()
        .any(|ext| path.to_ascii_lowercase().ends_with(&format!(".{ext}")))
}

/// Height cap for a quality label like "1080p"; `None` means best.
fn quality_height(quality: &str) -> Option<u32> {
    let digits: String = quality.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[derive(Debug, Deserialize)]
struct DownloaderReport {
    duration: Option<f64>,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    filesize_approx: Option<u64>,
    ext: Option<String>,
}

/// Fetch via the external downloader tool.
fn fetch_with_downloader(
    config: &Config,
    store: &ArtifactStore,
    url: &str,
    quality: &str,
) -> Result<FetchedSource> {
    // Metadata first: the limits are checked before any bytes move.
    let report = with_retries(url, || downloader_metadata(config, url))?;

    let duration = report.duration.unwrap_or(0.0);
    if duration > config.max_source_duration {
        return Err(Error::SourceTooLarge {
            reason: format!(
                "duration {duration:.0}s exceeds the {:.0}s limit",
                config.max_source_duration
            ),
        });
    }
    if let Some(size) = report.filesize_approx {
        if size > config.max_source_size {
            return Err(Error::SourceTooLarge {
                reason: format!(
                    "estimated size {size} bytes exceeds the {} byte limit",
                    config.max_source_size
                ),
            });
        }
    }

    let source_id = sanitize_source_id(report.title.as_deref().unwrap_or("remote_source"));
    let ext = report.ext.clone().unwrap_or_else(|| "mp4".to_string());
    let dest = store.upload_path(&source_id, &ext);

    with_retries(url, || downloader_download(config, url, quality, &dest))?;
    enforce_downloaded_limits(config, &dest)?;

    info!("fetched '{url}' to {}", dest.display());
    Ok(FetchedSource {
        source_id,
        path: dest,
        duration,
        title: report.title,
        channel: report.channel.or(report.uploader),
    })
}

fn downloader_metadata(config: &Config, url: &str) -> Result<DownloaderReport> {
    let mut args: Vec<String> = vec![
        "--dump-json".to_string(),
        "--no-download".to_string(),
        "--no-playlist".to_string(),
    ];
    if let Some(cookies) = &config.fetch_cookies {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }
    args.push(url.to_string());

    let output = ToolInvocation::new(&config.tools.ytdlp, args)
        .run(Some(PROBE_DEADLINE))?
        .ensure_success(&config.tools.ytdlp)?;

    serde_json::from_str(output.stdout_str().trim()).map_err(|e| Error::ToolReport {
        program: config.tools.ytdlp.clone(),
        message: e.to_string(),
    })
}

fn downloader_download(config: &Config, url: &str, quality: &str, dest: &Path) -> Result<()> {
    let format = quality_height(quality).map_or_else(
        || "bv*+ba/b".to_string(),
        |h| format!("bv*[height<={h}]+ba/b[height<={h}]"),
    );

    let mut args: Vec<String> = vec![
        "-f".to_string(),
        format,
        "--no-playlist".to_string(),
        "-o".to_string(),
        dest.to_string_lossy().into_owned(),
    ];
    if let Some(cookies) = &config.fetch_cookies {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }
    args.push(url.to_string());

    ToolInvocation::new(&config.tools.ytdlp, args)
        .run(Some(DOWNLOAD_DEADLINE))?
        .ensure_success(&config.tools.ytdlp)?;
    Ok(())
}

/// Stream a direct media URL into the upload store.
fn fetch_direct(config: &Config, store: &ArtifactStore, url: &str) -> Result<FetchedSource> {
    let file_name = url
        .split(['?', '#'])
        .next()
        .and_then(|p| p.rsplit('/').next())
        .filter(|n| !n.is_empty())
        .unwrap_or("remote_source.mp4");
    let source_id = sanitize_source_id(file_name);
    let ext = source_extension(file_name);
    let dest = store.upload_path(&source_id, &ext);

    with_retries(url, || download_direct(config, url, &dest))?;
    enforce_downloaded_limits(config, &dest)?;

    let media = probe_media(&config.tools, &dest).map_err(|e| {
        let _ = std::fs::remove_file(&dest);
        e
    })?;
    if media.duration > config.max_source_duration {
        let _ = std::fs::remove_file(&dest);
        return Err(Error::SourceTooLarge {
            reason: format!(
                "duration {:.0}s exceeds the {:.0}s limit",
                media.duration, config.max_source_duration
            ),
        });
    }

    Ok(FetchedSource {
        source_id,
        path: dest,
        duration: media.duration,
        title: None,
        channel: None,
    })
}

fn download_direct(config: &Config, url: &str, dest: &Path) -> Result<()> {
    let max_size = config.max_source_size;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("failed to create async runtime: {e}"),
    })?;

    runtime.block_on(async {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| fetch_error(url, &e.to_string()))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(url, &e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(url, &format!("HTTP {}", response.status())));
        }
        if let Some(len) = response.content_length() {
            if len > max_size {
                return Err(Error::SourceTooLarge {
                    reason: format!("content length {len} exceeds the {max_size} byte limit"),
                });
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(Error::Io)?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_error(url, &e.to_string()))?;
            downloaded += chunk.len() as u64;
            if downloaded > max_size {
                drop(file);
                let _ = tokio::fs::remove_file(dest).await;
                return Err(Error::SourceTooLarge {
                    reason: format!("download exceeded the {max_size} byte limit"),
                });
            }
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
                .await
                .map_err(Error::Io)?;
        }
        Ok(())
    })
}

fn fetch_error(url: &str, reason: &str) -> Error {
    Error::FetchFailed {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Verify the downloaded file against the size limit.
fn enforce_downloaded_limits(config: &Config, dest: &Path) -> Result<()> {
    let size = std::fs::metadata(dest)?.len();
    if size > config.max_source_size {
        let _ = std::fs::remove_file(dest);
        return Err(Error::SourceTooLarge {
            reason: format!(
                "downloaded {size} bytes, above the {} byte limit",
                config.max_source_size
            ),
        });
    }
    Ok(())
}

/// Run an operation, retrying transient failures with exponential backoff.
fn with_retries<T>(url: &str, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
    let mut backoff = INITIAL_BACKOFF_SECS;
    let mut attempt = 0u32;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                attempt += 1;
                warn!(
                    "transient fetch failure for '{url}' (attempt {attempt}/{MAX_RETRIES}): {e}; \
                     retrying in {backoff}s"
                );
                std::thread::sleep(Duration::from_secs(backoff));
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Classify a failure as transient (worth retrying) or permanent.
pub fn is_transient(error: &Error) -> bool {
    let text = match error {
        Error::ToolFailed { stderr_tail, .. } => stderr_tail.as_str(),
        Error::FetchFailed { reason, .. } => reason.as_str(),
        Error::ToolTimeout { .. } => return true,
        _ => return false,
    };
    let lowered = text.to_ascii_lowercase();
    ["timed out", "timeout", "connection", "temporar", "network", "429", "502", "503"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn direct_url_detection() {
        assert!(is_direct_url("https://cdn.example.com/video.mp4"));
        assert!(is_direct_url("https://cdn.example.com/video.MP4?sig=abc"));
        assert!(!is_direct_url("https://video.example.com/watch?v=abc123"));
    }

    #[test]
    fn quality_label_parsing() {
        assert_eq!(quality_height("1080p"), Some(1080));
        assert_eq!(quality_height("720"), Some(720));
        assert_eq!(quality_height("best"), None);
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&Error::ToolFailed {
            program: "yt-dlp".to_string(),
            status: 1,
            stderr_tail: "ERROR: Connection reset by peer".to_string(),
        }));
        assert!(is_transient(&Error::FetchFailed {
            url: "u".to_string(),
            reason: "HTTP 503 Service Unavailable".to_string(),
        }));
        assert!(!is_transient(&Error::FetchFailed {
            url: "u".to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        }));
        assert!(!is_transient(&Error::SourceTooLarge {
            reason: "too big".to_string(),
        }));
    }

    #[test]
    fn retries_stop_on_permanent_failure() {
        let mut calls = 0;
        let result: Result<()> = with_retries("u", || {
            calls += 1;
            Err(Error::FetchFailed {
                url: "u".to_string(),
                reason: "HTTP 404".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn downloader_report_parses() {
        let raw = r#"{
            "duration": 18000.0, "title": "Five Hour Stream",
            "channel": "Example", "filesize_approx": 900000000, "ext": "mp4"
        }"#;
        let report: DownloaderReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.duration, Some(18000.0));
        assert_eq!(report.title.as_deref(), Some("Five Hour Stream"));
    }
}
