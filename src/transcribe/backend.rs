//! External hosted decoder fallback.
//!
//! Segments that stay below the retry threshold after the hybrid pass may
//! be submitted to an external hosted decoder, lowest confidence first.
//! The pass is skipped entirely without a credential.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Per-request deadline against the hosted decoder.
const BACKEND_TIMEOUT: Duration = Duration::from_secs(60);

/// A hosted decoder's verdict for one submitted window.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendTranscript {
    /// Decoded text.
    pub text: String,
    /// Decoder-reported confidence in [0,1].
    pub confidence: f64,
    /// Detected language, if reported.
    pub language: Option<String>,
}

/// Submit one audio window to the hosted decoder.
///
/// Returns `Ok(None)` when the backend is not configured.
pub fn decode_remote(config: &Config, wav: &Path) -> Result<Option<BackendTranscript>> {
    let (Some(key), Some(url)) = (
        config.transcriber.backend_key.as_deref(),
        config.transcriber.backend_url.as_deref(),
    ) else {
        return Ok(None);
    };

    let bytes = std::fs::read(wav)?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("failed to create async runtime: {e}"),
    })?;

    let response = runtime.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(BACKEND_TIMEOUT)
            .build()
            .map_err(|e| Error::BackendUnavailable {
                reason: e.to_string(),
            })?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("window.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::BackendUnavailable {
                reason: e.to_string(),
            })?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = client
            .post(url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::BackendUnavailable {
                reason: format!("HTTP {}", response.status()),
            });
        }

        response
            .text()
            .await
            .map_err(|e| Error::BackendUnavailable {
                reason: e.to_string(),
            })
    })?;

    let transcript = parse_backend_response(&response)?;
    debug!(
        "hosted decoder returned confidence {:.3} for {}",
        transcript.confidence,
        wav.display()
    );
    Ok(Some(transcript))
}

/// Parse the hosted decoder's JSON response.
pub fn parse_backend_response(raw: &str) -> Result<BackendTranscript> {
    let transcript: BackendTranscript =
        serde_json::from_str(raw).map_err(|e| Error::ToolReport {
            program: "hosted decoder".to_string(),
            message: e.to_string(),
        })?;
    if !(0.0..=1.0).contains(&transcript.confidence) {
        return Err(Error::ToolReport {
            program: "hosted decoder".to_string(),
            message: format!("confidence out of range: {}", transcript.confidence),
        });
    }
    Ok(transcript)
}
