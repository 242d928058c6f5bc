use std::fmt;
use std::path::Path;

use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::session::EventSink;

/// Opaque version token from the remote feed. Guaranteed non-empty and
/// free of surrounding whitespace; used verbatim in the archive URL and
/// the staging filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionId(String);

impl VersionId {
    /// Parse a raw feed body. Empty-after-trim means no version is
    /// available.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fetch the current version identifier from the release feed.
///
/// Any transport error, timeout, non-2xx status, or empty body yields
/// `None` rather than an error; the session maps absence to its fatal
/// "Failed to retrieve version info." outcome.
pub async fn resolve_version(client: &reqwest::Client, config: &SyncConfig) -> Option<VersionId> {
    let url = config.version_url();
    let response = match client
        .get(&url)
        .timeout(config.version_timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(error) => {
            warn!("version feed request failed: {error}");
            return None;
        }
    };

    if !response.status().is_success() {
        warn!("version feed returned HTTP {}", response.status());
        return None;
    }

    let body = response.text().await.ok()?;
    let version = VersionId::parse(&body);
    if let Some(ref version) = version {
        debug!("version feed reports {version}");
    }
    version
}

/// Stream the packaged archive for `version` to `dest` in chunks,
/// publishing byte-level progress and honoring cancellation at every
/// chunk boundary. On cancellation this returns `Ok` immediately and the
/// caller discards the partial file.
///
/// # Errors
/// `HttpStatus` for a non-2xx response, `IncompleteDownload` when the
/// stream ends short of a declared `Content-Length`, and `Transport` for
/// any other network failure.
pub async fn download(
    client: &reqwest::Client,
    config: &SyncConfig,
    version: &VersionId,
    dest: &Path,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<(), SyncError> {
    let url = config.archive_url(version.as_str());
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(SyncError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::HttpStatus { code: status });
    }

    let total = response.content_length().filter(|len| *len > 0);
    let mut downloaded: u64 = 0;

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|error| SyncError::io("failed to create staging file", error))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            // A body that dies mid-transfer against a declared length is
            // an incomplete download, not a generic transport failure.
            Err(error) => {
                return Err(match total {
                    Some(expected) => SyncError::IncompleteDownload {
                        expected,
                        received: downloaded,
                    },
                    None => SyncError::Transport(error),
                });
            }
        };

        file.write_all(&chunk)
            .await
            .map_err(|error| SyncError::io("failed to write staging file", error))?;
        downloaded += chunk.len() as u64;

        if cancel.is_cancelled() {
            debug!("download cancelled after {downloaded} bytes");
            return Ok(());
        }

        if let Some(total) = total {
            events.progress(percent_of(downloaded, total));
            events.status(format!(
                "Downloading: {} MB / {} MB",
                downloaded / (1024 * 1024),
                total / (1024 * 1024)
            ));
        }
    }

    file.flush()
        .await
        .map_err(|error| SyncError::io("failed to flush staging file", error))?;

    if let Some(expected) = total
        && downloaded < expected
    {
        return Err(SyncError::IncompleteDownload {
            expected,
            received: downloaded,
        });
    }

    // No declared length: progress was indeterminate during transfer, so
    // report completion only now.
    if total.is_none() {
        events.progress(100);
    }

    info!("download complete: {downloaded} bytes from {url}");
    Ok(())
}

fn percent_of(done: u64, total: u64) -> u8 {
    u8::try_from((done * 100 / total).min(100)).unwrap_or(100)
}
