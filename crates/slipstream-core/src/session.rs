use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::fetch::{self, VersionId};
use crate::{prune, reconcile};

/// Notification from a running session to its consumer. `Finished` is
/// emitted exactly once per run and is always the last event.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// Integer percent, 0-100. Restarts from 0 when a new stage begins
    /// reporting.
    Progress(u8),
    /// Human-readable status line.
    Status(String),
    Finished(Outcome),
}

/// Terminal result of one update run. Cancellation carries no message:
/// the caller decides how to present it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
    Cancelled,
}

/// Sending half of the session's event channel. Sends never block and
/// failures are ignored: a consumer that went away must not abort the
/// pipeline.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<UpdateEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<UpdateEvent>) -> Self {
        Self { tx }
    }

    pub fn progress(&self, percent: u8) {
        let _ = self.tx.send(UpdateEvent::Progress(percent));
    }

    pub fn status(&self, text: impl Into<String>) {
        let _ = self.tx.send(UpdateEvent::Status(text.into()));
    }

    fn finish(&self, outcome: Outcome) {
        let _ = self.tx.send(UpdateEvent::Finished(outcome));
    }
}

/// Control handle for a spawned session. Stopping is cooperative: the
/// worker observes the request at the next chunk, archive member, or
/// directory entry boundary, so cancellation takes effect with bounded
/// latency rather than instantly.
pub struct SessionHandle {
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }
}

/// One self-update run: version resolution, archive download, content
/// reconciliation, stale-entry pruning, staging cleanup. The whole
/// pipeline executes sequentially on a single spawned worker task;
/// progress, status, and the terminal outcome cross to the consumer over
/// the returned channel.
pub struct UpdateSession {
    config: SyncConfig,
}

impl UpdateSession {
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Start the worker task. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> (SessionHandle, mpsc::UnboundedReceiver<UpdateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = EventSink::new(tx);
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();

        tokio::spawn(async move {
            let outcome = match run_pipeline(&self.config, &events, &worker_cancel).await {
                Ok(Some(version)) => {
                    let message = format!("Update {version} completed.");
                    events.status(message.clone());
                    Outcome::Success(message)
                }
                Ok(None) => {
                    info!("update run cancelled");
                    Outcome::Cancelled
                }
                Err(error) => {
                    warn!("update run failed: {error}");
                    Outcome::Failure(error.to_string())
                }
            };
            events.finish(outcome);
        });

        (SessionHandle { cancel }, rx)
    }
}

/// `Ok(Some(version))` on success, `Ok(None)` when a stop request was
/// observed. The staging directory is owned by this function's scope, so
/// its recursive best-effort removal runs on every exit path, error
/// unwinds included.
async fn run_pipeline(
    config: &SyncConfig,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<Option<VersionId>, SyncError> {
    let staging = match &config.staging_root {
        Some(root) => tempfile::Builder::new()
            .prefix("slipstream-")
            .tempdir_in(root),
        None => tempfile::Builder::new().prefix("slipstream-").tempdir(),
    }
    .map_err(|error| SyncError::io("failed to create staging directory", error))?;

    let client = reqwest::Client::builder()
        .connect_timeout(config.download_timeout)
        .read_timeout(config.download_timeout)
        .user_agent(concat!("slipstream/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| {
            SyncError::io("failed to construct HTTP client", std::io::Error::other(error))
        })?;

    events.status("Fetching version info...");
    let Some(version) = fetch::resolve_version(&client, config).await else {
        return Err(SyncError::VersionUnavailable);
    };
    info!("release feed reports version {version}");

    events.status(format!("Preparing update {version}..."));
    let archive_path = staging.path().join(format!("update_{version}.zip"));

    events.status("Downloading update...");
    fetch::download(&client, config, &version, &archive_path, events, cancel).await?;
    if cancel.is_cancelled() {
        return Ok(None);
    }

    events.status("Extracting files...");
    let expected = reconcile::reconcile(&archive_path, &config.target_dir, events, cancel)?;
    if cancel.is_cancelled() {
        return Ok(None);
    }

    events.status("Cleaning up old files and directories...");
    prune::prune(&config.target_dir, &expected, &config.preserved_roots, cancel);

    if let Err(error) = staging.close() {
        debug!("ignoring staging cleanup failure: {error}");
    }
    Ok(Some(version))
}

#[cfg(test)]
mod tests {
    use super::{Outcome, UpdateEvent, UpdateSession};
    use crate::config::SyncConfig;

    async fn unreachable_base_url() -> String {
        // Bind then drop to find a port nothing is listening on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have an addr");
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn unreachable_feed_fails_with_version_message() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let mut config = SyncConfig::new(unreachable_base_url().await, temp.path().join("app"));
        config.staging_root = Some(temp.path().to_path_buf());
        std::fs::create_dir_all(&config.target_dir).expect("target dir should be created");

        let (_handle, mut events) = UpdateSession::new(config).spawn();

        let mut outcome = None;
        while let Some(event) = events.recv().await {
            if let UpdateEvent::Finished(result) = event {
                outcome = Some(result);
            }
        }

        assert_eq!(
            outcome,
            Some(Outcome::Failure(
                "Failed to retrieve version info.".to_string()
            ))
        );
    }
}
