use std::path::PathBuf;
use std::time::Duration;

/// Top-level directory names the pruner must never touch, regardless of
/// what the release archive contains.
pub const DEFAULT_PRESERVED_ROOTS: [&str; 3] = ["Data", "CustomAssets", "CachingFolder"];

const DEFAULT_VERSION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Everything an update session needs to know about its environment: the
/// remote release feed, the installation directory it reconciles, and the
/// directories it must leave alone.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the release feed. The session requests
    /// `{base_url}/current_ver.txt` and `{base_url}/zips/{version}.zip`.
    pub base_url: String,

    /// Installation directory reconciled against the release archive.
    pub target_dir: PathBuf,

    /// Top-level directory names exempt from pruning.
    pub preserved_roots: Vec<String>,

    /// Where the session creates its staging directory. `None` uses the OS
    /// temp directory.
    pub staging_root: Option<PathBuf>,

    /// Total timeout for the version feed request.
    pub version_timeout: Duration,

    /// Connect/read timeout for the archive download.
    pub download_timeout: Duration,
}

impl SyncConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            target_dir: target_dir.into(),
            preserved_roots: DEFAULT_PRESERVED_ROOTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            staging_root: None,
            version_timeout: DEFAULT_VERSION_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Feed URL carrying the current version identifier as plain text.
    #[must_use]
    pub fn version_url(&self) -> String {
        format!("{}/current_ver.txt", self.base_url.trim_end_matches('/'))
    }

    /// Download URL for the packaged archive of `version`.
    #[must_use]
    pub fn archive_url(&self, version: &str) -> String {
        format!("{}/zips/{version}.zip", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::SyncConfig;

    #[test]
    fn new_applies_default_preserved_roots_and_timeouts() {
        let config = SyncConfig::new("https://releases.example.com", "/opt/app");

        assert_eq!(
            config.preserved_roots,
            vec!["Data", "CustomAssets", "CachingFolder"]
        );
        assert_eq!(config.version_timeout.as_secs(), 10);
        assert_eq!(config.download_timeout.as_secs(), 15);
        assert!(config.staging_root.is_none());
    }

    #[test]
    fn feed_urls_tolerate_trailing_slash() {
        let config = SyncConfig::new("https://releases.example.com/", "/opt/app");

        assert_eq!(
            config.version_url(),
            "https://releases.example.com/current_ver.txt"
        );
        assert_eq!(
            config.archive_url("1.2.3"),
            "https://releases.example.com/zips/1.2.3.zip"
        );
    }
}
