use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use slipstream_core::{DEFAULT_PRESERVED_ROOTS, SyncConfig};

const DEFAULT_BASE_URL: &str = "https://releases.example.com";

/// On-disk settings for the updater. Every field has a default so a
/// missing or partial file still yields a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_preserved_roots")]
    pub preserved_roots: Vec<String>,

    #[serde(default = "default_version_timeout")]
    pub version_timeout_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size")]
    pub max_log_size_bytes: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_preserved_roots() -> Vec<String> {
    DEFAULT_PRESERVED_ROOTS
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_version_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    15
}

fn default_max_log_size() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            preserved_roots: default_preserved_roots(),
            version_timeout_secs: default_version_timeout(),
            download_timeout_secs: default_download_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the per-user default location
    /// when no path is given. Unreadable or invalid files fall back to
    /// defaults with a warning rather than aborting the update.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_settings_path() {
                Some(path) => path,
                None => return Self::default(),
            },
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(error) => {
                warn!("ignoring invalid settings file {}: {error}", path.display());
                Self::default()
            }
        }
    }

    pub fn into_config(self, target_dir: PathBuf) -> SyncConfig {
        let mut config = SyncConfig::new(self.base_url, target_dir);
        config.preserved_roots = self.preserved_roots;
        config.version_timeout = Duration::from_secs(self.version_timeout_secs);
        config.download_timeout = Duration::from_secs(self.download_timeout_secs);
        config
    }
}

fn default_settings_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("slipstream/settings.json"))
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let settings = Settings::load(Some(&temp.path().join("absent.json")));

        assert_eq!(settings.base_url, "https://releases.example.com");
        assert_eq!(
            settings.preserved_roots,
            vec!["Data", "CustomAssets", "CachingFolder"]
        );
        assert!(!settings.debug_logging);
    }

    #[test]
    fn partial_file_fills_remaining_fields_with_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("settings.json");
        std::fs::write(&path, r#"{"base_url": "http://127.0.0.1:9000"}"#)
            .expect("settings file should be written");

        let settings = Settings::load(Some(&path));

        assert_eq!(settings.base_url, "http://127.0.0.1:9000");
        assert_eq!(settings.version_timeout_secs, 10);
        assert_eq!(settings.download_timeout_secs, 15);
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{not json").expect("settings file should be written");

        let settings = Settings::load(Some(&path));

        assert_eq!(settings.base_url, "https://releases.example.com");
    }

    #[test]
    fn into_config_carries_timeouts_and_roots() {
        let settings = Settings {
            version_timeout_secs: 3,
            download_timeout_secs: 7,
            preserved_roots: vec!["Saves".to_string()],
            ..Settings::default()
        };

        let config = settings.into_config("/opt/app".into());

        assert_eq!(config.version_timeout.as_secs(), 3);
        assert_eq!(config.download_timeout.as_secs(), 7);
        assert_eq!(config.preserved_roots, vec!["Saves"]);
    }
}
