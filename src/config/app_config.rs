use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::core::errors::{AccessDeskError, Result};

/// Top-level configuration read from `.accessdesk/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub accessdesk: DeskSection,
    pub store: StoreSection,
    #[serde(default)]
    pub display: DisplaySection,
}

impl AppConfig {
    /// Load the configuration from `{desk_dir}/config.toml`.
    pub fn load(desk_dir: &Path) -> Result<Self> {
        let config_path = desk_dir.join("config.toml");
        if !config_path.exists() {
            return Err(AccessDeskError::InvalidConfig {
                detail: "config.toml not found. Run 'accessdesk init' first.".into(),
            });
        }
        let content = std::fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    /// Parse and validate config text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| AccessDeskError::InvalidConfig {
            detail: format!("Failed to parse config.toml: {e}"),
        })?;

        if config.accessdesk.format_version > CURRENT_FORMAT_VERSION {
            return Err(AccessDeskError::FormatVersionTooNew {
                project_version: config.accessdesk.format_version,
                supported_version: CURRENT_FORMAT_VERSION,
            });
        }

        if config.store.backend == Backend::Firebase && config.store.url.is_none() {
            return Err(AccessDeskError::InvalidConfig {
                detail: "[store] backend = \"firebase\" requires a url".into(),
            });
        }

        // Fail early on a bad offset instead of on the first render.
        config.display.offset()?;
        Ok(config)
    }

    /// Path of the JSON document for the file backend.
    pub fn store_file(&self, desk_dir: &Path) -> PathBuf {
        desk_dir.join(&self.store.path)
    }
}

/// Current format version supported by this build of accessdesk.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// The `[accessdesk]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DeskSection {
    pub version: String,
    /// Format version for backward compatibility. Defaults to 1 if missing.
    #[serde(default = "default_format_version")]
    pub format_version: u32,
}

fn default_format_version() -> u32 {
    1
}

/// Which store implementation to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    File,
    Firebase,
}

/// The `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    pub backend: Backend,
    /// JSON document for the file backend, relative to the config directory.
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Database root URL for the firebase backend.
    pub url: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StoreSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_store_path() -> String {
    "store.json".into()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    10
}

/// The `[display]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplaySection {
    /// Offset event times are shown in, as `±HH:MM`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// Only the most recent N events are read; 0 reads all of them.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            history_limit: default_history_limit(),
        }
    }
}

impl DisplaySection {
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset
            .parse::<FixedOffset>()
            .map_err(|_| AccessDeskError::InvalidConfig {
                detail: format!(
                    "Invalid utc_offset '{}'. Expected ±HH:MM, e.g. -03:00",
                    self.utc_offset
                ),
            })
    }

    pub fn history_limit(&self) -> Option<usize> {
        (self.history_limit > 0).then_some(self.history_limit)
    }
}

fn default_utc_offset() -> String {
    "-03:00".into()
}

fn default_history_limit() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_CONFIG: &str = r#"
[accessdesk]
version = "0.1.0"

[store]
backend = "file"
"#;

    #[test]
    fn minimal_file_config_uses_defaults() {
        let config = AppConfig::parse(FILE_CONFIG).unwrap();
        assert_eq!(config.store.backend, Backend::File);
        assert_eq!(config.store.path, "store.json");
        assert_eq!(config.store.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.display.history_limit(), Some(1000));
        assert_eq!(
            config.display.offset().unwrap(),
            FixedOffset::west_opt(3 * 3600).unwrap()
        );
    }

    #[test]
    fn zero_history_limit_means_unbounded() {
        let config = AppConfig::parse(&format!("{FILE_CONFIG}\n[display]\nhistory_limit = 0\n"))
            .unwrap();
        assert_eq!(config.display.history_limit(), None);
    }

    #[test]
    fn firebase_requires_url() {
        let err = AppConfig::parse(
            "[accessdesk]\nversion = \"0.1.0\"\n[store]\nbackend = \"firebase\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, AccessDeskError::InvalidConfig { .. }));

        let ok = AppConfig::parse(
            "[accessdesk]\nversion = \"0.1.0\"\n[store]\nbackend = \"firebase\"\nurl = \"https://demo.firebaseio.com\"\n",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn rejects_newer_format_version() {
        let err = AppConfig::parse(
            "[accessdesk]\nversion = \"9.0.0\"\nformat_version = 9\n[store]\nbackend = \"file\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, AccessDeskError::FormatVersionTooNew { .. }));
    }

    #[test]
    fn rejects_bad_offset() {
        let err = AppConfig::parse(&format!("{FILE_CONFIG}\n[display]\nutc_offset = \"BRT\"\n"))
            .unwrap_err();
        assert!(matches!(err, AccessDeskError::InvalidConfig { .. }));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err =
            AppConfig::parse("[accessdesk]\nversion = \"0.1.0\"\n[store]\nbackend = \"redis\"\n")
                .unwrap_err();
        assert!(matches!(err, AccessDeskError::InvalidConfig { .. }));
    }
}
