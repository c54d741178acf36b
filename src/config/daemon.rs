//! Daemon settings.
//!
//! Settings are read from a TOML file; every field is optional and falls back
//! to the values in [`crate::constants`]. The file is looked up at the path
//! given with `--config`, then at `/etc/zend/config.toml`. When neither exists
//! the defaults are used unchanged.
//!
//! ```toml
//! apps_root = "/srv/zen/apps"
//! setup_file = "/srv/zen/setup.json"
//! check_interval_secs = 120
//! asset_match = "linux-x86_64"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    DEFAULT_API_TIMEOUT, DEFAULT_API_URL, DEFAULT_APPS_ROOT, DEFAULT_CHECK_INTERVAL,
    DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_SETTINGS_FILE, DEFAULT_SETUP_FILE,
};
use crate::core::ZenError;
use crate::release::AssetSelection;

fn default_apps_root() -> PathBuf {
    PathBuf::from(DEFAULT_APPS_ROOT)
}

fn default_setup_file() -> PathBuf {
    PathBuf::from(DEFAULT_SETUP_FILE)
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

const fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL.as_secs()
}

const fn default_api_timeout_secs() -> u64 {
    DEFAULT_API_TIMEOUT.as_secs()
}

const fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT.as_secs()
}

/// Settings of one daemon instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Directory holding one subdirectory per installed app version.
    #[serde(default = "default_apps_root")]
    pub apps_root: PathBuf,

    /// Setup document re-read at the start of each cycle.
    #[serde(default = "default_setup_file")]
    pub setup_file: PathBuf,

    /// Seconds between the start of two reconciliation cycles.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Base URL of the release API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Timeout for release API calls, in seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Timeout for asset downloads, in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Install the first asset whose name contains this string instead of
    /// the first asset of the release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_match: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            apps_root: default_apps_root(),
            setup_file: default_setup_file(),
            check_interval_secs: default_check_interval_secs(),
            api_url: default_api_url(),
            api_timeout_secs: default_api_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            asset_match: None,
        }
    }
}

impl DaemonConfig {
    /// Load the settings.
    ///
    /// With `Some(path)` the file must exist. With `None` the system-wide
    /// settings file is used if present, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, names
    /// an unknown setting, or fails [`DaemonConfig::validate`].
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from(path).await?,
            None => Self::load_or_default(Path::new(DEFAULT_SETTINGS_FILE)).await?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise the defaults. A file that cannot
    /// even be checked for is an error, not a missing file.
    async fn load_or_default(path: &Path) -> Result<Self> {
        let exists = fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to check for settings at {}", path.display()))?;

        if exists { Self::load_from(path).await } else { Ok(Self::default()) }
    }

    /// Load the settings from a specific file without validating them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }

    /// Reject settings the daemon cannot run with.
    ///
    /// # Errors
    ///
    /// [`ZenError::ConfigError`] for a zero interval or timeout, or an empty
    /// API URL.
    pub fn validate(&self) -> Result<(), ZenError> {
        let invalid = |reason: &str| ZenError::ConfigError {
            path: "daemon settings".to_string(),
            reason: reason.to_string(),
        };

        if self.check_interval_secs == 0 {
            return Err(invalid("check_interval_secs must be greater than zero"));
        }
        if self.api_timeout_secs == 0 {
            return Err(invalid("api_timeout_secs must be greater than zero"));
        }
        if self.download_timeout_secs == 0 {
            return Err(invalid("download_timeout_secs must be greater than zero"));
        }
        if self.api_url.trim().is_empty() {
            return Err(invalid("api_url must not be empty"));
        }
        Ok(())
    }

    /// Interval between reconciliation cycles.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Timeout for release API calls.
    #[must_use]
    pub const fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Timeout for asset downloads.
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Asset selection strategy derived from `asset_match`.
    #[must_use]
    pub fn asset_selection(&self) -> AssetSelection {
        AssetSelection::from_pattern(self.asset_match.as_deref())
    }
}
