//! The setup document shared with the web front end.
//!
//! The front end's setup wizard writes a JSON document holding the admin
//! account, the GitHub token, and the list of managed apps. The daemon re-reads
//! it at the start of every reconciliation cycle and uses only the token and
//! the app list.
//!
//! ```json
//! {
//!   "username": "admin",
//!   "password": "$2a$10$...",
//!   "githubToken": "ghp_...",
//!   "apps": [
//!     { "provider": "github", "key": "owner/app", "command": "./app --port 9000" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::ZenError;

/// One managed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSpec {
    /// Release host; only `github` is supported.
    pub provider: String,
    /// Repository identifier on the release host (`owner/name`).
    pub key: String,
    /// Shell command run inside the install directory. Empty means install only.
    #[serde(default)]
    pub command: String,
}

impl AppSpec {
    /// Whether the app has a command to supervise.
    #[must_use]
    pub fn has_command(&self) -> bool {
        !self.command.trim().is_empty()
    }
}

/// The full setup document as written by the front end.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupData {
    /// Admin user name (unused by the daemon).
    #[serde(default)]
    pub username: String,
    /// Admin password hash (unused by the daemon).
    #[serde(default)]
    pub password: String,
    /// Token used for every release API call and download.
    #[serde(default)]
    pub github_token: String,
    /// Apps to keep installed and running.
    #[serde(default)]
    pub apps: Vec<AppSpec>,
}

impl fmt::Debug for SetupData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupData")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("github_token", &"<redacted>")
            .field("apps", &self.apps)
            .finish()
    }
}

/// The part of the setup document one reconciliation cycle consumes.
#[derive(Clone, PartialEq, Eq)]
pub struct AppsConfig {
    /// Non-empty GitHub token.
    pub github_token: String,
    /// Apps in configuration order.
    pub apps: Vec<AppSpec>,
}

impl fmt::Debug for AppsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppsConfig")
            .field("github_token", &"<redacted>")
            .field("apps", &self.apps)
            .finish()
    }
}

impl SetupData {
    /// Extract the cycle configuration, rejecting an empty token.
    ///
    /// # Errors
    ///
    /// [`ZenError::ConfigError`] when `githubToken` is empty or whitespace.
    pub fn into_apps_config(self, origin: &Path) -> Result<AppsConfig, ZenError> {
        let token = self.github_token.trim();
        if token.is_empty() {
            return Err(ZenError::ConfigError {
                path: origin.display().to_string(),
                reason: "no GitHub token configured".to_string(),
            });
        }

        Ok(AppsConfig {
            github_token: token.to_string(),
            apps: self.apps,
        })
    }
}

/// Provider of the per-cycle app configuration.
pub trait ConfigSource: Send + Sync {
    /// Load the current configuration.
    ///
    /// Called at the start of every cycle; a failure skips that cycle only.
    fn load(&self) -> impl Future<Output = Result<AppsConfig, ZenError>> + Send;
}

/// [`ConfigSource`] reading the setup document from a JSON file.
#[derive(Debug, Clone)]
pub struct SetupFile {
    path: PathBuf,
}

impl SetupFile {
    /// Read the setup document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Path of the setup document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the whole setup document.
    ///
    /// # Errors
    ///
    /// [`ZenError::ConfigError`] when the file cannot be read or is not a
    /// valid setup document.
    pub async fn read(&self) -> Result<SetupData, ZenError> {
        let config_error = |reason: String| ZenError::ConfigError {
            path: self.path.display().to_string(),
            reason,
        };

        let content = fs::read(&self.path).await.map_err(|e| config_error(e.to_string()))?;
        serde_json::from_slice(&content).map_err(|e| config_error(e.to_string()))
    }
}

impl ConfigSource for SetupFile {
    async fn load(&self) -> Result<AppsConfig, ZenError> {
        self.read().await?.into_apps_config(&self.path)
    }
}
