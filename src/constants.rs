//! Global constants used throughout the zend codebase.
//!
//! This module contains the fixed filesystem locations, timeouts, and
//! intervals that the daemon falls back to when the settings file does not
//! override them. Keeping them in one place makes the defaults easy to find.

use std::time::Duration;

/// Root directory holding one subdirectory per installed app version.
pub const DEFAULT_APPS_ROOT: &str = "/opt/zen/apps";

/// Setup document written by the web front end.
///
/// The daemon only reads the `githubToken` and `apps` fields from it.
pub const DEFAULT_SETUP_FILE: &str = "/opt/zen/data/setup.json";

/// System-wide daemon settings file, consulted when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "/etc/zend/config.toml";

/// Base URL of the GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Interval between two reconciliation cycles (5 minutes).
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Timeout for release API calls (30 seconds).
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for asset downloads (10 minutes).
///
/// Release artifacts can be large, so this is minutes rather than seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Name of the combined stdout/stderr log inside each install directory.
pub const PROCESS_LOG_FILE: &str = "log.txt";

/// Media type requested from the release API.
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// REST API version pinned in every request.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Prefix of the staging directories created next to install directories.
pub const STAGING_PREFIX: &str = ".staging-";

/// Permission bits for directories created during extraction.
pub const DIR_MODE: u32 = 0o755;

/// How long a stopped process gets to exit after SIGTERM before it is killed.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);
