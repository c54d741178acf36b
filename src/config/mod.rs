//! Configuration for zend
//!
//! The daemon reads two documents:
//!
//! 1. **Daemon settings** (`/etc/zend/config.toml` or `--config`) - Where apps
//!    are installed, where the setup document lives, and the interval and
//!    timeouts of the update loop. Read once at startup.
//! 2. **Setup document** (`/opt/zen/data/setup.json` by default) - Written by
//!    the web front end; holds the GitHub token and the managed apps. Re-read
//!    at the start of every reconciliation cycle, so edits take effect on the
//!    next tick without a restart.
//!
//! # Modules
//!
//! - `daemon` - [`DaemonConfig`], TOML settings with defaults for every field
//! - `setup` - [`SetupFile`] and the [`ConfigSource`] trait the update loop reads through

mod daemon;
mod setup;

pub use daemon::DaemonConfig;
pub use setup::{AppSpec, AppsConfig, ConfigSource, SetupData, SetupFile};
