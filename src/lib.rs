//! zend - keep GitHub-released apps installed and running
//!
//! A single-host daemon that keeps a small set of applications installed at
//! their latest GitHub release and runs each one as a supervised child
//! process. The app list and the GitHub token come from a setup document
//! written by a separate web front end; the daemon re-reads it every cycle.
//!
//! # Architecture Overview
//!
//! Each reconciliation cycle flows one way:
//!
//! ```text
//! setup document -> Updater -> ReleaseSource -> ArchiveInstaller -> ProcessSupervisor
//! ```
//!
//! - Releases are looked up fresh every cycle; nothing is cached
//! - An install is a directory `<apps_root>/<slug>-<tag>`; its existence is
//!   the only record that a release is installed
//! - Processes are tracked in memory only, at most one per app
//!
//! # Core Modules
//!
//! - [`installer::paths`] - Deterministic install directory names
//! - [`release`] - Latest-release lookup and asset download ([`release::GitHubClient`])
//! - [`installer`] - Staged download and extraction of `.tar.gz`, `.tgz`, and `.zip` assets
//! - [`supervisor`] - Start, stop, and liveness of app processes
//! - [`updater`] - The reconciliation loop tying the above together
//!
//! # Supporting Modules
//!
//! - [`cli`] - Command-line interface (`zend run`, `zend path`)
//! - [`config`] - Daemon settings (TOML) and the setup document (JSON)
//! - [`core`] - Error types and user-facing error rendering
//! - [`constants`] - Default paths, intervals, and timeouts
//! - [`utils`] - Archive entry path validation
//!
//! # Example
//!
//! ```bash
//! # Run the daemon
//! zend run
//!
//! # Run one cycle with verbose logging and exit
//! zend --verbose run --once
//! ```

// Core functionality modules
pub mod installer;
pub mod release;
pub mod supervisor;
pub mod updater;

// Supporting modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
