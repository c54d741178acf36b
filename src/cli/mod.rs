//! Command-line interface for zend.
//!
//! # Commands
//!
//! - `run` - Run the update loop until SIGINT/SIGTERM, or a single cycle with `--once`
//! - `path` - Print the install directory of an app release
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - Only warnings and errors
//! - `--config` / `-c` - Daemon settings file (default `/etc/zend/config.toml` if present)
//! - `--apps-root` - Override the directory apps are installed into
//! - `--setup-file` - Override the setup document path
//!
//! `RUST_LOG` takes precedence over `--verbose` and `--quiet`. Logs go to
//! stderr so that command output on stdout stays machine-readable.
//!
//! # Examples
//!
//! ```bash
//! # Run the daemon with the system settings
//! zend run
//!
//! # One cycle against a scratch directory
//! zend --apps-root /tmp/apps --setup-file ./setup.json run --once
//!
//! # Where would owner/app v1.2.0 be installed?
//! zend path owner/app v1.2.0
//! ```

mod path;
mod run;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::DaemonConfig;

pub use path::PathCommand;
pub use run::RunCommand;

/// Keeps GitHub-released apps installed at their latest release and running.
#[derive(Parser, Debug)]
#[command(name = "zend", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the daemon settings file
    #[arg(short, long, global = true, env = "ZEND_CONFIG")]
    config: Option<PathBuf>,

    /// Directory apps are installed into
    #[arg(long, global = true, env = "ZEND_APPS_ROOT")]
    apps_root: Option<PathBuf>,

    /// Setup document holding the GitHub token and the managed apps
    #[arg(long, global = true, env = "ZEND_SETUP_FILE")]
    setup_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keep the configured apps installed and running
    Run(RunCommand),
    /// Print the install directory of an app release
    Path(PathCommand),
}

impl Cli {
    /// Execute the parsed command.
    ///
    /// # Errors
    ///
    /// Fails when the settings cannot be loaded or the command fails to start.
    /// Per-app failures inside the update loop are logged, not returned.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());
        let settings = self.load_settings().await?;

        match self.command {
            Commands::Run(cmd) => cmd.execute(settings).await,
            Commands::Path(cmd) => cmd.execute(&settings),
        }
    }

    /// Default log level selected by `--verbose` and `--quiet`.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Load the daemon settings and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// See [`DaemonConfig::load`].
    pub async fn load_settings(&self) -> Result<DaemonConfig> {
        let mut settings = DaemonConfig::load(self.config.as_deref()).await?;

        if let Some(apps_root) = &self.apps_root {
            settings.apps_root.clone_from(apps_root);
        }
        if let Some(setup_file) = &self.setup_file {
            settings.setup_file.clone_from(setup_file);
        }
        Ok(settings)
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `default_level` when set. Calling this more than
/// once is harmless.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
