//! The `run` command: the daemon itself.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DaemonConfig, SetupFile};
use crate::installer::ArchiveInstaller;
use crate::release::GitHubClient;
use crate::supervisor::ProcessSupervisor;
use crate::updater::Updater;

/// Keep the configured apps installed and running.
///
/// Runs a reconciliation cycle immediately and then once per check interval.
/// SIGINT or SIGTERM stops every supervised process before exiting. Staging
/// directories left by an interrupted install are removed at startup.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Run a single cycle and exit, leaving started processes running
    #[arg(long)]
    pub(crate) once: bool,
}

impl RunCommand {
    /// Run the update loop with `settings`.
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client or the signal handlers cannot be set up.
    pub async fn execute(self, settings: DaemonConfig) -> Result<()> {
        let releases =
            GitHubClient::from_config(&settings).context("Failed to initialize HTTP client")?;
        let supervisor = Arc::new(ProcessSupervisor::new());
        let updater = Updater::new(
            SetupFile::new(&settings.setup_file),
            releases,
            Arc::clone(&supervisor),
            &settings.apps_root,
        )
        .with_interval(settings.check_interval())
        .with_asset_selection(settings.asset_selection());

        if self.once {
            updater.run_cycle().await.log();
            for record in supervisor.records() {
                info!(
                    app = %record.app_key,
                    version = %record.version,
                    pid = record.pid,
                    "Leaving process running"
                );
            }
            return Ok(());
        }

        match ArchiveInstaller::new().remove_stale_staging(&settings.apps_root).await {
            Ok(0) => {}
            Ok(removed) => info!("Removed {removed} interrupted installs"),
            Err(e) => warn!("Failed to clean up interrupted installs: {e}"),
        }

        info!(
            apps_root = %settings.apps_root.display(),
            setup_file = %settings.setup_file.display(),
            "zend starting, checking for updates every {:?}",
            settings.check_interval()
        );

        tokio::select! {
            () = updater.run() => {}
            signal = shutdown_signal() => {
                let signal = signal.context("Failed to listen for shutdown signals")?;
                info!("Received {signal}, shutting down");
            }
        }

        let stopped = supervisor.stop_all();
        info!("Stopped {stopped} supervised processes");
        Ok(())
    }
}

/// Resolve on the first SIGINT or SIGTERM, returning its name.
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl-C")
    }
}
