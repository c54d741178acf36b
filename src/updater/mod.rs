//! The update loop.
//!
//! Every cycle re-reads the app configuration and reconciles each app on its
//! own, in configuration order:
//!
//! 1. Reject providers other than `github` before any network call
//! 2. Resolve the latest release and its install directory
//! 3. Skip everything if that version is already tracked and alive
//! 4. Install the release unless its directory already exists
//! 5. Start the app command, stopping a differently versioned process first
//!
//! A failing app produces an error entry in the [`CycleReport`] and never
//! affects the other apps. A configuration error skips the whole cycle. No
//! state is carried between cycles besides the install directories on disk
//! and the processes tracked by the supervisor.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zend::config::{DaemonConfig, SetupFile};
//! use zend::release::GitHubClient;
//! use zend::supervisor::ProcessSupervisor;
//! use zend::updater::Updater;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = DaemonConfig::default();
//! let updater = Updater::new(
//!     SetupFile::new(&settings.setup_file),
//!     GitHubClient::from_config(&settings)?,
//!     Arc::new(ProcessSupervisor::new()),
//!     &settings.apps_root,
//! );
//!
//! updater.run_cycle().await.log();
//! # Ok(())
//! # }
//! ```


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{AppSpec, ConfigSource};
use crate::constants::DEFAULT_CHECK_INTERVAL;
use crate::core::ZenError;
use crate::installer::{ArchiveFormat, ArchiveInstaller, install_path};
use crate::release::{AssetSelection, Provider, Release, ReleaseSource};
use crate::supervisor::{ProcessControl, ProcessSupervisor, SignalControl};

/// What reconciling one app did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOutcome {
    /// The latest version was already tracked and alive; nothing was touched.
    AlreadyRunning { version: String },
    /// The latest version is installed and the app has no command to run.
    Ready { version: String, installed: bool },
    /// The app command was started for the latest version.
    Started {
        version: String,
        pid: u32,
        /// Whether this cycle installed the release.
        installed: bool,
        /// Version of the process that was stopped to make room, if any.
        replaced: Option<String>,
    },
}

impl fmt::Display for AppOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning { version } => write!(f, "{version} already running"),
            Self::Ready { version, installed: true } => write!(f, "installed {version}"),
            Self::Ready { version, installed: false } => write!(f, "{version} installed"),
            Self::Started {
                version,
                pid,
                installed,
                replaced,
            } => {
                if *installed {
                    write!(f, "installed and started {version} (pid {pid})")?;
                } else {
                    write!(f, "started {version} (pid {pid})")?;
                }
                if let Some(previous) = replaced {
                    write!(f, ", replacing {previous}")?;
                }
                Ok(())
            }
        }
    }
}

/// Result of reconciling one app.
#[derive(Debug)]
pub struct AppReport {
    pub app_key: String,
    pub result: Result<AppOutcome, ZenError>,
}

/// Result of one reconciliation cycle.
#[derive(Debug)]
pub enum CycleReport {
    /// The configuration could not be loaded; no app was looked at.
    Skipped(ZenError),
    /// Every configured app was reconciled, in configuration order.
    Completed(Vec<AppReport>),
}

impl CycleReport {
    /// Per-app results; empty for a skipped cycle.
    #[must_use]
    pub fn apps(&self) -> &[AppReport] {
        match self {
            Self::Skipped(_) => &[],
            Self::Completed(apps) => apps,
        }
    }

    /// Number of apps that failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.apps().iter().filter(|report| report.result.is_err()).count()
    }

    /// Log the cycle outcome.
    pub fn log(&self) {
        let apps = match self {
            Self::Skipped(error) => {
                warn!("Skipping update cycle: {error}");
                return;
            }
            Self::Completed(apps) => apps,
        };

        for report in apps {
            match &report.result {
                Ok(outcome @ AppOutcome::AlreadyRunning { .. }) => {
                    debug!(app = %report.app_key, "{outcome}");
                }
                Ok(outcome) => info!(app = %report.app_key, "{outcome}"),
                Err(error) => warn!(app = %report.app_key, "Failed to update app: {error}"),
            }
        }
        info!("Update cycle finished: {} apps, {} failed", apps.len(), self.failures());
    }
}

/// Reconciles configured apps against releases, installs, and processes.
pub struct Updater<C, R, P = SignalControl> {
    config: C,
    releases: R,
    supervisor: Arc<ProcessSupervisor<P>>,
    installer: ArchiveInstaller,
    apps_root: PathBuf,
    interval: Duration,
    selection: AssetSelection,
}

impl<C, R, P> Updater<C, R, P>
where
    C: ConfigSource,
    R: ReleaseSource,
    P: ProcessControl + 'static,
{
    /// Create an updater installing below `apps_root`.
    pub fn new(
        config: C,
        releases: R,
        supervisor: Arc<ProcessSupervisor<P>>,
        apps_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            releases,
            supervisor,
            installer: ArchiveInstaller::new(),
            apps_root: apps_root.into(),
            interval: DEFAULT_CHECK_INTERVAL,
            selection: AssetSelection::default(),
        }
    }

    /// Set the time between the start of two cycles.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set which release asset gets installed.
    #[must_use]
    pub fn with_asset_selection(mut self, selection: AssetSelection) -> Self {
        self.selection = selection;
        self
    }

    /// The supervisor processes are started under.
    pub fn supervisor(&self) -> &Arc<ProcessSupervisor<P>> {
        &self.supervisor
    }

    /// Run a cycle now and then once per interval, forever.
    ///
    /// A cycle that overruns the interval delays the next one; cycles never
    /// overlap.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await.log();
        }
    }

    /// Run one reconciliation cycle over every configured app.
    pub async fn run_cycle(&self) -> CycleReport {
        let config = match self.config.load().await {
            Ok(config) => config,
            Err(error) => return CycleReport::Skipped(error),
        };

        debug!("Reconciling {} apps", config.apps.len());
        let mut reports = Vec::with_capacity(config.apps.len());
        for app in &config.apps {
            let result = self.reconcile_app(app, &config.github_token).await;
            reports.push(AppReport {
                app_key: app.key.clone(),
                result,
            });
        }
        CycleReport::Completed(reports)
    }

    /// Bring one app to its latest release.
    ///
    /// # Errors
    ///
    /// Any [`ZenError`] hit while resolving, installing, or starting the app.
    pub async fn reconcile_app(&self, app: &AppSpec, token: &str) -> Result<AppOutcome, ZenError> {
        match Provider::for_app(app)? {
            Provider::GitHub => {}
        }

        let release = self.releases.latest_release(&app.key, token).await?;
        let path = install_path(&self.apps_root, &app.key, &release.tag);

        let tracked = self.supervisor.get_process(&app.key).ok();
        if let Some(record) = &tracked {
            if record.version == release.tag && self.supervisor.is_running(&app.key) {
                return Ok(AppOutcome::AlreadyRunning {
                    version: release.tag,
                });
            }
        }

        let installed = if fs::try_exists(&path).await? {
            debug!(app = %app.key, version = %release.tag, "Already installed at {}", path.display());
            false
        } else {
            self.install(app, &release, &path, token).await?;
            true
        };

        if !app.has_command() {
            return Ok(AppOutcome::Ready {
                version: release.tag,
                installed,
            });
        }

        let replaced = match tracked {
            Some(record) if record.version != release.tag => {
                info!(
                    app = %app.key,
                    "Replacing {} with {}",
                    record.version,
                    release.tag
                );
                let key = app.key.clone();
                self.supervise(move |supervisor| supervisor.stop(&key))
                    .await?
                    .map(|stopped| stopped.version)
            }
            _ => None,
        };

        let record = {
            let (key, tag, command) = (app.key.clone(), release.tag.clone(), app.command.clone());
            self.supervise(move |supervisor| supervisor.start(&key, &tag, &command, &path))
                .await??
        };
        Ok(AppOutcome::Started {
            version: release.tag,
            pid: record.pid,
            installed,
            replaced,
        })
    }

    /// Run a supervisor operation on the blocking pool.
    ///
    /// Stopping a process can wait for the stop timeout; off the async task,
    /// a shutdown signal is still noticed while it does.
    async fn supervise<T, F>(&self, op: F) -> Result<T, ZenError>
    where
        F: FnOnce(&ProcessSupervisor<P>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let supervisor = Arc::clone(&self.supervisor);
        tokio::task::spawn_blocking(move || op(&supervisor)).await.map_err(|e| {
            ZenError::IoError(std::io::Error::other(format!("supervisor task failed: {e}")))
        })
    }

    async fn install(
        &self,
        app: &AppSpec,
        release: &Release,
        path: &Path,
        token: &str,
    ) -> Result<(), ZenError> {
        let asset = self.selection.select(release).ok_or_else(|| ZenError::NoAsset {
            repo: app.key.clone(),
            tag: release.tag.clone(),
        })?;
        ArchiveFormat::from_filename(&asset.name)?;

        info!(
            app = %app.key,
            version = %release.tag,
            "Installing {} into {}",
            asset.name,
            path.display()
        );
        let stream = self.releases.download_asset(&asset.download_url, token).await?;
        self.installer.install_staged(stream, path, &asset.name).await
    }
}
