//! The `path` command.

use anyhow::Result;
use clap::Args;

use crate::config::DaemonConfig;
use crate::installer::install_path;

/// Print the install directory of an app release.
#[derive(Args, Debug)]
pub struct PathCommand {
    /// Repository key, e.g. `owner/app`
    pub(crate) key: String,

    /// Release tag, e.g. `v1.2.0`
    pub(crate) tag: String,
}

impl PathCommand {
    /// Print the directory below the configured apps root.
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` like every other command.
    pub fn execute(self, settings: &DaemonConfig) -> Result<()> {
        println!("{}", install_path(&settings.apps_root, &self.key, &self.tag).display());
        Ok(())
    }
}
