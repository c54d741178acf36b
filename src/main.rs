//! zend entry point
//!
//! Parses the command line, runs the selected command, and renders fatal
//! errors with suggestions. Failures of individual apps never reach this
//! point; they are logged by the update loop.

use anyhow::Result;
use clap::Parser;
use zend::cli;
use zend::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
