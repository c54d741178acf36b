//! Error handling for zend
//!
//! This module provides the error taxonomy of the daemon and the user-facing
//! rendering used by the command-line entry point. The error system follows
//! two rules:
//! 1. **Strongly-typed errors** for every failure a reconciliation cycle can
//!    hit, so that callers and tests can match on the exact failure kind
//! 2. **User-friendly messages** with actionable suggestions for the few
//!    errors that reach the terminal (settings problems at startup)
//!
//! # Architecture
//!
//! - [`ZenError`] - Enumerated error types for all failure cases
//! - [`ResolutionFailure`] - Why a release lookup failed (status, transport, decode)
//! - [`ErrorContext`] - Wrapper that adds details and suggestions for display
//!
//! # Propagation
//!
//! Per-app errors are collected by the update loop and logged; they never abort
//! a cycle. Configuration errors skip a single cycle. Stop failures
//! ([`ZenError::ProcessStop`]) are only ever logged.
//!
//! # Examples
//!
//! ```rust,no_run
//! use zend::core::{ZenError, user_friendly_error};
//!
//! let error = ZenError::UnsupportedProvider {
//!     app: "owner/repo".to_string(),
//!     provider: "gitlab".to_string(),
//! };
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for zend operations
///
/// Each variant maps to one entry of the daemon's failure taxonomy and carries
/// the identifiers (app key, URL, path, pid) needed to make the log line useful
/// on its own.
#[derive(Error, Debug)]
pub enum ZenError {
    /// The setup document or the daemon settings could not be used
    #[error("Configuration error in {path}: {reason}")]
    ConfigError {
        /// File the configuration was read from
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// An app names a release provider other than `github`
    #[error("Unsupported provider '{provider}' for app '{app}'")]
    UnsupportedProvider {
        /// App key as configured
        app: String,
        /// Provider value as configured
        provider: String,
    },

    /// The latest release of a repository could not be determined
    #[error("Failed to resolve latest release of '{repo}': {failure}")]
    ReleaseResolution {
        /// Repository key (`owner/name`)
        repo: String,
        /// Status, transport, or decode failure
        failure: ResolutionFailure,
    },

    /// The release carries no asset the selection strategy accepts
    #[error("Release {tag} of '{repo}' has no installable asset")]
    NoAsset {
        /// Repository key
        repo: String,
        /// Release tag
        tag: String,
    },

    /// An asset download failed or returned a non-success status
    #[error("Failed to download {asset}: {reason}")]
    Download {
        /// Asset URL, or the asset name once the body is streaming
        asset: String,
        /// HTTP status, when the server answered
        status: Option<u16>,
        /// Human-readable cause
        reason: String,
    },

    /// Asset filename has a suffix no extractor handles
    #[error("Unsupported archive format: {filename}")]
    UnsupportedArchiveFormat {
        /// Asset filename
        filename: String,
    },

    /// Extraction stopped partway through an archive
    #[error("Failed to extract {archive} into {dest}: {reason}")]
    Extraction {
        /// Archive filename
        archive: String,
        /// Destination directory
        dest: String,
        /// Underlying cause
        reason: String,
    },

    /// The log file could not be opened or the shell could not be launched
    #[error("Failed to start '{command}' for app '{app}': {reason}")]
    ProcessSpawn {
        /// App key
        app: String,
        /// Command line handed to the shell
        command: String,
        /// Underlying cause
        reason: String,
    },

    /// Neither the graceful nor the forceful signal could be delivered
    #[error("Failed to stop process {pid} of app '{app}': {reason}")]
    ProcessStop {
        /// App key
        app: String,
        /// Process id that was signalled
        pid: u32,
        /// Underlying cause
        reason: String,
    },

    /// No process is tracked for the app
    #[error("No process tracked for app '{app}'")]
    NotFound {
        /// App key
        app: String,
    },

    /// Filesystem failure outside extraction
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reason a release lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The API answered with a non-success status
    Status(u16),
    /// The request never completed (connect error, timeout, ...)
    Transport(String),
    /// The response body was not a release document
    Decode(String),
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "API returned status {status}"),
            Self::Transport(reason) => write!(f, "request failed: {reason}"),
            Self::Decode(reason) => write!(f, "malformed release document: {reason}"),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// Used by the binary for errors that end the process. Errors handled inside
/// the update loop are logged directly and never wrapped.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error (a [`ZenError`] or anything else `anyhow` carried)
    pub error: anyhow::Error,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestions or details.
    #[must_use]
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining why the error occurred.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details, and suggestion to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {:#}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Checks for a [`ZenError`] anywhere in the chain first, then for common
/// standard library and parser errors.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = match error.chain().find_map(|e| e.downcast_ref::<ZenError>()) {
        Some(zen_error) => suggestion_for(zen_error),
        None => None,
    };
    if let Some((suggestion, details)) = suggestion {
        return ErrorContext::new(error).with_suggestion(suggestion).with_details(details);
    }

    if error.chain().any(|e| e.downcast_ref::<toml::de::Error>().is_some()) {
        return ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax of the settings file passed with --config")
            .with_details("All settings are optional; an empty file yields the defaults");
    }

    if let Some(io_error) = error.chain().find_map(|e| e.downcast_ref::<std::io::Error>()) {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(error)
                    .with_suggestion("Run the daemon as a user that can write the apps root, or point --apps-root elsewhere")
                    .with_details("zend creates install directories and log files below the apps root");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(error)
                    .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    ErrorContext::new(error)
}

fn suggestion_for(error: &ZenError) -> Option<(&'static str, &'static str)> {
    match error {
        ZenError::ConfigError { .. } => Some((
            "Fix the configuration named in the error and try again",
            "Daemon settings are read at startup; the setup document is re-read every cycle",
        )),
        ZenError::UnsupportedProvider { .. } => Some((
            "Set the app's provider to \"github\"",
            "GitHub releases are the only supported release source",
        )),
        ZenError::ReleaseResolution { failure: ResolutionFailure::Status(401 | 403), .. } => Some((
            "Check that the GitHub token is valid and can read the repository",
            "The release API rejected the token",
        )),
        ZenError::UnsupportedArchiveFormat { .. } => Some((
            "Publish the release asset as .tar.gz, .tgz, or .zip",
            "The archive format is chosen from the asset filename",
        )),
        _ => None,
    }
}
