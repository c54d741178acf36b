//! Test utilities for zend
//!
//! This module provides helpers shared by the unit tests and the integration
//! test target:
//! - Logging setup that stays silent unless `RUST_LOG` is set
//! - Builders for `.tar.gz` and `.zip` release assets
//! - Byte streams standing in for asset downloads
//! - A small HTTP server answering canned responses for the release client
//!
//! # Example
//!
//! ```rust,no_run
//! use zend::test_utils::{ArchiveEntry, byte_stream, tar_gz_archive};
//!
//! let archive = tar_gz_archive(&[ArchiveEntry::file("bin/app", "#!/bin/sh\n", 0o755)]);
//! let stream = byte_stream(archive);
//! ```

mod archive;
mod http;

pub use archive::{ArchiveEntry, tar_gz_archive, zip_archive};
pub use http::{RecordedRequest, TestHttpServer};

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::release::ByteStream;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Initializes the tracing subscriber once per test binary. Uses the provided
/// level, or `RUST_LOG` when no level is given; without either, tests run
/// without logging.
///
/// ```bash
/// RUST_LOG=zend=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Stream `data` in 1 KiB chunks, like a download body.
#[must_use]
pub fn byte_stream(data: impl Into<Vec<u8>>) -> ByteStream {
    let chunks: Vec<std::io::Result<Bytes>> =
        data.into().chunks(1024).map(|chunk| Ok(Bytes::copy_from_slice(chunk))).collect();
    stream::iter(chunks).boxed()
}

/// Stream `prefix`, then fail as if the connection dropped.
#[must_use]
pub fn failing_stream(prefix: impl Into<Vec<u8>>) -> ByteStream {
    let chunks = vec![
        Ok(Bytes::from(prefix.into())),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset")),
    ];
    stream::iter(chunks).boxed()
}

/// Whether `pid` no longer runs: gone, or a zombie waiting to be reaped.
///
/// Backgrounded grandchildren are reparented to the init process once their
/// group leader exits, so a test cannot wait on them directly.
#[cfg(unix)]
#[must_use]
pub fn process_exited(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            // State is the first field after the parenthesized command name
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| matches!(state, 'Z' | 'X')),
            Err(_) => true,
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let Ok(raw) = i32::try_from(pid) else {
            return true;
        };
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), None).is_err()
    }
}

/// Read a pid a test command wrote with `echo $! > file`.
///
/// # Panics
///
/// Panics if the file is missing or does not hold a pid.
#[must_use]
pub fn read_pid_file(path: &std::path::Path) -> u32 {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
        .trim()
        .parse()
        .unwrap_or_else(|e| panic!("{} holds no pid: {e}", path.display()))
}
