//! Archive installation for managed apps.
//!
//! An install turns a streamed release asset into an extracted directory:
//!
//! 1. The archive format is chosen from the asset filename (`.tar.gz`/`.tgz`
//!    or `.zip`); anything else fails before a byte is consumed
//! 2. The stream is written to a temporary file inside the destination
//! 3. The matching extractor runs on a blocking thread
//! 4. The temporary archive is deleted, on success and on failure
//!
//! [`ArchiveInstaller::install`] extracts in place and is not transactional: a
//! failure partway leaves a partially populated directory.
//! [`ArchiveInstaller::install_staged`] wraps it so that the final install
//! directory only ever appears complete, which is what the update loop relies
//! on when it treats an existing directory as installed.
//!
//! # Modules
//!
//! - [`paths`] - Deterministic install directory naming

mod extract;
pub mod paths;


use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::STAGING_PREFIX;
use crate::core::ZenError;
use crate::release::ByteStream;

pub use paths::{install_dir_name, install_path, sanitize_tag, slugify};

/// Archive formats the installer can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball (`.tar.gz`, `.tgz`)
    TarGz,
    /// Zip archive (`.zip`)
    Zip,
}

impl ArchiveFormat {
    /// Pick the format from an asset filename, ignoring case.
    ///
    /// # Errors
    ///
    /// [`ZenError::UnsupportedArchiveFormat`] for any other suffix.
    pub fn from_filename(filename: &str) -> Result<Self, ZenError> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Ok(Self::Zip)
        } else {
            Err(ZenError::UnsupportedArchiveFormat {
                filename: filename.to_string(),
            })
        }
    }

    /// Suffix used for the temporary archive file.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
        }
    }

    /// Extract `archive` into `dest`, blocking the current thread.
    ///
    /// # Errors
    ///
    /// Fails on a corrupt archive, an entry escaping `dest`, or any write error.
    pub fn extract(self, archive: &Path, dest: &Path) -> anyhow::Result<()> {
        match self {
            Self::TarGz => extract::extract_tar_gz(archive, dest),
            Self::Zip => extract::extract_zip(archive, dest),
        }
    }
}

/// Downloads release assets to disk and extracts them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveInstaller;

impl ArchiveInstaller {
    /// Create an installer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Write `stream` to a temporary archive in `dest_dir` and extract it there.
    ///
    /// `dest_dir` is created if missing. The temporary archive is removed on
    /// every path out of this function.
    ///
    /// # Errors
    ///
    /// - [`ZenError::UnsupportedArchiveFormat`] when `filename` has an unknown
    ///   suffix; nothing is written besides `dest_dir` itself
    /// - [`ZenError::Download`] when the stream fails partway
    /// - [`ZenError::Extraction`] when the archive cannot be extracted
    /// - [`ZenError::IoError`] for other filesystem failures
    pub async fn install(
        &self,
        mut stream: ByteStream,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<(), ZenError> {
        fs::create_dir_all(dest_dir).await?;
        let format = ArchiveFormat::from_filename(filename)?;

        let archive = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(format.suffix())
            .tempfile_in(dest_dir)?;

        let mut file = fs::File::from_std(archive.reopen()?);
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ZenError::Download {
                asset: filename.to_string(),
                status: None,
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        debug!("Downloaded {filename} ({written} bytes)");

        let archive_path = archive.path().to_path_buf();
        let dest = dest_dir.to_path_buf();
        let extracted =
            tokio::task::spawn_blocking(move || format.extract(&archive_path, &dest)).await;

        let extraction_error = |reason: String| ZenError::Extraction {
            archive: filename.to_string(),
            dest: dest_dir.display().to_string(),
            reason,
        };
        match extracted {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(extraction_error(format!("{e:#}"))),
            Err(join_error) => return Err(extraction_error(join_error.to_string())),
        }

        archive.close()?;
        Ok(())
    }

    /// Install into a staging directory next to `install_path`, then rename it
    /// into place.
    ///
    /// The staging directory is `<parent>/.staging-<dirname>-<uuid>` and is
    /// removed if anything fails, so `install_path` either does not exist or
    /// holds a complete extraction.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveInstaller::install`], plus [`ZenError::IoError`] when
    /// the staging directory cannot be published.
    pub async fn install_staged(
        &self,
        stream: ByteStream,
        install_path: &Path,
        filename: &str,
    ) -> Result<(), ZenError> {
        let staging = staging_path(install_path)?;
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent).await?;
        }

        let result = match self.install(stream, &staging, filename).await {
            Ok(()) => fs::rename(&staging, install_path).await.map_err(ZenError::from),
            Err(e) => Err(e),
        };

        if result.is_err() {
            match fs::remove_dir_all(&staging).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    warn!("Failed to remove staging directory {}: {e}", staging.display());
                }
                _ => {}
            }
        }
        result
    }

    /// Remove staging directories left in `apps_root` by an install that was
    /// interrupted, returning how many were removed.
    ///
    /// Only call this while no install is running. A missing `apps_root` has
    /// nothing to clean.
    ///
    /// # Errors
    ///
    /// [`ZenError::IoError`] when `apps_root` cannot be listed. Directories
    /// that cannot be removed are logged and skipped.
    pub async fn remove_stale_staging(&self, apps_root: &Path) -> Result<usize, ZenError> {
        let mut entries = match fs::read_dir(apps_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX)
                || !entry.file_type().await?.is_dir()
            {
                continue;
            }

            let path = entry.path();
            match fs::remove_dir_all(&path).await {
                Ok(()) => {
                    debug!("Removed stale staging directory {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove stale staging directory {}: {e}", path.display()),
            }
        }
        Ok(removed)
    }
}

fn staging_path(install_path: &Path) -> Result<PathBuf, ZenError> {
    let (Some(parent), Some(name)) = (install_path.parent(), install_path.file_name()) else {
        return Err(ZenError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Install path has no parent directory: {}", install_path.display()),
        )));
    };

    Ok(parent.join(format!(
        "{STAGING_PREFIX}{}-{}",
        name.to_string_lossy(),
        Uuid::new_v4().simple()
    )))
}
