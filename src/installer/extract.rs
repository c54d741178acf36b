//! Archive extractors.
//!
//! Both extractors run on a blocking thread and write straight into the
//! destination directory. Regular files keep the permission bits recorded in
//! the archive (setuid/setgid/sticky are dropped); directories are created
//! with [`DIR_MODE`]. Symlinks and special entries are skipped.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::debug;
use zip::ZipArchive;

use crate::constants::DIR_MODE;
use crate::utils::join_entry;

/// Mode for regular files whose archive entry records none.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Extract a gzip-compressed tarball into `dest`.
pub(super) fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let mut tarball = Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in tarball.entries().context("Failed to read tar entries")? {
        let mut entry = entry.context("Failed to read tar entry")?;
        let entry_path = entry.path().context("Tar entry has an invalid path")?.into_owned();
        let Some(target) = join_entry(dest, &entry_path)? else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            create_dir(&target)?;
        } else if entry_type.is_file() {
            let mode = entry.header().mode().unwrap_or(DEFAULT_FILE_MODE);
            write_file(&target, &mut entry, mode)?;
        } else {
            debug!("Skipping {:?} entry {}", entry_type, entry_path.display());
        }
    }

    Ok(())
}

/// Extract a zip archive into `dest`.
pub(super) fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).context("Failed to read zip directory")?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).context("Failed to read zip entry")?;
        let Some(entry_path) = entry.enclosed_name() else {
            bail!("Zip entry escapes the destination: {}", entry.name());
        };
        let Some(target) = join_entry(dest, &entry_path)? else {
            continue;
        };

        if entry.is_dir() {
            create_dir(&target)?;
        } else if entry.is_symlink() {
            debug!("Skipping symlink entry {}", entry_path.display());
        } else {
            let mode = entry.unix_mode().unwrap_or(DEFAULT_FILE_MODE);
            write_file(&target, &mut entry, mode)?;
        }
    }

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

fn write_file(path: &Path, reader: &mut impl Read, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    io::copy(reader, &mut file).with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode & 0o777))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
