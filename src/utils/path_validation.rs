//! Path validation utilities for zend.
//!
//! Archive entries name their own destination paths, so every entry is checked
//! here before anything is written to disk.

use anyhow::{Result, anyhow};
use std::path::{Component, Path, PathBuf};

/// Validates that a path contains no parent directory references.
///
/// # Errors
/// Returns an error if the path contains a `..` component.
pub fn validate_no_traversal(path: &Path) -> Result<()> {
    for component in path.components() {
        if component == Component::ParentDir {
            return Err(anyhow!(
                "Path contains parent directory reference (..): {}",
                path.display()
            ));
        }
    }
    Ok(())
}

/// Joins an archive entry path onto an extraction root.
///
/// Leading `/` and `./` components are dropped so that absolute entries land
/// inside `root` instead of escaping it. Returns `None` for entries that name
/// the root itself (tarballs commonly start with a `./` entry).
///
/// # Errors
/// Returns an error if the entry contains `..` or a drive prefix.
pub fn join_entry(root: &Path, entry: &Path) -> Result<Option<PathBuf>> {
    validate_no_traversal(entry)?;

    let mut joined = root.to_path_buf();
    let mut depth = 0usize;
    for component in entry.components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::RootDir | Component::CurDir => {}
            Component::Prefix(_) => {
                return Err(anyhow!("Path has a drive prefix: {}", entry.display()));
            }
            Component::ParentDir => unreachable!("rejected by validate_no_traversal"),
        }
    }

    Ok((depth > 0).then_some(joined))
}
