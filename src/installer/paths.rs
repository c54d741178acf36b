//! Deterministic install directory naming.
//!
//! Every installed release lives in `<apps_root>/<slug>-<tag>`, where the slug
//! is derived from the repository key and the tag from the release tag. The
//! directory name is the only record of an installation, so these functions
//! must stay pure and stable across releases of zend.
//!
//! ```rust
//! use std::path::Path;
//! use zend::installer::paths::install_path;
//!
//! let path = install_path(Path::new("/opt/zen/apps"), "Owner/My_App", "v1.2.0");
//! assert_eq!(path, Path::new("/opt/zen/apps/owner-my-app-1.2.0"));
//! ```

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SLUG_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9-]+").expect("static slug pattern"));

static TAG_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9._-]+").expect("static tag pattern"));

/// Normalizes an app key into a filesystem-safe slug.
///
/// Lowercases, turns `/` into `-`, collapses every run of characters outside
/// `[a-z0-9-]` into a single `-`, and trims `-` from both ends.
#[must_use]
pub fn slugify(key: &str) -> String {
    let lowered = key.to_lowercase().replace('/', "-");
    SLUG_INVALID.replace_all(&lowered, "-").trim_matches('-').to_string()
}

/// Normalizes a release tag for use in a directory name.
///
/// Strips one leading `v` and collapses every run of characters outside
/// `[A-Za-z0-9._-]` into a single `-`.
#[must_use]
pub fn sanitize_tag(tag: &str) -> String {
    let stripped = tag.strip_prefix('v').unwrap_or(tag);
    TAG_INVALID.replace_all(stripped, "-").into_owned()
}

/// Directory name of an install: `slugify(key) + "-" + sanitize_tag(tag)`.
#[must_use]
pub fn install_dir_name(key: &str, tag: &str) -> String {
    format!("{}-{}", slugify(key), sanitize_tag(tag))
}

/// Absolute install directory of `(key, tag)` below `apps_root`.
#[must_use]
pub fn install_path(apps_root: &Path, key: &str, tag: &str) -> PathBuf {
    apps_root.join(install_dir_name(key, tag))
}
