//! Release resolution for managed apps.
//!
//! This module answers two questions for the update loop: which release of a
//! repository is the latest one, and how to fetch the bytes of one of its
//! assets. Both sit behind the [`ReleaseSource`] trait so that the update loop
//! can be driven by canned releases in tests; [`GitHubClient`] is the
//! production implementation.
//!
//! # Components
//!
//! - [`Release`] / [`ReleaseAsset`] - The subset of the release document the daemon uses
//! - [`ReleaseSource`] - Latest-release lookup and asset download
//! - [`GitHubClient`] - `reqwest` implementation against the GitHub REST API
//! - [`AssetSelection`] - Which asset of a release gets installed
//! - [`Provider`] - Release host named by an app's `provider` field
//!
//! Nothing here caches: every cycle asks the release host again.

pub mod github;

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::config::AppSpec;
use crate::core::ZenError;

pub use github::GitHubClient;

/// Streamed body of an asset download.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// A published release of an app.
///
/// Field names follow the GitHub release document (`tag_name`,
/// `browser_download_url`); everything else in that document is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release tag, e.g. `v1.2.0`.
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Downloadable files in publication order.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// One downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name, used to pick the archive format.
    pub name: String,
    /// Direct download URL.
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// Source of releases and release assets.
///
/// Implementations must apply their own request timeouts; a timeout is
/// reported like any other resolution or download failure.
pub trait ReleaseSource: Send + Sync {
    /// Fetch the latest published release of `repo` (`owner/name`).
    fn latest_release(
        &self,
        repo: &str,
        token: &str,
    ) -> impl Future<Output = Result<Release, ZenError>> + Send;

    /// Start downloading an asset, returning its body as a stream.
    ///
    /// A non-success status fails with [`ZenError::Download`] before any
    /// bytes are yielded.
    fn download_asset(
        &self,
        url: &str,
        token: &str,
    ) -> impl Future<Output = Result<ByteStream, ZenError>> + Send;
}

/// Release host an app is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// GitHub releases
    GitHub,
}

impl Provider {
    /// Resolve the provider named by an app.
    ///
    /// # Errors
    ///
    /// [`ZenError::UnsupportedProvider`] for anything other than `github`.
    pub fn for_app(app: &AppSpec) -> Result<Self, ZenError> {
        match app.provider.as_str() {
            "github" => Ok(Self::GitHub),
            other => Err(ZenError::UnsupportedProvider {
                app: app.key.clone(),
                provider: other.to_string(),
            }),
        }
    }
}

/// Strategy for choosing the asset to install from a release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssetSelection {
    /// The first asset in publication order.
    #[default]
    First,
    /// The first asset whose name contains the given substring.
    NameContains(String),
}

impl AssetSelection {
    /// Build a strategy from the optional `asset_match` setting.
    #[must_use]
    pub fn from_pattern(pattern: Option<&str>) -> Self {
        match pattern.map(str::trim) {
            Some(pattern) if !pattern.is_empty() => Self::NameContains(pattern.to_string()),
            _ => Self::First,
        }
    }

    /// Pick the asset to install, if the release has one that qualifies.
    #[must_use]
    pub fn select<'a>(&self, release: &'a Release) -> Option<&'a ReleaseAsset> {
        match self {
            Self::First => release.assets.first(),
            Self::NameContains(pattern) => {
                release.assets.iter().find(|asset| asset.name.contains(pattern.as_str()))
            }
        }
    }
}
