//! GitHub implementation of [`ReleaseSource`].
//!
//! Two `reqwest` clients are kept: one for API calls with a seconds-scale
//! timeout and one for asset downloads with a minutes-scale timeout, since a
//! release artifact can be orders of magnitude larger than a release document.

use futures::{StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{ByteStream, Release, ReleaseSource};
use crate::config::DaemonConfig;
use crate::constants::{GITHUB_ACCEPT, GITHUB_API_VERSION};
use crate::core::{ResolutionFailure, ZenError};

const USER_AGENT: &str = concat!("zend/", env!("CARGO_PKG_VERSION"));

/// Release client for the GitHub REST API.
///
/// Every request carries the token as a bearer credential. Requests without a
/// `User-Agent` are rejected by GitHub, so one is always set.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use zend::release::{GitHubClient, ReleaseSource};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = GitHubClient::new(
///     "https://api.github.com",
///     Duration::from_secs(30),
///     Duration::from_secs(600),
/// )?;
/// let release = client.latest_release("owner/repo", "ghp_token").await?;
/// println!("latest: {}", release.tag);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api: Client,
    downloads: Client,
    api_url: String,
}

impl GitHubClient {
    /// Create a client for the API at `api_url`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be initialized (TLS backend setup).
    pub fn new(
        api_url: impl Into<String>,
        api_timeout: Duration,
        download_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let api = Client::builder().user_agent(USER_AGENT).timeout(api_timeout).build()?;
        let downloads =
            Client::builder().user_agent(USER_AGENT).timeout(download_timeout).build()?;

        Ok(Self {
            api,
            downloads,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the daemon settings.
    ///
    /// # Errors
    ///
    /// See [`GitHubClient::new`].
    pub fn from_config(config: &DaemonConfig) -> reqwest::Result<Self> {
        Self::new(&config.api_url, config.api_timeout(), config.download_timeout())
    }

    /// URL of the latest-release endpoint for `repo`.
    #[must_use]
    pub fn latest_release_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/releases/latest", self.api_url, repo)
    }
}

impl ReleaseSource for GitHubClient {
    async fn latest_release(&self, repo: &str, token: &str) -> Result<Release, ZenError> {
        let url = self.latest_release_url(repo);
        debug!("Fetching latest release from {url}");

        let resolution_error = |failure| ZenError::ReleaseResolution {
            repo: repo.to_string(),
            failure,
        };

        let response = self
            .api
            .get(&url)
            .bearer_auth(token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .map_err(|e| resolution_error(ResolutionFailure::Transport(e.to_string())))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(resolution_error(ResolutionFailure::Status(status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| resolution_error(ResolutionFailure::Transport(e.to_string())))?;

        let release: Release = serde_json::from_slice(&body)
            .map_err(|e| resolution_error(ResolutionFailure::Decode(e.to_string())))?;

        debug!("Latest release of {repo} is {} ({} assets)", release.tag, release.assets.len());
        Ok(release)
    }

    async fn download_asset(&self, url: &str, token: &str) -> Result<ByteStream, ZenError> {
        debug!("Downloading {url}");

        let response = self.downloads.get(url).bearer_auth(token).send().await.map_err(|e| {
            ZenError::Download {
                asset: url.to_string(),
                status: None,
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            // Dropping the response closes the connection without reading the body
            return Err(ZenError::Download {
                asset: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("server returned status {status}"),
            });
        }

        Ok(response.bytes_stream().map_err(std::io::Error::other).boxed())
    }
}
