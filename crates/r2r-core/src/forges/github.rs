//! GitHub REST API release source.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::traits::{AssetInfo, ReleaseInfo, ReleaseSource};
use crate::fetch::FetchError;
use crate::io::{DownloadedFile, download_to};

/// Public GitHub API root.
pub const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    #[serde(default)]
    license: Option<GithubLicense>,
}

#[derive(Debug, Deserialize)]
struct GithubLicense {
    #[serde(default)]
    name: Option<String>,
}

impl From<GithubRelease> for ReleaseInfo {
    fn from(r: GithubRelease) -> Self {
        Self {
            tag_name: r.tag_name,
            published_at: r.published_at,
            prerelease: r.prerelease,
            assets: r
                .assets
                .into_iter()
                .map(|a| AssetInfo {
                    name: a.name,
                    download_url: a.browser_download_url,
                })
                .collect(),
        }
    }
}

/// Build a client carrying the user agent, configured headers and token.
///
/// A token without a scheme is sent as `Bearer <token>`.
///
/// # Errors
///
/// Returns [`FetchError::InvalidHeader`] when a header name or value cannot
/// be sent, or [`FetchError::Http`] if the client cannot be built.
pub fn build_github_client(
    token: Option<&str>,
    extra: &BTreeMap<String, String>,
    connect_timeout: Duration,
) -> Result<Client, FetchError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(crate::USER_AGENT),
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/vnd.github+json"),
    );

    for (name, value) in extra {
        let name = header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value = header::HeaderValue::from_str(value)
            .map_err(|_| FetchError::InvalidHeader(name.as_str().to_string()))?;
        headers.insert(name, value);
    }

    if let Some(t) = token.map(str::trim).filter(|t| !t.is_empty()) {
        let value = if t.contains(' ') {
            t.to_string()
        } else {
            format!("Bearer {t}")
        };
        let mut value = header::HeaderValue::from_str(&value)
            .map_err(|_| FetchError::InvalidHeader("Authorization".to_string()))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }

    Ok(Client::builder()
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .build()?)
}

/// Releases from the GitHub REST API (or a compatible Enterprise endpoint).
#[derive(Debug, Clone)]
pub struct GitHubForge {
    client: Client,
    api_base: String,
    api_timeout: Duration,
    download_timeout: Duration,
}

impl GitHubForge {
    pub fn new(client: Client, api_base: &str, api_timeout: Duration, download_timeout: Duration) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_timeout,
            download_timeout,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, FetchError> {
        tracing::debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .timeout(self.api_timeout)
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => Ok(Some(resp.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(FetchError::Api {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl ReleaseSource for GitHubForge {
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<ReleaseInfo, FetchError> {
        let url = format!("{}/repos/{owner}/{repo}/releases/latest", self.api_base);
        self.get_json::<GithubRelease>(&url)
            .await?
            .map(ReleaseInfo::from)
            .ok_or_else(|| FetchError::ReleaseNotFound {
                repo: format!("{owner}/{repo}"),
                version_match: "latest".to_string(),
            })
    }

    async fn releases_page(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Vec<ReleaseInfo>, FetchError> {
        let url = format!("{}/repos/{owner}/{repo}/releases?page={page}", self.api_base);
        Ok(self
            .get_json::<Vec<GithubRelease>>(&url)
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(ReleaseInfo::from)
            .collect())
    }

    async fn license(&self, owner: &str, repo: &str) -> Result<Option<String>, FetchError> {
        let url = format!("{}/repos/{owner}/{repo}", self.api_base);
        Ok(self
            .get_json::<GithubRepo>(&url)
            .await?
            .and_then(|r| r.license)
            .and_then(|l| l.name)
            .filter(|n| !n.is_empty()))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadedFile, FetchError> {
        Ok(download_to(&self.client, url, dest, self.download_timeout).await?)
    }
}
