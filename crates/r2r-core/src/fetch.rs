//! Resolving a target to exactly one release asset.
//!
//! Release selection is deliberately simple: either the platform's idea of
//! "latest", or the newest listed release whose tag starts with a prefix.
//! Asset selection takes the first asset, in listing order, whose name
//! matches the target's pattern in full.

use std::path::Path;
use std::sync::Arc;

use r2r_schema::ReleaseAsset;
use thiserror::Error;

use crate::config::{NamePattern, TargetSpec, VersionMatch};
use crate::forges::{AssetInfo, ReleaseInfo, ReleaseSource};
use crate::io::{DownloadError, DownloadedFile};

/// Release listing pages scanned before giving up on a prefix.
pub const MAX_RELEASE_PAGES: u32 = 50;

/// License recorded in RPM specs when the repository declares none.
pub const UNKNOWN_LICENSE: &str = "Unspecified";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Release API {url} returned status {status}")]
    Api { url: String, status: u16 },

    #[error("Invalid HTTP header: {0}")]
    InvalidHeader(String),

    #[error("No release of {repo} matches '{version_match}'")]
    ReleaseNotFound { repo: String, version_match: String },

    #[error("No asset of {repo} {tag} matches '{pattern}'")]
    AssetNotFound {
        repo: String,
        tag: String,
        pattern: String,
    },

    #[error("Download failed: {0}")]
    DownloadFailed(#[from] DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The release and asset chosen for a target, plus its package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub asset: ReleaseAsset,
    pub version: String,
}

/// The first release whose tag starts with `prefix`, in listing order.
pub fn select_release<'a>(releases: &'a [ReleaseInfo], prefix: &str) -> Option<&'a ReleaseInfo> {
    releases.iter().find(|r| r.tag_name.starts_with(prefix))
}

/// The first asset whose name matches `pattern` in full, in listing order.
pub fn select_asset<'a>(release: &'a ReleaseInfo, pattern: &NamePattern) -> Option<&'a AssetInfo> {
    release.assets.iter().find(|a| pattern.is_match(&a.name))
}

/// Derive a package version from a release tag.
///
/// Everything before the first digit is dropped (`v1.2.3` and
/// `release-1.2.3` both give `1.2.3`). A tag without digits falls back to
/// the publication time as `YYYYMMDDHHMMSS`, and to `0` without one.
pub fn version_from_tag(tag: &str, published_at: Option<&str>) -> String {
    if let Some(start) = tag.find(|c: char| c.is_ascii_digit()) {
        return tag[start..].to_string();
    }

    match published_at {
        Some(ts) => chrono::DateTime::parse_from_rfc3339(ts).map_or_else(
            |_| {
                ts.chars()
                    .filter(char::is_ascii_alphanumeric)
                    .collect::<String>()
            },
            |dt| dt.format("%Y%m%d%H%M%S").to_string(),
        ),
        None => "0".to_string(),
    }
}

/// Resolves targets against a [`ReleaseSource`].
#[derive(Clone)]
pub struct ReleaseFetcher {
    source: Arc<dyn ReleaseSource>,
    max_pages: u32,
}

impl std::fmt::Debug for ReleaseFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseFetcher")
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl ReleaseFetcher {
    pub fn new(source: Arc<dyn ReleaseSource>) -> Self {
        Self {
            source,
            max_pages: MAX_RELEASE_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Pick the release and asset for `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ReleaseNotFound`] when no release qualifies,
    /// [`FetchError::AssetNotFound`] when the chosen release has no matching
    /// asset, or any transport error from the source.
    pub async fn resolve(&self, spec: &TargetSpec) -> Result<ResolvedRelease, FetchError> {
        let release = self.find_release(spec).await?;

        let asset = select_asset(&release, &spec.asset_pattern).ok_or_else(|| {
            FetchError::AssetNotFound {
                repo: spec.label(),
                tag: release.tag_name.clone(),
                pattern: spec.asset_pattern.to_string(),
            }
        })?;

        let version = version_from_tag(&release.tag_name, release.published_at.as_deref());
        tracing::debug!(
            target_id = %spec.id,
            tag = %release.tag_name,
            asset = %asset.name,
            %version,
            "Resolved release"
        );

        Ok(ResolvedRelease {
            asset: ReleaseAsset {
                name: asset.name.clone(),
                download_url: asset.download_url.clone(),
                tag: release.tag_name.clone(),
                published_at: release.published_at.clone(),
            },
            version,
        })
    }

    async fn find_release(&self, spec: &TargetSpec) -> Result<ReleaseInfo, FetchError> {
        let prefix = match &spec.version_match {
            VersionMatch::Latest => {
                return self.source.latest_release(&spec.owner, &spec.repo).await;
            }
            VersionMatch::Prefix(prefix) => prefix,
        };

        for page in 1..=self.max_pages {
            let releases = self
                .source
                .releases_page(&spec.owner, &spec.repo, page)
                .await?;
            if releases.is_empty() {
                break;
            }
            if let Some(found) = select_release(&releases, prefix) {
                return Ok(found.clone());
            }
            tracing::debug!(target_id = %spec.id, page, "No matching tag on page");
        }

        Err(FetchError::ReleaseNotFound {
            repo: spec.label(),
            version_match: prefix.clone(),
        })
    }

    /// Stream the resolved asset into `dir`, named after the asset.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DownloadFailed`] for non-200 responses or
    /// transport errors.
    pub async fn download(
        &self,
        resolved: &ResolvedRelease,
        dir: &Path,
    ) -> Result<DownloadedFile, FetchError> {
        let file_name = Path::new(&resolved.asset.name)
            .file_name()
            .map_or_else(|| "asset".into(), std::ffi::OsStr::to_os_string);
        let dest = dir.join(file_name);
        let file = self.source.download(&resolved.asset.download_url, &dest).await?;
        tracing::debug!(
            asset = %resolved.asset.name,
            size = file.size,
            sha256 = %file.sha256,
            "Downloaded asset"
        );
        Ok(file)
    }

    /// The repository's declared license, or [`UNKNOWN_LICENSE`].
    ///
    /// Lookup failures are logged and never fatal.
    pub async fn license(&self, spec: &TargetSpec) -> String {
        match self.source.license(&spec.owner, &spec.repo).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_LICENSE.to_string(),
            Err(e) => {
                tracing::warn!(target_id = %spec.id, "License lookup failed: {e}");
                UNKNOWN_LICENSE.to_string()
            }
        }
    }
}
