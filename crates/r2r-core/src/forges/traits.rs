use std::path::Path;

use async_trait::async_trait;

use crate::fetch::FetchError;
use crate::io::DownloadedFile;

/// Represents a release found on a hosting platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag_name: String,
    pub published_at: Option<String>,
    pub assets: Vec<AssetInfo>,
    pub prerelease: bool,
}

/// Represents an asset attached to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub name: String,
    pub download_url: String,
}

/// A platform that publishes releases (e.g. GitHub)
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// The release the platform considers latest.
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<ReleaseInfo, FetchError>;

    /// One page of the release listing, newest first. Pages start at 1; an
    /// empty page means the listing is exhausted.
    async fn releases_page(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Vec<ReleaseInfo>, FetchError>;

    /// The repository's license name, if it declares one.
    async fn license(&self, owner: &str, repo: &str) -> Result<Option<String>, FetchError>;

    /// Stream an asset to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadedFile, FetchError>;
}
