//! Records passed between pipeline stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::PackageFormat;

/// Stable identifier joining a target's configuration to its build result.
///
/// Formed as `owner/repo#index` where `index` is the target's position
/// within its repository entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Build the identifier for the `index`th target of `owner/repo`.
    pub fn new(owner: &str, repo: &str, index: usize) -> Self {
        Self(format!("{owner}/{repo}#{index}"))
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name as listed by the platform.
    pub name: String,
    /// Direct download URL.
    pub download_url: String,
    /// Tag of the release the asset belongs to.
    pub tag: String,
    /// Publication timestamp of the release (RFC 3339), if known.
    pub published_at: Option<String>,
}

/// A package file produced (or passed through) for one target and format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageArtifact {
    /// Target that produced this artifact.
    pub target: TargetId,
    /// Package format.
    pub format: PackageFormat,
    /// File name, which is also the name inside the repository pool.
    pub file_name: String,
    /// Current location on disk.
    pub path: PathBuf,
    /// Version string derived from the release tag.
    pub version: String,
    /// Architecture in the vocabulary of `format`.
    pub arch: String,
}

/// Where a target is in its journey from configuration to published index.
///
/// ```text
/// Pending -> Fetching -> Downloading -> Building -> Built -> Indexed -> Published
///               \-> Skipped --------------------------------/
/// any non-terminal state -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// Resolved from configuration, not yet started.
    #[default]
    Pending,
    /// Querying the release API.
    Fetching,
    /// Streaming the selected asset to scratch.
    Downloading,
    /// Running the packaging backend.
    Building,
    /// Artifacts produced and waiting for the pool.
    Built,
    /// Final artifact paths already existed, nothing rebuilt.
    Skipped,
    /// Artifacts listed in a regenerated `Packages` index.
    Indexed,
    /// The suite's `Release` has been written and signed.
    Published,
    /// Gave up; the reason lives on the build result.
    Failed,
}

impl TargetState {
    /// Convert to a lowercase label for logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Downloading => "downloading",
            Self::Building => "building",
            Self::Built => "built",
            Self::Skipped => "skipped",
            Self::Indexed => "indexed",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// Whether moving from `self` to `next` follows the lifecycle.
    pub fn can_transition_to(&self, next: Self) -> bool {
        if next == Self::Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Fetching)
                | (Self::Fetching, Self::Downloading | Self::Skipped)
                | (Self::Downloading, Self::Building)
                | (Self::Building, Self::Built)
                | (Self::Built | Self::Skipped, Self::Indexed)
                | (Self::Indexed, Self::Published)
        )
    }
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
