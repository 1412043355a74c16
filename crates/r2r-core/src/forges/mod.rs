pub mod github;
pub mod traits;

pub use github::{GITHUB_API, GitHubForge, build_github_client};
pub use traits::{AssetInfo, ReleaseInfo, ReleaseSource};
