//! Producing `Packages` stanzas for a pool directory.

use std::path::Path;
use std::time::Duration;

use super::IndexError;
use crate::tool::Tool;

/// Lists the packages of one architecture under a pool directory.
pub trait Scanner: Send + Sync {
    /// Return the `Packages` text for `arch` under `pool_rel`.
    ///
    /// `pool_rel` is relative to `repo_root`, and so are the `Filename`
    /// fields in the returned text.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Scan`] when the scan fails.
    fn scan(&self, repo_root: &Path, pool_rel: &Path, arch: &str) -> Result<String, IndexError>;
}

/// `dpkg-scanpackages --arch <arch> <pool>`, run from the repository root.
#[derive(Debug, Clone)]
pub struct DpkgScanPackages {
    pub timeout: Duration,
}

impl Scanner for DpkgScanPackages {
    fn scan(&self, repo_root: &Path, pool_rel: &Path, arch: &str) -> Result<String, IndexError> {
        let output = Tool::new("dpkg-scanpackages", self.timeout)
            .args(["--arch", arch])
            .args([pool_rel.as_os_str()])
            .current_dir(repo_root)
            .run()
            .map_err(IndexError::Scan)?;
        tracing::debug!(pool = %pool_rel.display(), arch, stderr = %output.stderr.trim(), "Scanned pool");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
