//! Where things live in a published repository tree.
//!
//! ```text
//! <base>/<stamp>/deb/pool/<suite>/<archive>/<file>.deb
//! <base>/<stamp>/deb/dists/<suite>/<archive>/binary-<arch>/Packages[.gz|.bz2|.xz]
//! <base>/<stamp>/deb/dists/<suite>/{Release,Release.gpg,InRelease}
//! <base>/<stamp>/rpm/<arch>/<file>.rpm
//! <base>/latest -> <stamp>
//! ```
//!
//! In clean mode there is no `<stamp>` level and no `latest` link.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use r2r_schema::PackageFormat;

/// Name of the symlink pointing at the newest timestamped tree.
pub const LATEST: &str = "latest";

/// Lock file guarding the output base directory.
pub const LOCK_FILE: &str = ".repo-to-repo.lock";

/// The output base directory and, in timestamped mode, this run's stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    pub base: PathBuf,
    pub stamp: Option<String>,
}

impl OutputLocation {
    pub fn clean(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            stamp: None,
        }
    }

    pub fn timestamped(base: impl Into<PathBuf>, stamp: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            stamp: Some(stamp.into()),
        }
    }

    /// Root of the tree this run writes.
    pub fn tree_root(&self) -> PathBuf {
        match &self.stamp {
            Some(stamp) => self.base.join(stamp),
            None => self.base.clone(),
        }
    }

    pub fn layout(&self) -> RepoLayout {
        RepoLayout::new(self.tree_root())
    }

    /// The `latest` link path.
    pub fn latest(&self) -> PathBuf {
        self.base.join(LATEST)
    }

    /// Layout of the tree `latest` currently points at, if any.
    ///
    /// Always `None` in clean mode, where the current tree is the previous one.
    pub fn previous(&self) -> Option<RepoLayout> {
        self.stamp.as_ref()?;
        let latest = self.latest();
        latest
            .symlink_metadata()
            .ok()
            .filter(|m| m.file_type().is_symlink())
            .map(|_| RepoLayout::new(latest))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base.join(LOCK_FILE)
    }
}

/// Paths inside one repository tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    root: PathBuf,
}

impl RepoLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the APT repository (what `sources.list` points at).
    pub fn deb_root(&self) -> PathBuf {
        self.root.join("deb")
    }

    /// Pool directory relative to [`deb_root`](Self::deb_root).
    pub fn pool_rel(suite: &str, archive: &str) -> PathBuf {
        Path::new("pool").join(suite).join(archive)
    }

    pub fn dists_dir(&self, suite: &str) -> PathBuf {
        self.deb_root().join("dists").join(suite)
    }

    /// Archives and architectures that already have a `binary-<arch>` index
    /// under `suite`. Empty when the suite was never published.
    pub fn published_buckets(&self, suite: &str) -> io::Result<BTreeMap<String, BTreeSet<String>>> {
        let mut buckets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let dists = self.dists_dir(suite);
        if !dists.is_dir() {
            return Ok(buckets);
        }
        for archive in fs::read_dir(&dists)? {
            let archive = archive?;
            if !archive.file_type()?.is_dir() {
                continue;
            }
            for binary in fs::read_dir(archive.path())? {
                let binary = binary?;
                let name = binary.file_name().to_string_lossy().into_owned();
                let Some(arch) = name.strip_prefix("binary-") else {
                    continue;
                };
                if binary.file_type()?.is_dir() {
                    buckets
                        .entry(archive.file_name().to_string_lossy().into_owned())
                        .or_default()
                        .insert(arch.to_string());
                }
            }
        }
        Ok(buckets)
    }

    /// `binary-<arch>` path relative to the suite's dists directory.
    pub fn binary_rel(archive: &str, arch: &str) -> PathBuf {
        Path::new(archive).join(format!("binary-{arch}"))
    }

    /// Final location of an artifact, relative to the tree root.
    ///
    /// Debian packages are filed by suite and archive, RPMs by architecture.
    pub fn artifact_rel(
        format: PackageFormat,
        suite: &str,
        archive: &str,
        arch: &str,
        file_name: &str,
    ) -> PathBuf {
        match format {
            PackageFormat::Deb => Path::new("deb").join(Self::pool_rel(suite, archive)).join(file_name),
            PackageFormat::Rpm => Path::new("rpm").join(arch).join(file_name),
        }
    }

    pub fn artifact_path(
        &self,
        format: PackageFormat,
        suite: &str,
        archive: &str,
        arch: &str,
        file_name: &str,
    ) -> PathBuf {
        self.root
            .join(Self::artifact_rel(format, suite, archive, arch, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths() {
        let layout = OutputLocation::timestamped("/srv/apt", "20240101000000").layout();
        assert_eq!(
            layout.artifact_path(PackageFormat::Deb, "utils", "main", "amd64", "t_1_amd64.deb"),
            PathBuf::from("/srv/apt/20240101000000/deb/pool/utils/main/t_1_amd64.deb")
        );
        assert_eq!(
            layout.artifact_path(PackageFormat::Rpm, "utils", "main", "x86_64", "t-1-1.x86_64.rpm"),
            PathBuf::from("/srv/apt/20240101000000/rpm/x86_64/t-1-1.x86_64.rpm")
        );
        assert_eq!(
            layout.dists_dir("utils"),
            PathBuf::from("/srv/apt/20240101000000/deb/dists/utils")
        );
    }

    #[test]
    fn test_published_buckets_reads_binary_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = OutputLocation::clean(tmp.path()).layout();
        assert!(layout.published_buckets("utils").unwrap().is_empty());

        let dists = layout.dists_dir("utils");
        fs::create_dir_all(dists.join("main/binary-amd64")).unwrap();
        fs::create_dir_all(dists.join("main/binary-arm64")).unwrap();
        fs::create_dir_all(dists.join("contrib/binary-all")).unwrap();
        fs::write(dists.join("Release"), "").unwrap();

        let buckets = layout.published_buckets("utils").unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(
            buckets["main"].iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["amd64", "arm64"]
        );
        assert!(buckets["contrib"].contains("all"));
    }

    #[test]
    fn test_clean_mode_has_no_stamp_level() {
        let location = OutputLocation::clean("/srv/apt");
        assert_eq!(location.tree_root(), PathBuf::from("/srv/apt"));
        assert!(location.previous().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_previous_follows_latest_link() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("old")).unwrap();
        let location = OutputLocation::timestamped(tmp.path(), "new");
        assert!(location.previous().is_none());

        std::os::unix::fs::symlink("old", location.latest()).unwrap();
        assert_eq!(location.previous().unwrap().root(), location.latest());
    }
}
