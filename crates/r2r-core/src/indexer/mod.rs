//! Generating APT `Packages` indices.
//!
//! Each (suite, archive, architecture) bucket gets its own
//! `binary-<arch>/Packages` in four representations. The digests of every
//! file written are collected per suite so the publisher can list them in
//! `Release` without reading anything back.

pub mod compress;
pub mod scanner;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use r2r_schema::Digests;
use thiserror::Error;

use crate::layout::RepoLayout;
use crate::tool::ToolError;

pub use compress::Representation;
pub use scanner::{DpkgScanPackages, Scanner};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Package scan failed: {0}")]
    Scan(#[source] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An index file written under `dists/<suite>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    /// Path relative to `dists/<suite>/`, e.g. `main/binary-amd64/Packages.gz`.
    pub path: String,
    pub representation: Representation,
    pub digests: Digests,
}

/// Everything the `Release` document of one suite lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteIndex {
    pub suite: String,
    pub architectures: BTreeSet<String>,
    pub components: BTreeSet<String>,
    /// In bucket order (archive, then architecture), then representation order.
    pub files: Vec<IndexedFile>,
}

/// Writes `Packages` indices using a [`Scanner`].
#[derive(Clone)]
pub struct ArchiveIndexer {
    scanner: Arc<dyn Scanner>,
}

impl std::fmt::Debug for ArchiveIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveIndexer").finish_non_exhaustive()
    }
}

impl ArchiveIndexer {
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        Self { scanner }
    }

    /// Index every bucket of `suite`.
    ///
    /// `buckets` maps archive to the architectures with at least one
    /// artifact in it. Existing index files are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Scan`] if the scanner fails and
    /// [`IndexError::Io`] if an index file cannot be written.
    pub fn index_suite(
        &self,
        layout: &RepoLayout,
        suite: &str,
        buckets: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<SuiteIndex, IndexError> {
        let deb_root = layout.deb_root();
        let dists = layout.dists_dir(suite);
        let mut index = SuiteIndex {
            suite: suite.to_string(),
            ..SuiteIndex::default()
        };

        for (archive, arches) in buckets {
            index.components.insert(archive.clone());
            let pool_rel = RepoLayout::pool_rel(suite, archive);

            for arch in arches {
                index.architectures.insert(arch.clone());
                let content = self.scanner.scan(&deb_root, &pool_rel, arch)?;
                if content.trim().is_empty() {
                    tracing::warn!(suite, archive = %archive, arch = %arch, "Scan found no packages");
                }

                let binary_rel = RepoLayout::binary_rel(archive, arch);
                index
                    .files
                    .extend(write_packages(&dists, &binary_rel, content.as_bytes())?);
                tracing::info!(suite, archive = %archive, arch = %arch, "Wrote Packages index");
            }
        }

        Ok(index)
    }
}

/// Write `Packages` in every representation under `dists/<binary_rel>`.
///
/// # Errors
///
/// Returns any I/O error from encoding or writing.
pub fn write_packages(dists: &Path, binary_rel: &Path, content: &[u8]) -> Result<Vec<IndexedFile>, IndexError> {
    let dir = dists.join(binary_rel);
    fs::create_dir_all(&dir)?;

    let mut files = Vec::with_capacity(Representation::ALL.len());
    for rep in Representation::ALL {
        let bytes = rep.encode(content)?;
        let name = format!("Packages{}", rep.suffix());
        fs::write(dir.join(&name), &bytes)?;

        let rel = binary_rel.join(&name);
        files.push(IndexedFile {
            path: rel.to_string_lossy().replace('\\', "/"),
            representation: rep,
            digests: Digests::compute(&bytes),
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeScanner {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Scanner for FakeScanner {
        fn scan(&self, repo_root: &Path, pool_rel: &Path, arch: &str) -> Result<String, IndexError> {
            assert!(repo_root.ends_with("deb"));
            self.calls
                .lock()
                .unwrap()
                .push((pool_rel.display().to_string(), arch.to_string()));
            Ok(format!(
                "Package: tool\nArchitecture: {arch}\nFilename: {}/tool_1_{arch}.deb\n\n",
                pool_rel.display()
            ))
        }
    }

    #[test]
    fn test_index_suite_buckets() {
        let tmp = TempDir::new().unwrap();
        let layout = RepoLayout::new(tmp.path());
        let scanner = Arc::new(FakeScanner {
            calls: Mutex::new(Vec::new()),
        });
        let indexer = ArchiveIndexer::new(scanner.clone());

        let mut buckets = BTreeMap::new();
        buckets.insert(
            "main".to_string(),
            BTreeSet::from(["arm64".to_string(), "amd64".to_string()]),
        );
        let index = indexer.index_suite(&layout, "utils", &buckets).unwrap();

        assert_eq!(
            index.architectures.iter().collect::<Vec<_>>(),
            vec!["amd64", "arm64"]
        );
        assert_eq!(index.components.iter().collect::<Vec<_>>(), vec!["main"]);
        assert_eq!(index.files.len(), 8);
        assert_eq!(index.files[0].path, "main/binary-amd64/Packages");
        assert_eq!(index.files[1].path, "main/binary-amd64/Packages.gz");
        assert_eq!(index.files[4].path, "main/binary-arm64/Packages");

        assert_eq!(
            *scanner.calls.lock().unwrap(),
            vec![
                ("pool/utils/main".to_string(), "amd64".to_string()),
                ("pool/utils/main".to_string(), "arm64".to_string()),
            ]
        );
    }

    #[test]
    fn test_recorded_digests_match_written_files() {
        let tmp = TempDir::new().unwrap();
        let dists = tmp.path().join("dists/utils");
        let files = write_packages(&dists, Path::new("main/binary-amd64"), b"Package: tool\n\n").unwrap();

        for file in &files {
            let written = fs::read(dists.join(&file.path)).unwrap();
            assert_eq!(Digests::compute(&written), file.digests, "{}", file.path);
        }
    }

    #[test]
    fn test_overwrites_previous_index() {
        let tmp = TempDir::new().unwrap();
        let dists = tmp.path().join("dists/utils");
        write_packages(&dists, Path::new("main/binary-amd64"), b"old contents that are longer\n").unwrap();
        write_packages(&dists, Path::new("main/binary-amd64"), b"new\n").unwrap();
        assert_eq!(
            fs::read(dists.join("main/binary-amd64/Packages")).unwrap(),
            b"new\n"
        );
    }
}
