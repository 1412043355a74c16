//! Turning a downloaded release asset into package files.
//!
//! An asset that already is a package of the requested format passes
//! through untouched. Anything else is treated as a binary (possibly inside
//! an archive), staged into a filesystem tree and handed to the format's
//! [`PackagingBackend`].
//!
//! Every format gets its own freshly staged tree so that format-specific
//! metadata (`DEBIAN/`) never leaks into another package.

pub mod backend;
pub mod control;
pub mod staging;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use r2r_schema::{AssetKind, PackageArtifact, PackageFormat};
use thiserror::Error;

use crate::config::TargetSpec;
use crate::fetch::{ResolvedRelease, UNKNOWN_LICENSE};
use crate::io::{ExtractError, extract, locate_binary};
use crate::tool::ToolError;

pub use backend::{DpkgDeb, PackagingBackend, RpmBuild};
pub use control::{PackageMetadata, render_control, render_rpm_spec};
pub use staging::{StagedFile, StagedTree, stage};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Binary '{binary}' not found in {asset}")]
    BinaryNotFound { binary: String, asset: String },

    #[error("Build failed: {0}")]
    BuildFailure(#[from] ToolError),

    #[error("Packaging tool reported success but {} was not written", .0.display())]
    MissingOutput(PathBuf),

    #[error("A {actual} backend was wired into the {slot} slot")]
    BackendMismatch {
        slot: PackageFormat,
        actual: PackageFormat,
    },
}

/// Inputs for building one target.
#[derive(Debug)]
pub struct BuildRequest<'a> {
    pub spec: &'a TargetSpec,
    pub resolved: &'a ResolvedRelease,
    /// The downloaded asset.
    pub asset_path: &'a Path,
    pub license: &'a str,
    /// Private scratch directory for this target.
    pub scratch: &'a Path,
}

/// Builds packages through one backend per format.
#[derive(Clone)]
pub struct PackageBuilder {
    deb: Arc<dyn PackagingBackend>,
    rpm: Arc<dyn PackagingBackend>,
}

impl std::fmt::Debug for PackageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageBuilder").finish_non_exhaustive()
    }
}

impl PackageBuilder {
    /// `dpkg-deb` and `rpmbuild`, each bounded by `timeout`.
    pub fn system(timeout: Duration) -> Self {
        Self {
            deb: Arc::new(DpkgDeb { timeout }),
            rpm: Arc::new(RpmBuild { timeout }),
        }
    }

    /// Use custom backends, checking each produces the format of its slot.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::BackendMismatch`] when `deb` does not build
    /// `.deb` files or `rpm` does not build `.rpm` files.
    pub fn with_backends(
        deb: Arc<dyn PackagingBackend>,
        rpm: Arc<dyn PackagingBackend>,
    ) -> Result<Self, BuildError> {
        for (slot, backend) in [(PackageFormat::Deb, &deb), (PackageFormat::Rpm, &rpm)] {
            let actual = backend.format();
            if actual != slot {
                return Err(BuildError::BackendMismatch { slot, actual });
            }
        }
        Ok(Self { deb, rpm })
    }

    fn backend(&self, format: PackageFormat) -> &dyn PackagingBackend {
        match format {
            PackageFormat::Deb => self.deb.as_ref(),
            PackageFormat::Rpm => self.rpm.as_ref(),
        }
    }

    /// The file name the artifact for `format` will have.
    ///
    /// Known before anything is downloaded, which is what makes
    /// skip-if-exists possible. `None` means the asset is a native package
    /// of the other format and `format` cannot be produced from it.
    pub fn artifact_name(
        &self,
        spec: &TargetSpec,
        resolved: &ResolvedRelease,
        format: PackageFormat,
    ) -> Option<String> {
        match AssetKind::from_filename(&resolved.asset.name).native_format() {
            Some(native) if native == format => Some(resolved.asset.name.clone()),
            Some(_) => None,
            None => {
                let meta = PackageMetadata::new(spec, &resolved.version, UNKNOWN_LICENSE);
                Some(self.backend(format).file_name(&meta))
            }
        }
    }

    /// Produce one artifact per format in `formats`, under `scratch/out`.
    ///
    /// Archives are extracted once and shared between formats.
    ///
    /// # Errors
    ///
    /// Returns the first extraction, staging or backend failure.
    pub fn build(
        &self,
        req: &BuildRequest<'_>,
        formats: &[PackageFormat],
    ) -> Result<Vec<PackageArtifact>, BuildError> {
        let out_dir = req.scratch.join("out");
        fs::create_dir_all(&out_dir)?;

        let kind = AssetKind::from_filename(&req.resolved.asset.name);
        let mut binary: Option<PathBuf> = None;
        let mut artifacts = Vec::with_capacity(formats.len());

        for &format in formats {
            let artifact = if kind.native_format() == Some(format) {
                self.pass_through(req, format, &out_dir)?
            } else {
                let binary_name = req.spec.target_binary.as_deref().ok_or_else(|| {
                    BuildError::BinaryNotFound {
                        binary: String::new(),
                        asset: req.resolved.asset.name.clone(),
                    }
                })?;
                let located = match &binary {
                    Some(path) => path.clone(),
                    None => {
                        let path = self.locate(req, kind, binary_name)?;
                        binary = Some(path.clone());
                        path
                    }
                };
                self.build_format(req, format, &located, binary_name, &out_dir)?
            };
            tracing::info!(
                target_id = %req.spec.id,
                format = %format,
                file = %artifact.file_name,
                "Built package"
            );
            artifacts.push(artifact);
        }

        Ok(artifacts)
    }

    fn locate(&self, req: &BuildRequest<'_>, kind: AssetKind, binary_name: &str) -> Result<PathBuf, BuildError> {
        if !kind.is_archive() {
            return Ok(req.asset_path.to_path_buf());
        }

        let root = req.scratch.join("extract");
        fs::create_dir_all(&root)?;
        let files = extract(req.asset_path, kind, &root)?;
        tracing::debug!(asset = %req.resolved.asset.name, files = files.len(), "Extracted archive");

        locate_binary(&root, binary_name, req.spec.file_pattern.as_ref()).ok_or_else(|| {
            BuildError::BinaryNotFound {
                binary: binary_name.to_string(),
                asset: req.resolved.asset.name.clone(),
            }
        })
    }

    fn build_format(
        &self,
        req: &BuildRequest<'_>,
        format: PackageFormat,
        binary: &Path,
        binary_name: &str,
        out_dir: &Path,
    ) -> Result<PackageArtifact, BuildError> {
        let backend = self.backend(format);
        let meta = PackageMetadata::new(req.spec, &req.resolved.version, req.license);
        let file_name = backend.file_name(&meta);

        let tree = stage(&req.scratch.join(format!("stage-{format}")), binary, binary_name, req.spec)?;
        let work_dir = req.scratch.join(format!("work-{format}"));
        fs::create_dir_all(&work_dir)?;

        let output = out_dir.join(&file_name);
        backend.build(&tree, &meta, &work_dir, &output)?;

        Ok(self.artifact(req, format, file_name, output))
    }

    fn pass_through(
        &self,
        req: &BuildRequest<'_>,
        format: PackageFormat,
        out_dir: &Path,
    ) -> Result<PackageArtifact, BuildError> {
        let file_name = req.resolved.asset.name.clone();
        let output = out_dir.join(&file_name);
        if fs::rename(req.asset_path, &output).is_err() {
            fs::copy(req.asset_path, &output)?;
        }
        tracing::debug!(target_id = %req.spec.id, file = %file_name, "Using pre-built package");
        Ok(self.artifact(req, format, file_name, output))
    }

    fn artifact(
        &self,
        req: &BuildRequest<'_>,
        format: PackageFormat,
        file_name: String,
        path: PathBuf,
    ) -> PackageArtifact {
        let arch = match format {
            PackageFormat::Deb => req.spec.architecture.debian(),
            PackageFormat::Rpm => req.spec.architecture.redhat(),
        };
        PackageArtifact {
            target: req.spec.id.clone(),
            format,
            file_name,
            path,
            version: req.resolved.version.clone(),
            arch: arch.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use r2r_schema::ReleaseAsset;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes the staged file list as the "package" and remembers each tree.
    struct RecordingBackend {
        format: PackageFormat,
        trees: Mutex<Vec<StagedTree>>,
    }

    impl RecordingBackend {
        fn new(format: PackageFormat) -> Arc<Self> {
            Arc::new(Self {
                format,
                trees: Mutex::new(Vec::new()),
            })
        }
    }

    impl PackagingBackend for RecordingBackend {
        fn format(&self) -> PackageFormat {
            self.format
        }

        fn file_name(&self, meta: &PackageMetadata) -> String {
            match self.format {
                PackageFormat::Deb => meta.deb_file_name(),
                PackageFormat::Rpm => meta.rpm_file_name(),
            }
        }

        fn build(
            &self,
            tree: &StagedTree,
            _meta: &PackageMetadata,
            _work_dir: &Path,
            output: &Path,
        ) -> Result<(), BuildError> {
            assert!(!tree.root.join("DEBIAN").exists());
            let listing: Vec<String> = tree.files.iter().map(|f| f.path.display().to_string()).collect();
            fs::write(output, listing.join("\n"))?;
            self.trees.lock().unwrap().push(tree.clone());
            Ok(())
        }
    }

    fn spec(extra: &str) -> TargetSpec {
        let text = format!(
            r#"{{"path": "/x", "repos": [{{"owner": "o", "repo": "Tool"{extra}}}]}}"#
        );
        Config::parse(&text).unwrap().targets.remove(0)
    }

    fn resolved(name: &str) -> ResolvedRelease {
        ResolvedRelease {
            asset: ReleaseAsset {
                name: name.to_string(),
                download_url: format!("https://dl/{name}"),
                tag: "v1.0.0".to_string(),
                published_at: None,
            },
            version: "1.0.0".to_string(),
        }
    }

    fn tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_backends_must_match_their_slots() {
        let err = PackageBuilder::with_backends(
            RecordingBackend::new(PackageFormat::Rpm),
            RecordingBackend::new(PackageFormat::Rpm),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BuildError::BackendMismatch {
                slot: PackageFormat::Deb,
                actual: PackageFormat::Rpm
            }
        ));
    }

    #[test]
    fn test_artifact_names() {
        let builder = PackageBuilder::with_backends(
            RecordingBackend::new(PackageFormat::Deb),
            RecordingBackend::new(PackageFormat::Rpm),
        )
        .unwrap();
        let s = spec(r#", "target_binary": "tool""#);

        let r = resolved("tool-linux-amd64.tar.gz");
        assert_eq!(
            builder.artifact_name(&s, &r, PackageFormat::Deb).as_deref(),
            Some("tool_1.0.0_amd64.deb")
        );
        assert_eq!(
            builder.artifact_name(&s, &r, PackageFormat::Rpm).as_deref(),
            Some("tool-1.0.0-1.x86_64.rpm")
        );

        let r = resolved("tool_1.0.0_amd64.deb");
        assert_eq!(
            builder.artifact_name(&s, &r, PackageFormat::Deb).as_deref(),
            Some("tool_1.0.0_amd64.deb")
        );
        assert_eq!(builder.artifact_name(&s, &r, PackageFormat::Rpm), None);
    }

    #[test]
    fn test_build_from_archive_stages_each_format_separately() {
        let tmp = TempDir::new().unwrap();
        let asset = tmp.path().join("tool-linux-amd64.tar.gz");
        tar_gz(&asset, &[("tool-1.0/README", b"readme"), ("tool-1.0/tool", b"\x7fELF")]);

        let deb = RecordingBackend::new(PackageFormat::Deb);
        let rpm = RecordingBackend::new(PackageFormat::Rpm);
        let builder = PackageBuilder::with_backends(deb.clone(), rpm.clone()).unwrap();

        let s = spec(r#", "target_binary": "tool""#);
        let r = resolved("tool-linux-amd64.tar.gz");
        let scratch = tmp.path().join("scratch");
        let req = BuildRequest {
            spec: &s,
            resolved: &r,
            asset_path: &asset,
            license: "MIT",
            scratch: &scratch,
        };

        let artifacts = builder.build(&req, &[PackageFormat::Deb, PackageFormat::Rpm]).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].file_name, "tool_1.0.0_amd64.deb");
        assert_eq!(artifacts[0].arch, "amd64");
        assert_eq!(artifacts[1].file_name, "tool-1.0.0-1.x86_64.rpm");
        assert_eq!(artifacts[1].arch, "x86_64");
        assert_eq!(
            fs::read_to_string(&artifacts[0].path).unwrap(),
            "usr/local/bin/tool"
        );

        let deb_root = deb.trees.lock().unwrap()[0].root.clone();
        let rpm_root = rpm.trees.lock().unwrap()[0].root.clone();
        assert_ne!(deb_root, rpm_root);
        assert_eq!(fs::read(deb_root.join("usr/local/bin/tool")).unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_binary_missing_from_archive() {
        let tmp = TempDir::new().unwrap();
        let asset = tmp.path().join("tool.tar.gz");
        tar_gz(&asset, &[("other", b"x")]);

        let builder = PackageBuilder::with_backends(
            RecordingBackend::new(PackageFormat::Deb),
            RecordingBackend::new(PackageFormat::Rpm),
        )
        .unwrap();
        let s = spec(r#", "target_binary": "tool""#);
        let r = resolved("tool.tar.gz");
        let scratch = tmp.path().join("scratch");
        let req = BuildRequest {
            spec: &s,
            resolved: &r,
            asset_path: &asset,
            license: "MIT",
            scratch: &scratch,
        };

        let err = builder.build(&req, &[PackageFormat::Deb]).unwrap_err();
        assert!(matches!(err, BuildError::BinaryNotFound { ref binary, .. } if binary == "tool"));
    }

    #[test]
    fn test_native_package_passes_through() {
        let tmp = TempDir::new().unwrap();
        let asset = tmp.path().join("tool_1.0.0_amd64.deb");
        fs::write(&asset, b"!<arch>\n").unwrap();

        let deb = RecordingBackend::new(PackageFormat::Deb);
        let builder =
            PackageBuilder::with_backends(deb.clone(), RecordingBackend::new(PackageFormat::Rpm)).unwrap();
        let s = spec(r#", "object_regex": "tool_.*_amd64\\.deb""#);
        let r = resolved("tool_1.0.0_amd64.deb");
        let scratch = tmp.path().join("scratch");
        let req = BuildRequest {
            spec: &s,
            resolved: &r,
            asset_path: &asset,
            license: "MIT",
            scratch: &scratch,
        };

        let artifacts = builder.build(&req, &[PackageFormat::Deb]).unwrap();
        assert_eq!(artifacts[0].file_name, "tool_1.0.0_amd64.deb");
        assert_eq!(fs::read(&artifacts[0].path).unwrap(), b"!<arch>\n");
        assert!(deb.trees.lock().unwrap().is_empty());
    }
}
