//! Packaging backends turning a staged tree into a package file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use r2r_schema::PackageFormat;

use super::BuildError;
use super::control::{PackageMetadata, render_control, render_rpm_spec};
use super::staging::{StagedTree, make_dir};
use crate::tool::Tool;

/// Produces one package format from a staged tree.
pub trait PackagingBackend: Send + Sync {
    /// Format this backend produces.
    fn format(&self) -> PackageFormat;

    /// Deterministic output file name for `meta`.
    fn file_name(&self, meta: &PackageMetadata) -> String;

    /// Build `tree` into the package file `output`.
    ///
    /// `work_dir` is private scratch space owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::BuildFailure`] when the packaging tool fails
    /// and [`BuildError::MissingOutput`] when it succeeds without producing
    /// `output`.
    fn build(
        &self,
        tree: &StagedTree,
        meta: &PackageMetadata,
        work_dir: &Path,
        output: &Path,
    ) -> Result<(), BuildError>;
}

/// `dpkg-deb --root-owner-group --build`.
#[derive(Debug, Clone)]
pub struct DpkgDeb {
    pub timeout: Duration,
}

impl PackagingBackend for DpkgDeb {
    fn format(&self) -> PackageFormat {
        PackageFormat::Deb
    }

    fn file_name(&self, meta: &PackageMetadata) -> String {
        meta.deb_file_name()
    }

    fn build(
        &self,
        tree: &StagedTree,
        meta: &PackageMetadata,
        _work_dir: &Path,
        output: &Path,
    ) -> Result<(), BuildError> {
        let debian = tree.root.join("DEBIAN");
        make_dir(&debian)?;
        fs::write(debian.join("control"), render_control(meta))?;

        Tool::new("dpkg-deb", self.timeout)
            .args(["--root-owner-group", "--build"])
            .args([tree.root.as_os_str(), output.as_os_str()])
            .run()?;

        ensure_output(output)
    }
}

/// `rpmbuild -bb` against a generated spec with a private `_topdir`.
#[derive(Debug, Clone)]
pub struct RpmBuild {
    pub timeout: Duration,
}

impl PackagingBackend for RpmBuild {
    fn format(&self) -> PackageFormat {
        PackageFormat::Rpm
    }

    fn file_name(&self, meta: &PackageMetadata) -> String {
        meta.rpm_file_name()
    }

    fn build(
        &self,
        tree: &StagedTree,
        meta: &PackageMetadata,
        work_dir: &Path,
        output: &Path,
    ) -> Result<(), BuildError> {
        let topdir = work_dir.join("rpmbuild");
        for sub in ["BUILD", "BUILDROOT", "SPECS", "SRPMS", "SOURCES"] {
            fs::create_dir_all(topdir.join(sub))?;
        }
        let spec_path = topdir.join("SPECS").join(format!("{}.spec", meta.name));
        fs::write(&spec_path, render_rpm_spec(meta, tree))?;

        let out_dir = output.parent().unwrap_or(work_dir);
        let out_name = output
            .file_name()
            .map_or_else(|| meta.rpm_file_name(), |n| n.to_string_lossy().into_owned());

        Tool::new("rpmbuild", self.timeout)
            .args(["-bb", "--target", meta.redhat_arch.as_str()])
            .args(["--define".to_string(), format!("_topdir {}", topdir.display())])
            .args(["--define".to_string(), format!("_rpmdir {}", out_dir.display())])
            .args(["--define".to_string(), format!("_rpmfilename {out_name}")])
            .args([spec_path.as_os_str()])
            .run()?;

        ensure_output(output)
    }
}

fn ensure_output(output: &Path) -> Result<(), BuildError> {
    if output.is_file() {
        Ok(())
    } else {
        Err(BuildError::MissingOutput(output.to_path_buf()))
    }
}
