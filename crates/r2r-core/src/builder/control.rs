//! Package metadata files: Debian `control` and RPM `.spec`.

use std::fmt::Write as _;
use std::path::Path;

use crate::config::TargetSpec;

use super::staging::StagedTree;

/// Everything a backend writes into package metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    /// Version exactly as derived from the tag; backends sanitise it.
    pub version: String,
    pub debian_arch: String,
    pub redhat_arch: String,
    pub section: String,
    pub priority: String,
    pub maintainer: String,
    pub description: String,
    pub homepage: String,
    pub depends: String,
    pub requires: String,
    pub license: String,
}

impl PackageMetadata {
    pub fn new(spec: &TargetSpec, version: &str, license: &str) -> Self {
        Self {
            name: spec.package_name(),
            version: version.to_string(),
            debian_arch: spec.architecture.debian().to_string(),
            redhat_arch: spec.architecture.redhat().to_string(),
            section: spec.suite.clone(),
            priority: spec.priority.to_string(),
            maintainer: spec.maintainer.clone(),
            description: spec.description.clone(),
            homepage: spec.homepage.clone(),
            depends: spec.debian_dependencies.clone(),
            requires: spec.redhat_dependencies.clone(),
            license: license.to_string(),
        }
    }

    /// Version restricted to the characters Debian allows.
    pub fn debian_version(&self) -> String {
        sanitize(&self.version, |c| c.is_ascii_alphanumeric() || ".+~-".contains(c), '+')
    }

    /// Version restricted to the characters RPM allows (no hyphens).
    pub fn rpm_version(&self) -> String {
        sanitize(&self.version, |c| c.is_ascii_alphanumeric() || "._+~^".contains(c), '_')
    }

    /// `<name>_<version>_<arch>.deb`
    pub fn deb_file_name(&self) -> String {
        format!("{}_{}_{}.deb", self.name, self.debian_version(), self.debian_arch)
    }

    /// `<name>-<version>-1.<arch>.rpm`
    pub fn rpm_file_name(&self) -> String {
        format!("{}-{}-1.{}.rpm", self.name, self.rpm_version(), self.redhat_arch)
    }
}

fn sanitize(value: &str, allowed: impl Fn(char) -> bool, replacement: char) -> String {
    value
        .chars()
        .map(|c| if allowed(c) { c } else { replacement })
        .collect()
}

/// Render `DEBIAN/control`.
///
/// Multi-line descriptions are folded into continuation lines.
pub fn render_control(meta: &PackageMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Package: {}", meta.name);
    let _ = writeln!(out, "Version: {}", meta.debian_version());
    let _ = writeln!(out, "Section: {}", meta.section);
    let _ = writeln!(out, "Priority: {}", meta.priority);
    let _ = writeln!(out, "Architecture: {}", meta.debian_arch);
    if !meta.depends.trim().is_empty() {
        let _ = writeln!(out, "Depends: {}", meta.depends.trim());
    }
    let _ = writeln!(out, "Maintainer: {}", meta.maintainer);

    let mut lines = meta.description.trim().lines();
    let _ = writeln!(out, "Description: {}", lines.next().unwrap_or_default());
    for line in lines {
        if line.trim().is_empty() {
            out.push_str(" .\n");
        } else {
            let _ = writeln!(out, " {line}");
        }
    }

    if !meta.homepage.is_empty() {
        let _ = writeln!(out, "Homepage: {}", meta.homepage);
    }
    out
}

/// Render an RPM spec that installs the staged tree verbatim.
pub fn render_rpm_spec(meta: &PackageMetadata, tree: &StagedTree) -> String {
    let summary = meta.description.lines().next().unwrap_or_default();
    let mut out = String::new();

    out.push_str("%global debug_package %{nil}\n");
    out.push_str("%global __os_install_post %{nil}\n\n");
    let _ = writeln!(out, "Name: {}", meta.name);
    let _ = writeln!(out, "Version: {}", meta.rpm_version());
    out.push_str("Release: 1\n");
    let _ = writeln!(out, "Summary: {summary}");
    let _ = writeln!(out, "License: {}", meta.license);
    if !meta.homepage.is_empty() {
        let _ = writeln!(out, "URL: {}", meta.homepage);
    }
    if !meta.requires.trim().is_empty() {
        let _ = writeln!(out, "Requires: {}", meta.requires.trim());
    }
    let _ = writeln!(out, "BuildArch: {}", meta.redhat_arch);
    out.push_str("AutoReqProv: no\n\n");

    let _ = writeln!(out, "%description\n{}\n", meta.description.trim());

    out.push_str("%install\n");
    out.push_str("mkdir -p %{buildroot}\n");
    let _ = writeln!(out, "cp -a {}/. %{{buildroot}}/\n", shell_quote(&tree.root));

    out.push_str("%files\n");
    for file in &tree.files {
        let _ = writeln!(
            out,
            "%attr({:04o},root,root) /{}",
            file.mode,
            file.path.display()
        );
    }
    out
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
