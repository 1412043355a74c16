//! Release asset classification by file name.
//!
//! Upstream projects ship anything from a bare executable to a zip of a
//! tarball's worth of files. The builder only needs to know whether an
//! asset is already a package, an archive to unpack, or the binary itself.

use serde::{Deserialize, Serialize};

use crate::PackageFormat;

/// What kind of file a release asset is, judged by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// Pre-built Debian package (`.deb`).
    Deb,
    /// Pre-built RPM package (`.rpm`).
    Rpm,
    /// Gzip-compressed tar archive (`.tar.gz`, `.tgz`, `.gz`).
    TarGz,
    /// Bzip2-compressed tar archive (`.tar.bz2`, `.tbz`, `.tbz2`, `.bz2`).
    TarBz2,
    /// XZ-compressed tar archive (`.tar.xz`, `.txz`, `.xz`).
    TarXz,
    /// Uncompressed tar archive (`.tar`).
    Tar,
    /// Zip archive (`.zip`).
    Zip,
    /// Standalone executable with no recognised extension.
    Binary,
}

impl AssetKind {
    /// Classify an asset by its file name.
    #[allow(clippy::case_sensitive_file_extension_comparisons)]
    pub fn from_filename(filename: &str) -> Self {
        let f = filename.to_ascii_lowercase();

        if f.ends_with(".deb") {
            Self::Deb
        } else if f.ends_with(".rpm") {
            Self::Rpm
        } else if f.ends_with(".tar.gz") || f.ends_with(".tgz") || f.ends_with(".gz") {
            Self::TarGz
        } else if f.ends_with(".tar.bz2")
            || f.ends_with(".tbz")
            || f.ends_with(".tbz2")
            || f.ends_with(".bz2")
        {
            Self::TarBz2
        } else if f.ends_with(".tar.xz") || f.ends_with(".txz") || f.ends_with(".xz") {
            Self::TarXz
        } else if f.ends_with(".tar") {
            Self::Tar
        } else if f.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Binary
        }
    }

    /// The package format this asset already is, if any.
    pub fn native_format(&self) -> Option<PackageFormat> {
        match self {
            Self::Deb => Some(PackageFormat::Deb),
            Self::Rpm => Some(PackageFormat::Rpm),
            _ => None,
        }
    }

    /// Whether the asset must be unpacked before the binary can be found.
    pub fn is_archive(&self) -> bool {
        matches!(
            self,
            Self::TarGz | Self::TarBz2 | Self::TarXz | Self::Tar | Self::Zip
        )
    }
}

/// The package format an asset pattern selects, if it names one outright.
///
/// Patterns are regular expressions, so both `tool_.*_amd64.deb` and
/// `tool_.*_amd64\.deb$` denote a pre-built `.deb`.
pub fn pattern_package_format(pattern: &str) -> Option<PackageFormat> {
    let trimmed = pattern.trim_end_matches('$').to_ascii_lowercase();
    PackageFormat::ALL
        .into_iter()
        .find(|format| trimmed.ends_with(format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_filename() {
        assert_eq!(AssetKind::from_filename("tool_1.0_amd64.deb"), AssetKind::Deb);
        assert_eq!(AssetKind::from_filename("tool-1.0.x86_64.rpm"), AssetKind::Rpm);
        assert_eq!(AssetKind::from_filename("tool-linux.tar.gz"), AssetKind::TarGz);
        assert_eq!(AssetKind::from_filename("tool-linux.TGZ"), AssetKind::TarGz);
        assert_eq!(AssetKind::from_filename("tool.tar.bz2"), AssetKind::TarBz2);
        assert_eq!(AssetKind::from_filename("tool.txz"), AssetKind::TarXz);
        assert_eq!(AssetKind::from_filename("tool.tar"), AssetKind::Tar);
        assert_eq!(AssetKind::from_filename("tool-windows.zip"), AssetKind::Zip);
        assert_eq!(AssetKind::from_filename("tool-linux-amd64"), AssetKind::Binary);
    }

    #[test]
    fn test_native_and_archive() {
        assert_eq!(AssetKind::Deb.native_format(), Some(PackageFormat::Deb));
        assert_eq!(AssetKind::Zip.native_format(), None);
        assert!(AssetKind::TarXz.is_archive());
        assert!(!AssetKind::Binary.is_archive());
        assert!(!AssetKind::Rpm.is_archive());
    }

    #[test]
    fn test_pattern_package_format() {
        assert_eq!(pattern_package_format(r"tool_.*_amd64\.deb$"), Some(PackageFormat::Deb));
        assert_eq!(pattern_package_format("tool-.*.x86_64.rpm"), Some(PackageFormat::Rpm));
        assert_eq!(pattern_package_format("tool-linux-amd64"), None);
        assert_eq!(pattern_package_format(r"tool-.*\.tar\.gz"), None);
    }
}
