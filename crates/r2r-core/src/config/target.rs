//! The validated, immutable description of one package to produce.

use std::collections::BTreeMap;

use regex::Regex;
use r2r_schema::{Architecture, PackageFormat, Priority, TargetId};

/// Where releases are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    /// github.com or a GitHub Enterprise API.
    #[default]
    GitHub,
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            _ => Err(format!("platform ('{s}') is not supported, only 'github' is")),
        }
    }
}

/// A regular expression that must match an entire file name.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    /// Compile `source`, anchored at both ends.
    ///
    /// # Errors
    ///
    /// Returns the regex compilation error.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(&format!("^(?:{source})$"))?,
        })
    }

    /// Whether `name` matches in full.
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Which release to package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionMatch {
    /// Whatever the platform reports as the latest release.
    Latest,
    /// The newest listed release whose tag starts with this prefix.
    Prefix(String),
}

impl VersionMatch {
    /// Interpret the configured `version_match` string.
    pub fn from_config(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Prefix(value.to_string())
        }
    }
}

/// Everything needed to fetch, build and file one package.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    /// Stable identifier joining this spec to its build result.
    pub id: TargetId,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Release hosting platform.
    pub platform: Platform,
    /// Selects the release asset (full match).
    pub asset_pattern: NamePattern,
    /// Locates the binary inside an archive, in addition to an exact name match.
    pub file_pattern: Option<NamePattern>,
    /// Installed binary name; `None` when the asset is already a package.
    pub target_binary: Option<String>,
    /// Target architecture.
    pub architecture: Architecture,
    /// Formats to produce, in configuration order without duplicates.
    pub formats: Vec<PackageFormat>,
    /// Which release to package.
    pub version_match: VersionMatch,
    /// Completion scripts keyed by shell.
    pub autocomplete: BTreeMap<String, String>,
    /// Debian suite, also used as the package section.
    pub suite: String,
    /// Debian archive area.
    pub archive: String,
    /// Debian priority.
    pub priority: Priority,
    /// Maintainer line.
    pub maintainer: String,
    /// One-line description.
    pub description: String,
    /// Project homepage.
    pub homepage: String,
    /// Debian `Depends` value.
    pub debian_dependencies: String,
    /// RPM `Requires` value.
    pub redhat_dependencies: String,
    /// Install into `sbin`.
    pub root_only: bool,
}

impl TargetSpec {
    /// `owner/repo`, for logs.
    pub fn label(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Package name used in control files and artifact names.
    ///
    /// Debian requires lowercase package names.
    pub fn package_name(&self) -> String {
        self.repo.to_ascii_lowercase()
    }

    /// The bash completion script, if one is configured.
    pub fn bash_completion(&self) -> Option<&str> {
        self.autocomplete.get("bash").map(String::as_str)
    }

    /// Whether `format` is among the requested formats.
    pub fn wants(&self, format: PackageFormat) -> bool {
        self.formats.contains(&format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_pattern_is_anchored() {
        let p = NamePattern::new(r"tool-.*-amd64\.tar\.gz").unwrap();
        assert!(p.is_match("tool-1.2-amd64.tar.gz"));
        assert!(!p.is_match("tool-1.2-amd64.tar.gz.sha256"));
        assert!(!p.is_match("my-tool-1.2-amd64.tar.gz"));
    }

    #[test]
    fn test_version_match_from_config() {
        assert_eq!(VersionMatch::from_config(""), VersionMatch::Latest);
        assert_eq!(VersionMatch::from_config("latest"), VersionMatch::Latest);
        assert_eq!(
            VersionMatch::from_config("v2"),
            VersionMatch::Prefix("v2".to_string())
        );
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("GitHub".parse::<Platform>(), Ok(Platform::GitHub));
        assert!("gitlab".parse::<Platform>().is_err());
    }
}
