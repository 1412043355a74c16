//! Loading and validating the target configuration.
//!
//! The configuration file describes the repository to publish and every
//! package to put in it. Loading happens in three steps:
//!
//! 1. [`document`]: strip comments, parse JSON, split into tiers.
//! 2. [`merge`]: cascade target over repository over global defaults.
//! 3. [`validate`]: check required fields and policy, derive defaults.
//!
//! Any hard error fails the whole load; there is no partial configuration.

pub mod document;
pub mod layer;
pub mod merge;
pub mod target;
pub mod validate;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use r2r_schema::TargetId;
use thiserror::Error;

pub use document::{ConfigDocument, RepoEntry, parse_document, strip_comments};
pub use layer::Layer;
pub use merge::{EffectiveTarget, merge};
pub use target::{NamePattern, Platform, TargetSpec, VersionMatch};
pub use validate::{PolicyWarning, validate};

/// Why a configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be opened or read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not JSON once comments are stripped.
    #[error("Config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON of the wrong shape, such as `repos` not being a list.
    #[error("Malformed config file: {0}")]
    Malformed(String),

    /// `repos` is missing or empty.
    #[error("No repositories defined in the config file")]
    NoRepositories,

    /// Neither the file nor the command line names an output directory.
    #[error("No target path defined. Set `path` in the config file or pass --output-path")]
    NoTargetPathDefined,

    /// A required target field is absent or empty.
    #[error("{target}: {message}")]
    RepoTargetMissingValue { target: String, message: String },

    /// A target field has a value that can never work.
    #[error("{target}: {message}")]
    RepoTargetInvalidValue { target: String, message: String },
}

/// Fields copied verbatim into every generated `Release` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseFields {
    /// `Origin:` line, omitted when unset.
    pub origin: Option<String>,
    /// `Label:` line, omitted when unset.
    pub label: Option<String>,
    /// `Description:` line; a stock description is used when unset.
    pub description: Option<String>,
}

/// A fully validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Output base directory from the file, if set.
    pub path: Option<PathBuf>,
    /// Extra HTTP headers for API requests.
    pub headers: BTreeMap<String, String>,
    /// Top-level fields for `Release` documents.
    pub release: ReleaseFields,
    /// One spec per package to produce, in file order.
    pub targets: Vec<TargetSpec>,
    /// Policy warnings gathered while validating, in file order.
    pub warnings: Vec<PolicyWarning>,
}

impl Config {
    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or any
    /// error [`Config::parse`] returns.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns the first parse, merge or validation error encountered.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let doc = parse_document(text)?;

        let mut targets = Vec::new();
        let mut warnings = Vec::new();
        for entry in &doc.repos {
            for (index, target) in entry.targets.iter().enumerate() {
                let eff = merge(&doc.global, &entry.layer, target)?;
                let id = TargetId::new(
                    eff.owner.as_deref().unwrap_or_default(),
                    eff.repo.as_deref().unwrap_or_default(),
                    index,
                );
                let (spec, mut found) = validate(id, eff)?;
                targets.push(spec);
                warnings.append(&mut found);
            }
        }

        if targets.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        Ok(Self {
            path: doc.path.filter(|p| !p.is_empty()).map(PathBuf::from),
            headers: doc.headers,
            release: ReleaseFields {
                origin: doc.origin,
                label: doc.label,
                description: doc.release_description,
            },
            targets,
            warnings,
        })
    }

    /// The output base directory, preferring a command-line override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoTargetPathDefined`] when neither is set.
    pub fn output_path(&self, overridden: Option<&Path>) -> Result<PathBuf, ConfigError> {
        overridden
            .map(Path::to_path_buf)
            .or_else(|| self.path.clone())
            .ok_or(ConfigError::NoTargetPathDefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        // Published to a static web root
        "path": "/srv/apt",
        "suite": "utils",
        "origin": "example",
        "repos": [
            {
                "owner": "BurntSushi",
                "repo": "ripgrep",
                "target_binary": "rg",
                "file_regex": "rg",
                "targets": [
                    {"object_regex": "ripgrep-.*-x86_64-unknown-linux-musl.tar.gz"},
                    {"object_regex": "ripgrep-.*-aarch64-unknown-linux-gnu.tar.gz", "architecture": "arm64"}
                ]
            },
            {
                "owner": "cli",
                "repo": "cli",
                "object_regex": "gh_.*_linux_amd64.deb", // already a package
                "formats": ["deb"]
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();

        assert_eq!(config.path, Some(PathBuf::from("/srv/apt")));
        assert_eq!(config.release.origin.as_deref(), Some("example"));
        assert_eq!(config.targets.len(), 3);
        assert!(config.warnings.is_empty());

        let rg_arm = &config.targets[1];
        assert_eq!(rg_arm.id.as_str(), "BurntSushi/ripgrep#1");
        assert_eq!(rg_arm.architecture.debian(), "arm64");
        assert_eq!(rg_arm.suite, "utils");
        assert_eq!(rg_arm.target_binary.as_deref(), Some("rg"));

        let gh = &config.targets[2];
        assert_eq!(gh.target_binary, None);
        assert_eq!(gh.id.as_str(), "cli/cli#0");
    }

    #[test]
    fn test_output_path_precedence() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(
            config.output_path(Some(Path::new("/tmp/out"))).unwrap(),
            PathBuf::from("/tmp/out")
        );
        assert_eq!(config.output_path(None).unwrap(), PathBuf::from("/srv/apt"));

        let no_path = Config::parse(r#"{"repos": [{"owner": "o", "repo": "r", "target_binary": "r"}]}"#)
            .unwrap();
        assert!(matches!(
            no_path.output_path(None),
            Err(ConfigError::NoTargetPathDefined)
        ));
    }

    #[test]
    fn test_one_bad_target_fails_the_load() {
        let text = r#"{"path": "/x", "repos": [
            {"owner": "o", "repo": "good", "target_binary": "good"},
            {"owner": "o", "repo": "bad", "target_binary": "bad", "priority": "urgent"}
        ]}"#;
        assert!(matches!(
            Config::parse(text),
            Err(ConfigError::RepoTargetInvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/r2r.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
