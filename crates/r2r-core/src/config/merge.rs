//! The three-tier configuration cascade.
//!
//! A value set on a target beats the repository, which beats the global
//! defaults, which beat the built-in defaults. The result is still raw:
//! nothing has been checked against policy yet.

use std::collections::BTreeMap;

use r2r_schema::PackageFormat;

use super::ConfigError;
use super::layer::Layer;

/// Built-in defaults used when no tier sets a field.
pub mod defaults {
    /// Architecture when none is configured.
    pub const ARCHITECTURE: &str = "amd64";
    /// Debian priority when none is configured.
    pub const PRIORITY: &str = "optional";
    /// Suite (and package section) when none is configured.
    pub const SUITE: &str = "misc";
    /// Archive area when none is configured.
    pub const ARCHIVE: &str = "main";
    /// Release hosting platform when none is configured.
    pub const PLATFORM: &str = "github";
}

/// A target's fields after the cascade, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EffectiveTarget {
    /// Repository owner on the hosting platform.
    pub owner: Option<String>,
    /// Repository name on the hosting platform.
    pub repo: Option<String>,
    /// Hosting platform name.
    pub platform: String,
    /// Regular expression selecting the release asset.
    pub object_regex: Option<String>,
    /// Regular expression locating the binary inside an archive.
    pub file_regex: Option<String>,
    /// Name the binary is installed under.
    pub target_binary: Option<String>,
    /// Architecture as configured.
    pub architecture: String,
    /// Requested formats as configured.
    pub formats: Vec<String>,
    /// Tag prefix, or empty for the latest release.
    pub version_match: String,
    /// Completion scripts keyed by shell.
    pub autocomplete: BTreeMap<String, String>,
    /// Debian suite, also used as the package section.
    pub suite: String,
    /// Debian archive area.
    pub archive: String,
    /// Debian priority as configured.
    pub priority: String,
    /// Package maintainer; empty means derive from the owner.
    pub maintainer: String,
    /// Package description; empty means derive from the repository.
    pub description: String,
    /// Project homepage; empty means derive from the repository.
    pub homepage: String,
    /// Value of the Debian `Depends` field.
    pub debian_dependencies: String,
    /// Value of the RPM `Requires` field.
    pub redhat_dependencies: String,
    /// Install into `sbin` instead of `bin`.
    pub root_only: bool,
}

struct Cascade<'a> {
    tiers: [&'a Layer; 3],
    label: &'a str,
}

impl Cascade<'_> {
    fn top(&self, field: &str) -> Option<&Layer> {
        self.tiers.iter().copied().find(|tier| tier.has(field))
    }

    fn string(&self, field: &str) -> Result<Option<String>, ConfigError> {
        match self.top(field) {
            Some(tier) => tier.string(field, self.label),
            None => Ok(None),
        }
    }

    fn string_or(&self, field: &str, default: &str) -> Result<String, ConfigError> {
        Ok(self.string(field)?.unwrap_or_else(|| default.to_string()))
    }

    fn bool_or(&self, field: &str, default: bool) -> Result<bool, ConfigError> {
        match self.top(field) {
            Some(tier) => Ok(tier.bool(field, self.label)?.unwrap_or(default)),
            None => Ok(default),
        }
    }

    fn string_list(&self, field: &str) -> Result<Option<Vec<String>>, ConfigError> {
        match self.top(field) {
            Some(tier) => tier.string_list(field, self.label),
            None => Ok(None),
        }
    }

    fn string_map(&self, field: &str) -> Result<Option<BTreeMap<String, String>>, ConfigError> {
        match self.top(field) {
            Some(tier) => tier.string_map(field, self.label),
            None => Ok(None),
        }
    }
}

/// Human-readable name for a target in error messages.
pub(crate) fn target_label(repo: &Layer, target: &Layer) -> String {
    let pick = |field: &str| {
        target
            .get(field)
            .or_else(|| repo.get(field))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    match (pick("owner"), pick("repo")) {
        (Some(owner), Some(repo)) => format!("{owner}/{repo}"),
        (None, Some(repo)) => repo,
        (Some(owner), None) => format!("{owner}/?"),
        (None, None) => "<unnamed target>".to_string(),
    }
}

/// Resolve every field of a target through the cascade.
///
/// `object_regex` falls back to `target_binary` when no tier sets it, so a
/// repository that ships a bare executable named after itself needs only
/// `owner`, `repo` and `target_binary`.
///
/// # Errors
///
/// Returns [`ConfigError::RepoTargetInvalidValue`] when the winning tier
/// holds a value of the wrong JSON type.
pub fn merge(global: &Layer, repo: &Layer, target: &Layer) -> Result<EffectiveTarget, ConfigError> {
    let label = target_label(repo, target);
    let c = Cascade {
        tiers: [target, repo, global],
        label: &label,
    };

    let target_binary = c.string("target_binary")?;
    let object_regex = c.string("object_regex")?.or_else(|| target_binary.clone());
    let formats = c.string_list("formats")?.unwrap_or_else(|| {
        PackageFormat::ALL
            .iter()
            .map(|f| f.as_str().to_string())
            .collect()
    });

    Ok(EffectiveTarget {
        owner: c.string("owner")?,
        repo: c.string("repo")?,
        platform: c.string_or("platform", defaults::PLATFORM)?,
        object_regex,
        file_regex: c.string("file_regex")?.filter(|s| !s.is_empty()),
        target_binary,
        architecture: c.string_or("architecture", defaults::ARCHITECTURE)?,
        formats,
        version_match: c.string_or("version_match", "")?,
        autocomplete: c.string_map("autocomplete")?.unwrap_or_default(),
        suite: c.string_or("suite", defaults::SUITE)?,
        archive: c.string_or("archive", defaults::ARCHIVE)?,
        priority: c.string_or("priority", defaults::PRIORITY)?,
        maintainer: c.string_or("maintainer", "")?,
        description: c.string_or("description", "")?,
        homepage: c.string_or("homepage", "")?,
        debian_dependencies: c.string_or("debian_dependencies", "")?,
        redhat_dependencies: c.string_or("redhat_dependencies", "")?,
        root_only: c.bool_or("root_only", false)?,
    })
}
