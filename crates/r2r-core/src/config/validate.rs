//! Turning an [`EffectiveTarget`] into a [`TargetSpec`].
//!
//! Hard errors stop the whole configuration from loading. Policy warnings
//! are returned alongside the [`TargetSpec`] so the caller decides whether to print
//! them (quiet mode does not).

use r2r_schema::asset::pattern_package_format;
use r2r_schema::policy::{
    ARCHIVES_URL, COMPLETION_SHELLS, SECTIONS_URL, is_policy_archive, is_policy_section,
};
use r2r_schema::{Architecture, PackageFormat, Priority, TargetId};

use super::ConfigError;
use super::merge::EffectiveTarget;
use super::target::{NamePattern, Platform, TargetSpec, VersionMatch};

const PULL_REQUESTS: &str = "[Pull requests, welcome!](https://github.com/repo-to-repo/repo-to-repo)";

/// A non-fatal deviation from Debian policy or from what the builder
/// knows how to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyWarning {
    /// `owner/repo` of the offending target.
    pub target: String,
    /// The warning text.
    pub message: String,
}

impl std::fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.target, self.message)
    }
}

fn missing(target: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::RepoTargetMissingValue {
        target: target.to_string(),
        message: message.into(),
    }
}

fn invalid(target: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::RepoTargetInvalidValue {
        target: target.to_string(),
        message: message.into(),
    }
}

fn required(value: Option<String>, field: &str, target: &str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(target, format!("{field} is a required value.")))
}

/// Validate a merged target and derive its defaults.
///
/// # Errors
///
/// Returns [`ConfigError::RepoTargetMissingValue`] when a required field is
/// empty and [`ConfigError::RepoTargetInvalidValue`] when a value can never
/// work (bad regex, unknown format, priority outside policy).
pub fn validate(
    id: TargetId,
    eff: EffectiveTarget,
) -> Result<(TargetSpec, Vec<PolicyWarning>), ConfigError> {
    let label = match (&eff.owner, &eff.repo) {
        (Some(o), Some(r)) => format!("{o}/{r}"),
        _ => id.to_string(),
    };
    let mut warnings = Vec::new();
    let mut warn = |message: String| {
        warnings.push(PolicyWarning {
            target: label.clone(),
            message,
        });
    };

    let object_regex = required(eff.object_regex, "object_regex", &label)?;
    let asset_pattern = NamePattern::new(&object_regex)
        .map_err(|e| invalid(&label, format!("object_regex is not a valid regular expression: {e}")))?;

    if eff.formats.is_empty() {
        return Err(missing(&label, "formats is a required value."));
    }
    let mut formats = Vec::new();
    let mut unknown = Vec::new();
    for raw in &eff.formats {
        match raw.parse::<PackageFormat>() {
            Ok(f) if !formats.contains(&f) => formats.push(f),
            Ok(_) => {}
            Err(_) => unknown.push(raw.clone()),
        }
    }
    if !unknown.is_empty() {
        return Err(invalid(
            &label,
            format!(
                "formats should only (currently) be one of 'deb' or 'rpm', got {unknown:?}. {PULL_REQUESTS}"
            ),
        ));
    }

    let architecture_raw = required(Some(eff.architecture), "architecture", &label)?;
    let architecture = Architecture::parse(&architecture_raw);
    if !architecture.is_known() {
        warn(format!(
            "architecture ('{architecture_raw}') is not, but should be, one of ('noarch' == 'all' == 'any'), ('x86-64' == 'amd64'), or ('arm64' == 'aarch64') due to architecture mapping. {PULL_REQUESTS}"
        ));
    }

    let owner = required(eff.owner, "owner", &label)?;
    let repo = required(eff.repo, "repo", &label)?;

    let platform = eff
        .platform
        .parse::<Platform>()
        .map_err(|e| invalid(&label, e))?;

    let prebuilt = pattern_package_format(&object_regex).is_some();
    let target_binary = if prebuilt {
        None
    } else {
        let binary = required(eff.target_binary, "target_binary", &label)?;
        let unhandled: Vec<&str> = eff
            .autocomplete
            .keys()
            .map(String::as_str)
            .filter(|shell| !COMPLETION_SHELLS.contains(shell))
            .collect();
        if !unhandled.is_empty() {
            warn(format!(
                "You have specified shells in autocomplete which are not currently handled ({unhandled:?}). These won't be actioned. {PULL_REQUESTS}"
            ));
        }
        Some(binary)
    };

    let file_pattern = eff
        .file_regex
        .as_deref()
        .map(NamePattern::new)
        .transpose()
        .map_err(|e| invalid(&label, format!("file_regex is not a valid regular expression: {e}")))?;

    let mut priority = Priority::default();
    if formats.contains(&PackageFormat::Deb) {
        if eff.archive.is_empty() {
            return Err(missing(&label, "archive is a required value for debian format packages."));
        }
        if !is_policy_archive(&eff.archive) {
            warn(format!(
                "Archive ('{}') is not, but should be, one of the valid archives from the list in the [Debian Policy]({ARCHIVES_URL}). Ensure you're comfortable with this before publishing.",
                eff.archive
            ));
        }

        if eff.suite.is_empty() {
            return Err(missing(&label, "suite is a required value for debian format packages."));
        }
        if !is_policy_section(&eff.suite) {
            warn(format!(
                "suite ('{}') is not, but should be, one of the valid suites from the list in the [Debian Policy]({SECTIONS_URL}). Ensure you're comfortable with this before publishing.",
                eff.suite
            ));
        }

        if eff.priority.is_empty() {
            return Err(missing(&label, "priority is a required value for debian format packages."));
        }
        priority = eff.priority.parse().map_err(|e: String| invalid(&label, e))?;
    }

    let homepage = if eff.homepage.is_empty() {
        format!("https://github.com/{owner}/{repo}")
    } else {
        eff.homepage
    };
    let maintainer = if eff.maintainer.is_empty() {
        format!("{owner} <{owner}@users.noreply.github.com>")
    } else {
        eff.maintainer
    };
    let description = if eff.description.is_empty() {
        format!("A repo-to-repo package of a release at https://github.com/{owner}/{repo}")
    } else {
        eff.description
    };

    tracing::debug!(
        target_id = %id,
        object_regex = %object_regex,
        architecture = %architecture,
        suite = %eff.suite,
        archive = %eff.archive,
        "Validated target"
    );

    let spec = TargetSpec {
        id,
        owner,
        repo,
        platform,
        asset_pattern,
        file_pattern,
        target_binary,
        architecture,
        formats,
        version_match: VersionMatch::from_config(&eff.version_match),
        autocomplete: eff.autocomplete,
        suite: eff.suite,
        archive: eff.archive,
        priority,
        maintainer,
        description,
        homepage,
        debian_dependencies: eff.debian_dependencies,
        redhat_dependencies: eff.redhat_dependencies,
        root_only: eff.root_only,
    };

    Ok((spec, warnings))
}
