//! The single command: load, check, build, publish

use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use r2r_core::publisher::{GpgSigner, SigningKey};
use r2r_core::{Config, Pipeline, RunSummary, TargetSpec, tool};
use r2r_schema::asset::pattern_package_format;
use r2r_schema::format::PackageFormat;

use crate::Cli;

/// Run the whole pipeline for `cli` and map the outcome to an exit code.
pub async fn run(cli: &Cli) -> Result<ExitCode> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    if !cli.quiet {
        for warning in &config.warnings {
            tracing::warn!("{warning}");
        }
    }

    let base = config.output_path(cli.output_path.as_deref())?;
    let settings = cli.settings();
    let location = settings.output_mode.location(&base, Utc::now())?;

    if cli.dry_run {
        print_plan(&config.targets);
        println!("Would publish to {}", location.tree_root().display());
        return Ok(ExitCode::SUCCESS);
    }

    let key = SigningKey::from_env(cli.pgp_key.as_deref())?;
    for program in required_tools(&config.targets) {
        tool::require(program).with_context(|| format!("{program} is required"))?;
    }
    let signer = GpgSigner::import(&key, settings.tool_timeout)
        .with_context(|| format!("Failed to import signing key from {}", key.source()))?;
    tracing::info!(fingerprint = signer.fingerprint(), "Signing key loaded");

    let pipeline = Pipeline::system(&config, &settings, Arc::new(signer))?;
    let summary = pipeline.run(&config.targets, &location).await?;

    print_summary(&summary);
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// External programs this configuration will invoke.
pub fn required_tools(targets: &[TargetSpec]) -> BTreeSet<&'static str> {
    let mut tools = BTreeSet::from(["gpg"]);
    for spec in targets {
        let native = pattern_package_format(spec.asset_pattern.as_str());
        if spec.wants(PackageFormat::Deb) {
            tools.insert("dpkg-scanpackages");
            if native != Some(PackageFormat::Deb) {
                tools.insert("dpkg-deb");
            }
        }
        if spec.wants(PackageFormat::Rpm) && native != Some(PackageFormat::Rpm) {
            tools.insert("rpmbuild");
        }
    }
    tools
}

fn print_plan(targets: &[TargetSpec]) {
    for spec in targets {
        let formats: Vec<&str> = spec.formats.iter().map(PackageFormat::as_str).collect();
        println!(
            "{:<24} {:<10} {:<10} {}",
            spec.label(),
            spec.architecture.debian(),
            spec.suite,
            formats.join(",")
        );
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Built {}, skipped {}, failed {}",
        summary.built.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    for artifact in &summary.artifacts {
        println!("  {}", artifact.path.display());
    }
    for (id, reason) in &summary.failed {
        eprintln!("  {id}: {reason}");
    }
    if !summary.latest_updated && !summary.is_success() {
        eprintln!("latest was left pointing at the previous run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(json: &str) -> Vec<TargetSpec> {
        Config::parse(json).unwrap().targets
    }

    #[test]
    fn test_required_tools_for_binary_targets() {
        let tools = required_tools(&targets(
            r#"{"path": "/srv", "repos": [{"owner": "o", "repo": "r", "target_binary": "r"}]}"#,
        ));
        assert_eq!(
            tools.into_iter().collect::<Vec<_>>(),
            vec!["dpkg-deb", "dpkg-scanpackages", "gpg", "rpmbuild"]
        );
    }

    #[test]
    fn test_required_tools_for_native_deb() {
        let tools = required_tools(&targets(
            r#"{"path": "/srv", "repos": [{"owner": "o", "repo": "r",
                "object_regex": "r_.*_amd64\\.deb", "formats": ["deb"]}]}"#,
        ));
        assert!(tools.contains("dpkg-scanpackages"));
        assert!(!tools.contains("dpkg-deb"));
        assert!(!tools.contains("rpmbuild"));
    }
}
