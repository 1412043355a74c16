//! repo-to-repo command line
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads a JSON configuration naming GitHub repositories, builds `.deb` and
//! `.rpm` packages from their releases and publishes a signed APT
//! repository.
//!
//! # Output layout
//!
//! ```text
//! <path>/
//! ├── 20240501100000/
//! │   ├── deb/{pool,dists}
//! │   └── rpm/<arch>/
//! └── latest -> 20240501100000
//! ```

pub mod run;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use r2r_core::forges::GITHUB_API;
use r2r_core::settings::DEFAULT_TIMESTAMP_FORMAT;
use r2r_core::{OutputMode, RunSettings};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "repo-to-repo")]
#[command(author, version = env!("R2R_VERSION"), about = "Turn a GitHub release into a Linux repository")]
pub struct Cli {
    /// Path to the config file
    #[arg(long, short = 'f', visible_alias = "config-file")]
    pub config: PathBuf,

    /// Path to the PGP private key file. Overridden by `pgp_key_base64`
    /// (base64 of the armored key) or `pgp_key` (path) in the environment
    #[arg(long, env = "PGP_KEY_FILE")]
    pub pgp_key: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Hide warnings
    #[arg(long, short = 'q', conflicts_with = "debug")]
    pub quiet: bool,

    /// Override the config-defined output path
    #[arg(long, visible_alias = "output")]
    pub output_path: Option<PathBuf>,

    /// Publish under a strftime-formatted directory and point `latest` at it
    #[arg(
        long,
        short = 't',
        visible_alias = "timestamped-output",
        default_value = DEFAULT_TIMESTAMP_FORMAT,
        conflicts_with = "clean"
    )]
    pub timestamp: String,

    /// Publish directly under the output path, with no timestamped directory
    #[arg(long, short = 'c', visible_alias = "clean-output")]
    pub clean: bool,

    /// Validate the configuration and list the targets, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Targets fetched and built concurrently (default: CPU count)
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,

    /// Stop at the first failed target instead of publishing the rest
    #[arg(long)]
    pub fail_fast: bool,

    /// GitHub API root, for GitHub Enterprise
    #[arg(long, env = "GITHUB_API_URL", default_value = GITHUB_API)]
    pub api_url: String,

    /// Token sent as `Authorization: Bearer <token>`
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Seconds allowed for each API request
    #[arg(long, default_value_t = 30)]
    pub api_timeout: u64,

    /// Seconds allowed for each asset download
    #[arg(long, default_value_t = 600)]
    pub download_timeout: u64,

    /// Seconds allowed for each packaging, scanning or signing tool run
    #[arg(long, default_value_t = 300)]
    pub tool_timeout: u64,
}

impl Cli {
    pub fn settings(&self) -> RunSettings {
        let defaults = RunSettings::default();
        RunSettings {
            output_mode: if self.clean {
                OutputMode::Clean
            } else {
                OutputMode::Timestamped {
                    format: self.timestamp.clone(),
                }
            },
            workers: self.workers.unwrap_or(defaults.workers).max(1),
            fail_fast: self.fail_fast,
            api_base: self.api_url.clone(),
            github_token: self.github_token.clone(),
            api_timeout: Duration::from_secs(self.api_timeout),
            download_timeout: Duration::from_secs(self.download_timeout),
            tool_timeout: Duration::from_secs(self.tool_timeout),
            ..defaults
        }
    }

    /// Default log level when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the flags.
pub fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["repo-to-repo", "--config", "c.json"]).unwrap();
        let settings = cli.settings();
        assert_eq!(
            settings.output_mode,
            OutputMode::Timestamped {
                format: "%Y%m%d%H%M%S".to_string()
            }
        );
        assert!(!settings.fail_fast);
        assert!(settings.workers >= 1);
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_clean_conflicts_with_timestamp() {
        assert!(
            Cli::try_parse_from(["repo-to-repo", "--config", "c.json", "--clean", "--timestamp", "%Y"])
                .is_err()
        );

        let cli = Cli::try_parse_from(["repo-to-repo", "--config", "c.json", "-c"]).unwrap();
        assert_eq!(cli.settings().output_mode, OutputMode::Clean);
    }

    #[test]
    fn test_aliases_and_levels() {
        let cli = Cli::try_parse_from([
            "repo-to-repo",
            "--config-file",
            "c.json",
            "--output",
            "/srv/apt",
            "-d",
            "-j",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.output_path, Some(PathBuf::from("/srv/apt")));
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.settings().workers, 3);
    }
}
