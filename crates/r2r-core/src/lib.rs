pub mod builder;
pub mod config;
pub mod fetch;
pub mod forges;
pub mod indexer;
pub mod io;
pub mod layout;
pub mod pipeline;
pub mod publisher;
pub mod settings;
pub mod tool;

pub mod reporter;

pub use config::{Config, ConfigError, PolicyWarning, TargetSpec};
pub use layout::{OutputLocation, RepoLayout};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use settings::{OutputMode, RunSettings};

/// User Agent string for API and download requests
pub const USER_AGENT: &str = concat!("repo-to-repo/", env!("CARGO_PKG_VERSION"));
