//! Run-time knobs that do not come from the configuration file.

use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::forges::GITHUB_API;
use crate::layout::{LATEST, OutputLocation};

/// Default `--timestamp` format.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Timestamp format '{format}' is invalid: {reason}")]
    InvalidTimestamp { format: String, reason: String },
}

/// How the output base directory is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Publish in place, directly under the base directory.
    Clean,
    /// Publish into `<base>/<stamp>` and point `latest` at it.
    Timestamped { format: String },
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::Timestamped {
            format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl OutputMode {
    /// Where this run writes, given the base directory and start time.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidTimestamp`] if the format has an
    /// unknown specifier or renders to something that is not a plain
    /// directory name.
    pub fn location(&self, base: &std::path::Path, now: DateTime<Utc>) -> Result<OutputLocation, SettingsError> {
        let format = match self {
            Self::Clean => return Ok(OutputLocation::clean(base)),
            Self::Timestamped { format } => format,
        };
        let invalid = |reason: &str| SettingsError::InvalidTimestamp {
            format: format.clone(),
            reason: reason.to_string(),
        };

        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|i| matches!(i, Item::Error)) {
            return Err(invalid("unknown specifier"));
        }
        let stamp = now.format_with_items(items.into_iter()).to_string();

        if stamp.is_empty() || stamp == "." || stamp == ".." || stamp == LATEST {
            return Err(invalid("renders to a reserved name"));
        }
        if stamp.contains('/') || stamp.contains('\\') {
            return Err(invalid("renders to a path, not a directory name"));
        }
        Ok(OutputLocation::timestamped(base, stamp))
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output_mode: OutputMode,
    /// Targets fetched and built concurrently.
    pub workers: usize,
    /// Abort before indexing on the first target failure.
    pub fail_fast: bool,
    pub api_base: String,
    pub github_token: Option<String>,
    pub connect_timeout: Duration,
    pub api_timeout: Duration,
    pub download_timeout: Duration,
    /// Applies to every external tool invocation.
    pub tool_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::default(),
            workers: num_cpus::get(),
            fail_fast: false,
            api_base: GITHUB_API.to_string(),
            github_token: None,
            connect_timeout: Duration::from_secs(10),
            api_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(600),
            tool_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::{Path, PathBuf};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_default_stamp() {
        let location = OutputMode::default().location(Path::new("/srv"), now()).unwrap();
        assert_eq!(location.tree_root(), PathBuf::from("/srv/20240501100000"));
    }

    #[test]
    fn test_clean_location() {
        let location = OutputMode::Clean.location(Path::new("/srv"), now()).unwrap();
        assert_eq!(location.stamp, None);
    }

    #[test]
    fn test_rejects_bad_formats() {
        for format in ["%Y/%m", "latest", "%Q"] {
            let mode = OutputMode::Timestamped {
                format: format.to_string(),
            };
            assert!(mode.location(Path::new("/srv"), now()).is_err(), "{format}");
        }
    }
}
