//! Architecture identifiers and their per-format spellings.
//!
//! Debian and RedHat tooling disagree on how to name the same machine
//! (`amd64` vs `x86_64`, `arm64` vs `aarch64`, `all` vs `noarch`). A target
//! is configured with whichever spelling its author prefers and the
//! [`Architecture`] carries both derived names from then on.

use serde::{Deserialize, Serialize};

/// Accepted spellings, followed by the Debian and RedHat names they map to.
const ARCH_TABLE: &[(&[&str], &str, &str)] = &[
    (&["all", "noarch", "any"], "all", "noarch"),
    (&["amd64", "x86-64", "x86_64"], "amd64", "x86_64"),
    (&["arm64", "aarch64"], "arm64", "aarch64"),
];

/// A configured architecture together with its Debian and RedHat names.
///
/// # Example
///
/// ```
/// use r2r_schema::Architecture;
///
/// let arch = Architecture::parse("x86-64");
/// assert_eq!(arch.debian(), "amd64");
/// assert_eq!(arch.redhat(), "x86_64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Architecture {
    raw: String,
    debian: String,
    redhat: String,
    known: bool,
}

impl Architecture {
    /// Map a configured spelling onto both packaging vocabularies.
    ///
    /// Unmapped values are kept verbatim for both formats; callers decide
    /// whether that deserves a warning via [`is_known`](Self::is_known).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let lowered = raw.to_ascii_lowercase();

        for (names, debian, redhat) in ARCH_TABLE {
            if names.contains(&lowered.as_str()) {
                return Self {
                    raw: raw.to_string(),
                    debian: (*debian).to_string(),
                    redhat: (*redhat).to_string(),
                    known: true,
                };
            }
        }

        Self {
            raw: raw.to_string(),
            debian: raw.to_string(),
            redhat: raw.to_string(),
            known: false,
        }
    }

    /// The spelling as it appeared in configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Name used in `.deb` control files and `binary-<arch>` directories.
    pub fn debian(&self) -> &str {
        &self.debian
    }

    /// Name passed to `rpmbuild --target` and used in `.rpm` file names.
    pub fn redhat(&self) -> &str {
        &self.redhat
    }

    /// Whether the spelling appears in the mapping table.
    pub fn is_known(&self) -> bool {
        self.known
    }

    /// Every spelling the mapping table recognises, in table order.
    pub fn known_names() -> impl Iterator<Item = &'static str> {
        ARCH_TABLE.iter().flat_map(|(names, _, _)| names.iter().copied())
    }
}

impl Default for Architecture {
    fn default() -> Self {
        Self::parse("amd64")
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("architecture must not be empty".to_string());
        }
        Ok(Self::parse(s))
    }
}
