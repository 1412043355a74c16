//! Output package formats.

use serde::{Deserialize, Serialize};

/// A package format the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// Debian binary package (`.deb`), built with `dpkg-deb`.
    Deb,
    /// RPM binary package (`.rpm`), built with `rpmbuild`.
    Rpm,
}

impl PackageFormat {
    /// Every supported format, in the default build order.
    pub const ALL: [Self; 2] = [Self::Deb, Self::Rpm];

    /// Convert to the configuration spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deb => "deb",
            Self::Rpm => "rpm",
        }
    }

    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Deb => ".deb",
            Self::Rpm => ".rpm",
        }
    }
}

impl std::fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PackageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deb" => Ok(Self::Deb),
            "rpm" => Ok(Self::Rpm),
            _ => Err(format!("Unknown package format: {s}")),
        }
    }
}
