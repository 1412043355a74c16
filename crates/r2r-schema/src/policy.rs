//! Debian policy whitelists.
//!
//! Archives and sections outside these lists are legal to publish but
//! unusual enough to warn about. Priorities are closed: `dpkg` rejects
//! anything else.

use serde::{Deserialize, Serialize};

/// Archive areas from the Debian Policy Manual, chapter 2.
pub const ARCHIVES: &[&str] = &["main", "contrib", "non-free"];

/// Link cited when an archive falls outside [`ARCHIVES`].
pub const ARCHIVES_URL: &str =
    "https://www.debian.org/doc/debian-policy/ch-archive.html#archive-areas";

/// Sections from the Debian Policy Manual, section 2.4.
///
/// The pipeline uses the configured suite as both the distribution name and
/// the package `Section`, so suites are checked against this list.
pub const SECTIONS: &[&str] = &[
    "admin",
    "cli-mono",
    "comm",
    "database",
    "debug",
    "devel",
    "doc",
    "editors",
    "education",
    "electronics",
    "embedded",
    "fonts",
    "games",
    "gnome",
    "gnu-r",
    "gnustep",
    "graphics",
    "hamradio",
    "haskell",
    "httpd",
    "interpreters",
    "introspection",
    "java",
    "javascript",
    "kde",
    "kernel",
    "libdevel",
    "libs",
    "lisp",
    "localization",
    "mail",
    "math",
    "metapackages",
    "misc",
    "net",
    "news",
    "ocaml",
    "oldlibs",
    "otherosfs",
    "perl",
    "php",
    "python",
    "ruby",
    "rust",
    "science",
    "shells",
    "sound",
    "tasks",
    "tex",
    "text",
    "utils",
    "vcs",
    "video",
    "web",
    "x11",
    "xfce",
    "zope",
];

/// Link cited when a suite falls outside [`SECTIONS`].
pub const SECTIONS_URL: &str =
    "https://www.debian.org/doc/debian-policy/ch-archive.html#s-subsections";

/// Link cited when a priority is rejected.
pub const PRIORITIES_URL: &str =
    "https://www.debian.org/doc/debian-policy/ch-archive.html#s-priorities";

/// Shells whose completion scripts the package layout knows where to put.
pub const COMPLETION_SHELLS: &[&str] = &["bash"];

/// Whether `archive` is one of the policy archive areas.
pub fn is_policy_archive(archive: &str) -> bool {
    ARCHIVES.contains(&archive)
}

/// Whether `section` is one of the policy sections.
pub fn is_policy_section(section: &str) -> bool {
    SECTIONS.contains(&section)
}

/// Package priority as defined by Debian policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Essential to the proper functioning of the system.
    Required,
    /// Expected on any Unix-like system.
    Important,
    /// A reasonably small but not too limited character-mode system.
    Standard,
    /// The default for most packages.
    #[default]
    Optional,
    /// Deprecated alias of `optional`, still accepted by `dpkg`.
    Extra,
}

impl Priority {
    /// Every valid priority, in policy order.
    pub const ALL: [Self; 5] = [
        Self::Required,
        Self::Important,
        Self::Standard,
        Self::Optional,
        Self::Extra,
    ];

    /// Convert to the control-file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Important => "important",
            Self::Standard => "standard",
            Self::Optional => "optional",
            Self::Extra => "extra",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "priority ('{s}') is not, but must be, one of the valid priority values from the list in the [Debian Policy]({PRIORITIES_URL})."
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_whitelist() {
        for p in ["required", "important", "standard", "optional", "extra"] {
            assert_eq!(p.parse::<Priority>().unwrap().as_str(), p);
        }
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert!(err.starts_with("priority ('urgent') is not, but must be"));
    }

    #[test]
    fn test_archive_and_section_lists() {
        assert!(is_policy_archive("contrib"));
        assert!(!is_policy_archive("blob"));
        assert!(is_policy_section("utils"));
        assert!(is_policy_section("rust"));
        assert!(!is_policy_section("stable"));
    }
}
