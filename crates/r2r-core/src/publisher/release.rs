//! The `Release` document of a suite.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use r2r_schema::HashAlgorithm;

use crate::config::ReleaseFields;
use crate::indexer::SuiteIndex;

/// `Description` used when the configuration sets none.
pub const DEFAULT_DESCRIPTION: &str = "A repo-to-repo built collection of packages";

/// `Date` format, e.g. `Mon, 02 Jan 2006 15:04:05 +0000`.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Render `Release` for `index`, dated `now`.
pub fn render_release(fields: &ReleaseFields, index: &SuiteIndex, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    if let Some(origin) = fields.origin.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "Origin: {origin}");
    }
    if let Some(label) = fields.label.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "Label: {label}");
    }
    let _ = writeln!(out, "Suite: {}", index.suite);
    let _ = writeln!(out, "Codename: {}", index.suite);
    let _ = writeln!(out, "Architectures: {}", join(&index.architectures));
    let _ = writeln!(out, "Components: {}", join(&index.components));
    let _ = writeln!(
        out,
        "Description: {}",
        fields
            .description
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION)
    );
    let _ = writeln!(out, "Date: {}", now.format(DATE_FORMAT));

    for alg in HashAlgorithm::ALL {
        let _ = writeln!(out, "{}:", alg.release_field());
        for file in &index.files {
            let _ = writeln!(
                out,
                " {} {:>16} {}",
                file.digests.get(alg),
                file.digests.size,
                file.path
            );
        }
    }
    out
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{IndexedFile, Representation};
    use chrono::TimeZone;
    use r2r_schema::Digests;
    use std::collections::BTreeSet;

    fn index() -> SuiteIndex {
        SuiteIndex {
            suite: "utils".to_string(),
            architectures: BTreeSet::from(["arm64".to_string(), "amd64".to_string()]),
            components: BTreeSet::from(["main".to_string()]),
            files: vec![IndexedFile {
                path: "main/binary-amd64/Packages".to_string(),
                representation: Representation::Plain,
                digests: Digests::compute(b"Package: tool\n"),
            }],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
    }

    #[test]
    fn test_release_header() {
        let text = render_release(&ReleaseFields::default(), &index(), now());
        let head: Vec<&str> = text.lines().take(6).collect();
        assert_eq!(
            head,
            vec![
                "Suite: utils",
                "Codename: utils",
                "Architectures: amd64 arm64",
                "Components: main",
                "Description: A repo-to-repo built collection of packages",
                "Date: Mon, 02 Jan 2006 15:04:05 +0000",
            ]
        );
    }

    #[test]
    fn test_optional_fields() {
        let fields = ReleaseFields {
            origin: Some("example".to_string()),
            label: Some("Example".to_string()),
            description: Some("Tools".to_string()),
        };
        let text = render_release(&fields, &index(), now());
        assert!(text.starts_with("Origin: example\nLabel: Example\nSuite: utils\n"));
        assert!(text.contains("\nDescription: Tools\n"));
    }

    #[test]
    fn test_hash_sections() {
        let text = render_release(&ReleaseFields::default(), &index(), now());
        let digests = Digests::compute(b"Package: tool\n");
        let sha256_line = format!(
            " {} {:>16} main/binary-amd64/Packages",
            digests.sha256, 14
        );
        assert!(text.contains(&format!("SHA256:\n{sha256_line}\n")));

        let sections: Vec<&str> = text.lines().filter(|l| l.ends_with(':')).collect();
        assert_eq!(sections, vec!["MD5Sum:", "SHA1:", "SHA256:", "SHA512:"]);
    }
}
