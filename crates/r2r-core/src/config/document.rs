//! Reading the configuration file.
//!
//! The file is JSON with one extension: anything after `//` on a line is a
//! comment, unless the `//` sits inside a string literal.

use std::collections::BTreeMap;

use serde_json::Value;

use super::layer::{Layer, json_type};
use super::ConfigError;

/// The parsed configuration file, before any target is resolved.
#[derive(Debug, Clone, Default)]
pub struct ConfigDocument {
    /// Output base directory.
    pub path: Option<String>,
    /// Extra HTTP headers sent with every API request.
    pub headers: BTreeMap<String, String>,
    /// `Origin` field of generated `Release` files.
    pub origin: Option<String>,
    /// `Label` field of generated `Release` files.
    pub label: Option<String>,
    /// `Description` field of generated `Release` files.
    pub release_description: Option<String>,
    /// Top-level defaults applied to every target.
    pub global: Layer,
    /// Repository entries in file order.
    pub repos: Vec<RepoEntry>,
}

/// One element of the `repos` list.
#[derive(Debug, Clone, Default)]
pub struct RepoEntry {
    /// Repository-level values.
    pub layer: Layer,
    /// Per-target overrides; a single empty layer when `targets` is absent.
    pub targets: Vec<Layer>,
}

/// Remove `//` comments from every line, leaving string literals intact.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(strip_line(line));
        out.push('\n');
    }
    out
}

fn strip_line(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            return &line[..i];
        }
    }
    line
}

/// Parse the text of a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Json`] for malformed JSON, [`ConfigError::Malformed`]
/// when top-level keys have the wrong shape, and
/// [`ConfigError::NoRepositories`] when `repos` is missing or empty.
pub fn parse_document(text: &str) -> Result<ConfigDocument, ConfigError> {
    let mut root = match serde_json::from_str::<Value>(&strip_comments(text))? {
        Value::Object(map) => map,
        other => {
            return Err(ConfigError::Malformed(format!(
                "the configuration must be an object, got {}",
                json_type(&other)
            )));
        }
    };

    let repos = match root.remove("repos") {
        None | Some(Value::Null) => return Err(ConfigError::NoRepositories),
        Some(Value::Array(items)) if items.is_empty() => return Err(ConfigError::NoRepositories),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ConfigError::Malformed(format!(
                "repos must be a list, got {}",
                json_type(&other)
            )));
        }
    };

    let global = Layer::new(root);
    let path = top_level_string(&global, "path")?;
    let origin = top_level_string(&global, "origin")?;
    let label = top_level_string(&global, "label")?;
    let release_description = top_level_string(&global, "release_description")?;
    let headers = global
        .string_map("headers", "configuration")
        .map_err(|_| ConfigError::Malformed("headers must be an object of strings".to_string()))?
        .unwrap_or_default();

    let mut entries = Vec::with_capacity(repos.len());
    for (i, repo) in repos.into_iter().enumerate() {
        let mut map = match repo {
            Value::Object(map) => map,
            other => {
                return Err(ConfigError::Malformed(format!(
                    "repos[{i}] must be an object, got {}",
                    json_type(&other)
                )));
            }
        };
        let targets = match map.remove("targets") {
            None | Some(Value::Null) => vec![Layer::default()],
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(j, t)| Layer::from_value(t, &format!("repos[{i}].targets[{j}]")))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(ConfigError::Malformed(format!(
                    "repos[{i}].targets must be a list, got {}",
                    json_type(&other)
                )));
            }
        };
        entries.push(RepoEntry {
            layer: Layer::new(map),
            targets,
        });
    }

    Ok(ConfigDocument {
        path,
        headers,
        origin,
        label,
        release_description,
        global,
        repos: entries,
    })
}

fn top_level_string(global: &Layer, field: &str) -> Result<Option<String>, ConfigError> {
    global
        .string(field, "configuration")
        .map_err(|_| ConfigError::Malformed(format!("{field} must be a string")))
}
