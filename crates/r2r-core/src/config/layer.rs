//! Typed access to one tier of the configuration cascade.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::ConfigError;

/// The raw JSON object for one tier (global, repository or target).
///
/// `null` values are treated as absent so that a tier can explicitly fall
/// back to the one below it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer(Map<String, Value>);

impl Layer {
    /// Wrap an already-parsed JSON object.
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Wrap a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] when `value` is not an object.
    pub fn from_value(value: Value, what: &str) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ConfigError::Malformed(format!(
                "{what} must be an object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Whether the tier sets `field` to something other than `null`.
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Raw access, with `null` mapped to `None`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    /// Read a string field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RepoTargetInvalidValue`] when the field holds
    /// another JSON type.
    pub fn string(&self, field: &str, target: &str) -> Result<Option<String>, ConfigError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(invalid(target, field, "a string", other)),
        }
    }

    /// Read a boolean field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RepoTargetInvalidValue`] when the field holds
    /// another JSON type.
    pub fn bool(&self, field: &str, target: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(invalid(target, field, "a boolean", other)),
        }
    }

    /// Read a list of strings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RepoTargetInvalidValue`] when the field is not
    /// a list or any element is not a string.
    pub fn string_list(&self, field: &str, target: &str) -> Result<Option<Vec<String>>, ConfigError> {
        let Some(value) = self.get(field) else {
            return Ok(None);
        };
        let Value::Array(items) = value else {
            return Err(invalid(target, field, "a list", value));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(invalid(target, field, "a list of strings", other)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Read an object whose values are all strings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RepoTargetInvalidValue`] when the field is not
    /// an object or any value is not a string.
    pub fn string_map(
        &self,
        field: &str,
        target: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ConfigError> {
        let Some(value) = self.get(field) else {
            return Ok(None);
        };
        let Value::Object(map) = value else {
            return Err(invalid(target, field, "an object", value));
        };
        let mut out = BTreeMap::new();
        for (key, item) in map {
            match item {
                Value::String(s) => {
                    out.insert(key.clone(), s.clone());
                }
                other => return Err(invalid(target, field, "an object of strings", other)),
            }
        }
        Ok(Some(out))
    }
}

fn invalid(target: &str, field: &str, expected: &str, got: &Value) -> ConfigError {
    ConfigError::RepoTargetInvalidValue {
        target: target.to_string(),
        message: format!("{field} must be {expected}, got {}", json_type(got)),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(v: Value) -> Layer {
        Layer::from_value(v, "test").unwrap()
    }

    #[test]
    fn test_null_is_absent() {
        let l = layer(json!({"suite": null}));
        assert!(!l.has("suite"));
        assert_eq!(l.string("suite", "t").unwrap(), None);
    }

    #[test]
    fn test_wrong_type_is_invalid_value() {
        let l = layer(json!({"suite": 5, "formats": "deb", "autocomplete": {"bash": 1}}));
        assert!(matches!(
            l.string("suite", "t"),
            Err(ConfigError::RepoTargetInvalidValue { .. })
        ));
        assert!(matches!(
            l.string_list("formats", "t"),
            Err(ConfigError::RepoTargetInvalidValue { .. })
        ));
        assert!(matches!(
            l.string_map("autocomplete", "t"),
            Err(ConfigError::RepoTargetInvalidValue { .. })
        ));
    }

    #[test]
    fn test_non_object_layer_rejected() {
        assert!(Layer::from_value(json!([1, 2]), "repos[0]").is_err());
    }
}
