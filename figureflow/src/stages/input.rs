//! Stage input mapping.

use serde_json::{Map, Value};

/// The structured input handed to [`Stage::execute`](super::Stage::execute).
///
/// A thin wrapper over a JSON object with typed getters that fall back to
/// a default when a field is missing or has the wrong type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageInput {
    fields: Map<String, Value>,
}

impl StageInput {
    /// Creates an empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field or `default`.
    #[must_use]
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    /// Unsigned integer field or `default`.
    #[must_use]
    pub fn u32_or(&self, key: &str, default: u32) -> u32 {
        self.fields
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    }

    /// Boolean field or `default`.
    #[must_use]
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.fields.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Object field, or an empty object.
    #[must_use]
    pub fn object(&self, key: &str) -> Map<String, Value> {
        self.fields
            .get(key)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for StageInput {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let input = StageInput::new()
            .with("prompt", json!("loss curve"))
            .with("iteration", json!(2))
            .with("has_image", json!(true));

        assert_eq!(input.str_or("prompt", ""), "loss curve");
        assert_eq!(input.u32_or("iteration", 1), 2);
        assert!(input.bool_or("has_image", false));
    }

    #[test]
    fn test_defaults_on_missing_or_mistyped() {
        let input = StageInput::new().with("iteration", json!("two"));

        assert_eq!(input.str_or("domain", "general"), "general");
        assert_eq!(input.u32_or("iteration", 1), 1);
        assert!(input.object("references").is_empty());
    }
}
