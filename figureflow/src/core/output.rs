//! Stage result type with factory methods.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The outcome of one stage invocation.
///
/// Produced exactly once per `execute` call and never mutated after the
/// stage returns. A failing stage returns [`StageResult::fail`] with a
/// populated `error`; it never propagates a panic or error past its own
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Whether the stage succeeded.
    pub success: bool,

    /// Stage output data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// Error message (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Additional metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StageResult {
    /// Creates a successful result with data.
    #[must_use]
    pub fn ok(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a successful result from `(key, value)` pairs.
    #[must_use]
    pub fn ok_with<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self::ok(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Creates a failure result with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: HashMap::new(),
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.success
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string value from the data.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Error message, or a placeholder if the stage did not set one.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }

    /// Data as a JSON object, for embedding in events.
    #[must_use]
    pub fn data_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_result() {
        let result = StageResult::ok_with([("specification", json!("a bar chart"))]);
        assert!(result.is_success());
        assert!(!result.is_failure());
        assert_eq!(result.get_str("specification"), Some("a bar chart"));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_fail_result() {
        let result = StageResult::fail("model offline");
        assert!(result.is_failure());
        assert!(result.data.is_empty());
        assert_eq!(result.error_message(), "model offline");
    }

    #[test]
    fn test_metadata() {
        let result = StageResult::fail("x").add_metadata("agent", json!("CriticAgent"));
        assert_eq!(result.metadata.get("agent"), Some(&json!("CriticAgent")));
    }

    #[test]
    fn test_data_json() {
        let result = StageResult::ok_with([("quality_score", json!(9))]);
        assert_eq!(result.data_json(), json!({"quality_score": 9}));
    }
}
