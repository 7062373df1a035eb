//! The final artifact built once at loop termination.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything a finished run hands to the persistence bridge and to the
/// `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalArtifact {
    /// Rendered image as a `data:image/png;base64,...` URL, if one was produced.
    pub image_data: Option<String>,

    /// Structured diagram payload for client-side rendering.
    #[serde(rename = "a2ui_payload")]
    pub payload: Value,

    /// Rendering code that produced the image.
    pub code: Option<String>,

    /// The final (styled) specification.
    pub specification: String,

    /// Quality score in `1..=10`.
    pub quality_score: u8,

    /// The last critique text.
    pub evaluation: String,

    /// Number of refinement iterations executed.
    pub iterations: u32,

    /// Location of the image file when a backend wrote one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Backend-specific metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl FinalArtifact {
    /// Serializes the artifact for the `complete` event payload.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if an image was rendered.
    #[must_use]
    pub const fn has_image(&self) -> bool {
        self.image_data.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact() -> FinalArtifact {
        FinalArtifact {
            image_data: None,
            payload: json!({"type": "diagram"}),
            code: Some("plt.plot([1, 2])".to_string()),
            specification: "line plot".to_string(),
            quality_score: 9,
            evaluation: "Score: 9/10, Accept.".to_string(),
            iterations: 1,
            image_path: None,
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_to_json_keys() {
        let value = artifact().to_json();
        assert_eq!(value["a2ui_payload"], json!({"type": "diagram"}));
        assert_eq!(value["quality_score"], json!(9));
        assert_eq!(value["image_data"], Value::Null);
        assert!(value.get("image_path").is_none());
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn test_metadata() {
        let value = artifact().add_metadata("pipeline", json!("native")).to_json();
        assert_eq!(value["metadata"]["pipeline"], json!("native"));
        assert!(!artifact().has_image());
    }
}
