//! The immutable request driving one run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Summary of a caller-supplied dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    /// Column names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    /// Number of rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Column data types, parallel to `columns`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dtypes: Vec<String>,

    /// A few sample rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample: Vec<Value>,

    /// Any other fields the uploader attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataInfo {
    /// Returns true if nothing is known about the data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
            && self.row_count.is_none()
            && self.dtypes.is_empty()
            && self.sample.is_empty()
            && self.extra.is_empty()
    }

    /// Serializes to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// A diagram generation request, as accepted from the transport.
///
/// Accepts both the snake_case field names used by existing clients and
/// camelCase spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramRequest {
    /// Natural-language description of the figure.
    pub prompt: String,

    /// Requested diagram type (e.g. "plot", "flowchart").
    #[serde(rename = "type", alias = "diagramType", alias = "diagram_type")]
    pub diagram_type: String,

    /// Scientific domain.
    pub domain: String,

    /// Requesting user.
    #[serde(alias = "userId")]
    pub user_id: String,

    /// Optional project the figure belongs to.
    #[serde(default, alias = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Optional dataset summary.
    #[serde(default, alias = "dataInfo", skip_serializing_if = "Option::is_none")]
    pub data_info: Option<DataInfo>,

    /// Whether the caller prefers the external pipeline backend.
    #[serde(
        default = "default_use_preferred_backend",
        alias = "usePreferredBackend",
        alias = "use_paperbanana"
    )]
    pub use_preferred_backend: bool,
}

const fn default_use_preferred_backend() -> bool {
    true
}

impl DiagramRequest {
    /// Creates a request with no project, no data and the preferred backend.
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        diagram_type: impl Into<String>,
        domain: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            diagram_type: diagram_type.into(),
            domain: domain.into(),
            user_id: user_id.into(),
            project_id: None,
            data_info: None,
            use_preferred_backend: true,
        }
    }

    /// Sets the project.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the dataset summary.
    #[must_use]
    pub fn with_data_info(mut self, data_info: DataInfo) -> Self {
        self.data_info = Some(data_info);
        self
    }

    /// Sets the backend preference.
    #[must_use]
    pub const fn prefer_external(mut self, prefer: bool) -> Self {
        self.use_preferred_backend = prefer;
        self
    }

    /// Dataset summary as JSON, `{}` when absent.
    #[must_use]
    pub fn data_info_json(&self) -> Value {
        self.data_info
            .as_ref()
            .map_or_else(|| Value::Object(Map::new()), DataInfo::to_json)
    }
}
