//! Row shapes written to the storage collaborator.

use crate::core::{BackendKind, DiagramRequest, FinalArtifact};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Table holding one row per completed run.
pub const FIGURES_TABLE: &str = "figures";

/// Table holding the generation history of each figure.
pub const GENERATIONS_TABLE: &str = "generations";

/// A `figures` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureRecord {
    /// Owner of the figure.
    pub user_id: String,
    /// Project the figure belongs to.
    pub project_id: Option<String>,
    /// Requested diagram type.
    #[serde(rename = "type")]
    pub diagram_type: String,
    /// The natural-language request.
    pub prompt: String,
    /// Scientific domain.
    pub domain: String,
    /// Location of a rendered image file, when the backend wrote one.
    pub file_url: Option<String>,
    /// Structured diagram payload.
    pub diagram_data: Value,
    /// `{quality_score, iterations, pipeline}`.
    pub parameters: Value,
    /// Number of refinement iterations executed.
    pub iteration_count: u32,
    /// Always `"completed"` for rows written by the bridge.
    pub status: String,
}

impl FigureRecord {
    /// Builds the row for a finished run.
    #[must_use]
    pub fn from_run(request: &DiagramRequest, artifact: &FinalArtifact, backend: BackendKind) -> Self {
        Self {
            user_id: request.user_id.clone(),
            project_id: request.project_id.clone(),
            diagram_type: request.diagram_type.clone(),
            prompt: request.prompt.clone(),
            domain: request.domain.clone(),
            file_url: artifact.image_path.clone(),
            diagram_data: artifact.payload.clone(),
            parameters: json!({
                "quality_score": artifact.quality_score,
                "iterations": artifact.iterations,
                "pipeline": backend.as_str(),
            }),
            iteration_count: artifact.iterations,
            status: "completed".to_string(),
        }
    }
}

/// A `generations` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// The figure this generation produced.
    pub figure_id: String,
    /// Final iteration number.
    pub iteration: u32,
    /// The natural-language request.
    pub prompt: String,
    /// Generation parameters (the diagram payload).
    pub parameters: Value,
    /// Critique text of the last iteration.
    pub agent_feedback: String,
    /// Structured diagram payload.
    pub diagram_data: Value,
}

impl GenerationRecord {
    /// Builds the history row for a saved figure.
    #[must_use]
    pub fn from_run(figure_id: &str, request: &DiagramRequest, artifact: &FinalArtifact) -> Self {
        Self {
            figure_id: figure_id.to_string(),
            iteration: artifact.iterations,
            prompt: request.prompt.clone(),
            parameters: artifact.payload.clone(),
            agent_feedback: artifact.evaluation.clone(),
            diagram_data: artifact.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_artifact;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_figure_record_shape() {
        let request = DiagramRequest::new("loss curve", "plot", "mathematics", "u1");
        let record = FigureRecord::from_run(&request, &sample_artifact(), BackendKind::External);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["type"], json!("plot"));
        assert_eq!(value["project_id"], Value::Null);
        assert_eq!(
            value["parameters"],
            json!({"quality_score": 9, "iterations": 1, "pipeline": "paperbanana"})
        );
        assert_eq!(value["status"], json!("completed"));
    }

    #[test]
    fn test_generation_record_carries_feedback() {
        let request = DiagramRequest::new("loss curve", "plot", "mathematics", "u1");
        let artifact = sample_artifact();
        let record = GenerationRecord::from_run("fig-1", &request, &artifact);

        assert_eq!(record.figure_id, "fig-1");
        assert_eq!(record.agent_feedback, artifact.evaluation);
        assert_eq!(record.diagram_data, artifact.payload);
    }
}
