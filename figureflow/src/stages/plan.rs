//! Plan stage: drafts the technical specification of the diagram.

use super::{failed, generate_content, Stage, StageInput, TextGenerator};
use crate::core::{StageKind, StageResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Produces a textual specification from the request, the retrieval
/// analysis and the dataset summary.
///
/// Output data: `specification`, `diagram_type`, `domain`.
pub struct PlanStage {
    text: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for PlanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanStage").finish_non_exhaustive()
    }
}

impl PlanStage {
    /// Creates a plan stage.
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>) -> Self {
        Self { text }
    }
}

fn reference_context(references: &Map<String, Value>) -> String {
    let has_references = references
        .get("references")
        .and_then(Value::as_array)
        .is_some_and(|r| !r.is_empty());
    if !has_references {
        return String::new();
    }

    let analysis = references
        .get("analysis")
        .and_then(Value::as_str)
        .unwrap_or("No analysis available");
    format!("Reference Analysis:\n{analysis}\n")
}

fn joined(data_info: &Map<String, Value>, key: &str) -> String {
    data_info
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

fn data_context(data_info: &Map<String, Value>) -> String {
    if data_info.is_empty() {
        return String::new();
    }

    let row_count = data_info.get("row_count").and_then(Value::as_u64).unwrap_or(0);
    format!(
        "Data Context:\n- Columns: {}\n- Row Count: {row_count}\n- Data Types: {}\n",
        joined(data_info, "columns"),
        joined(data_info, "dtypes"),
    )
}

#[async_trait]
impl Stage for PlanStage {
    fn kind(&self) -> StageKind {
        StageKind::Plan
    }

    async fn execute(&self, input: &StageInput) -> StageResult {
        let diagram_type = input.str_or("type", "diagram");
        let domain = input.str_or("domain", "general");
        let prompt = input.str_or("prompt", "");

        let planning_prompt = format!(
            "Create a detailed technical specification for generating a scientific diagram.\n\n\
             User Request: {prompt}\nDiagram Type: {diagram_type}\nScientific Domain: {domain}\n\n\
             {}{}\n\
             Cover the primary purpose, visual elements, layout, data representation and \
             technical specifications. Format as clear, actionable specifications for the Visualizer agent.",
            reference_context(&input.object("references")),
            data_context(&input.object("data_info")),
        );

        match generate_content(self.text.as_ref(), self.kind(), &planning_prompt).await {
            Ok(specification) => StageResult::ok_with([
                ("specification", json!(specification)),
                ("diagram_type", json!(diagram_type)),
                ("domain", json!(domain)),
            ])
            .add_metadata("agent", json!(self.kind().agent_name())),
            Err(e) => failed(self.kind(), &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTextGenerator;

    #[tokio::test]
    async fn test_plan_includes_contexts() {
        let text = Arc::new(ScriptedTextGenerator::new(["SPEC"]));
        let stage = PlanStage::new(text.clone());

        let input = StageInput::new()
            .with("prompt", json!("show training loss curve"))
            .with("type", json!("plot"))
            .with("domain", json!("mathematics"))
            .with(
                "references",
                json!({"references": [{"id": "r1"}], "analysis": "r1 fits"}),
            )
            .with(
                "data_info",
                json!({"columns": ["epoch", "loss"], "row_count": 20, "dtypes": ["int64", "float64"]}),
            );
        let result = stage.execute(&input).await;

        assert!(result.is_success());
        assert_eq!(result.get_str("specification"), Some("SPEC"));
        assert_eq!(result.get_str("diagram_type"), Some("plot"));

        let prompt = &text.prompts()[0];
        assert!(prompt.contains("Reference Analysis:\nr1 fits"));
        assert!(prompt.contains("- Columns: epoch, loss"));
        assert!(prompt.contains("- Row Count: 20"));
    }

    #[tokio::test]
    async fn test_plan_omits_empty_contexts() {
        let text = Arc::new(ScriptedTextGenerator::new(["SPEC"]));
        let stage = PlanStage::new(text.clone());

        let input = StageInput::new().with("references", json!({"references": [], "analysis": "none"}));
        let result = stage.execute(&input).await;

        assert!(result.is_success());
        let prompt = &text.prompts()[0];
        assert!(!prompt.contains("Reference Analysis"));
        assert!(!prompt.contains("Data Context"));
    }

    #[tokio::test]
    async fn test_plan_failure() {
        let stage = PlanStage::new(Arc::new(ScriptedTextGenerator::failing("offline")));
        let result = stage.execute(&StageInput::new()).await;
        assert_eq!(result.error_message(), "PlannerAgent generation error: offline");
    }
}
