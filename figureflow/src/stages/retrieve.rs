//! Retrieve stage: finds reference diagrams and asks the model which matter.

use super::{failed, generate_content, ReferenceLookup, ReferenceRecord, Stage, StageInput, TextGenerator};
use crate::core::{StageKind, StageResult};
use async_trait::async_trait;
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;

/// Looks up references for the requested type/domain and produces a
/// relevance analysis.
///
/// Output data: `references`, `analysis`, `selected_count`.
pub struct RetrieveStage {
    text: Arc<dyn TextGenerator>,
    references: Arc<dyn ReferenceLookup>,
    selected_count: usize,
}

impl std::fmt::Debug for RetrieveStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieveStage")
            .field("selected_count", &self.selected_count)
            .finish()
    }
}

impl RetrieveStage {
    /// Creates a retrieve stage selecting up to `selected_count` references.
    #[must_use]
    pub fn new(
        text: Arc<dyn TextGenerator>,
        references: Arc<dyn ReferenceLookup>,
        selected_count: usize,
    ) -> Self {
        Self {
            text,
            references,
            selected_count,
        }
    }

    fn build_prompt(prompt: &str, diagram_type: &str, domain: &str, references: &[ReferenceRecord]) -> String {
        format!(
            "Analyze these reference diagrams and identify which ones are most relevant \
             for the following request:\n\n\
             Type: {diagram_type}\nDomain: {domain}\nUser Request: {prompt}\n\n\
             Available References:\n{}\n\n\
             Return a JSON list of the top 3 most relevant reference IDs and explain why each is relevant.",
            format_references(references)
        )
    }
}

fn format_references(references: &[ReferenceRecord]) -> String {
    if references.is_empty() {
        return "No references found in database.".to_string();
    }

    let mut out = String::new();
    for reference in references {
        let _ = writeln!(
            out,
            "- ID: {}\n  Type: {}\n  Domain: {}\n  Description: {}",
            reference.id,
            reference.diagram_type,
            reference.domain,
            reference.description.as_deref().unwrap_or("N/A"),
        );
    }
    out
}

#[async_trait]
impl Stage for RetrieveStage {
    fn kind(&self) -> StageKind {
        StageKind::Retrieve
    }

    async fn execute(&self, input: &StageInput) -> StageResult {
        let diagram_type = input.str_or("type", "diagram");
        let domain = input.str_or("domain", "general");
        let prompt = input.str_or("prompt", "");

        let references = self.references.find_references(diagram_type, domain).await;
        tracing::debug!(count = references.len(), "References found");

        let analysis_prompt = Self::build_prompt(prompt, diagram_type, domain, &references);
        let analysis = match generate_content(self.text.as_ref(), self.kind(), &analysis_prompt).await {
            Ok(analysis) => analysis,
            Err(e) => return failed(self.kind(), &e),
        };

        let reference_count = references.len();
        StageResult::ok_with([
            ("references", json!(references)),
            ("analysis", json!(analysis)),
            ("selected_count", json!(self.selected_count.min(reference_count))),
        ])
        .add_metadata("agent", json!(self.kind().agent_name()))
        .add_metadata("reference_count", json!(reference_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTextGenerator, StaticReferences};

    fn references() -> Vec<ReferenceRecord> {
        (1..=5)
            .map(|i| ReferenceRecord::new(format!("r{i}"), "plot", "mathematics"))
            .collect()
    }

    #[tokio::test]
    async fn test_retrieve_success() {
        let text = Arc::new(ScriptedTextGenerator::new(["r1 and r2 are relevant"]));
        let stage = RetrieveStage::new(text.clone(), Arc::new(StaticReferences::new(references())), 3);

        let input = StageInput::new()
            .with("prompt", json!("loss curve"))
            .with("type", json!("plot"))
            .with("domain", json!("mathematics"));
        let result = stage.execute(&input).await;

        assert!(result.is_success());
        assert_eq!(result.get_str("analysis"), Some("r1 and r2 are relevant"));
        assert_eq!(result.get("selected_count"), Some(&json!(3)));
        assert_eq!(result.metadata["reference_count"], json!(5));
        assert!(text.prompts()[0].contains("- ID: r1"));
    }

    #[tokio::test]
    async fn test_retrieve_without_references() {
        let text = Arc::new(ScriptedTextGenerator::new(["nothing to compare"]));
        let stage = RetrieveStage::new(text.clone(), Arc::new(StaticReferences::default()), 3);

        let result = stage.execute(&StageInput::new()).await;

        assert!(result.is_success());
        assert_eq!(result.get("selected_count"), Some(&json!(0)));
        assert!(text.prompts()[0].contains("No references found in database."));
    }

    #[tokio::test]
    async fn test_retrieve_generation_failure() {
        let stage = RetrieveStage::new(
            Arc::new(ScriptedTextGenerator::failing("timeout")),
            Arc::new(StaticReferences::new(references())),
            3,
        );

        let result = stage.execute(&StageInput::new()).await;

        assert!(result.is_failure());
        assert_eq!(result.error_message(), "RetrieverAgent generation error: timeout");
    }
}
