//! Style stage: layers publication aesthetics onto a specification.

use super::{failed, generate_content, Stage, StageInput, TextGenerator};
use crate::core::{StageKind, StageResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Output data: `enhanced_specification`, `domain`, `diagram_type`.
pub struct StyleStage {
    text: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for StyleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleStage").finish_non_exhaustive()
    }
}

impl StyleStage {
    /// Creates a style stage.
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>) -> Self {
        Self { text }
    }
}

#[async_trait]
impl Stage for StyleStage {
    fn kind(&self) -> StageKind {
        StageKind::Style
    }

    async fn execute(&self, input: &StageInput) -> StageResult {
        let specification = input.str_or("specification", "");
        let domain = input.str_or("domain", "general");
        let diagram_type = input.str_or("diagram_type", "diagram");

        let styling_prompt = format!(
            "Enhance the following technical specification with academic publication-quality \
             aesthetic guidelines.\n\nOriginal Specification:\n{specification}\n\n\
             Domain: {domain}\nType: {diagram_type}\n\n\
             Specify a colorblind-friendly palette suited to {domain}, typography, visual \
             hierarchy, legend and caption placement, and accessibility directives. \
             Provide the enhanced specification with specific style directives."
        );

        match generate_content(self.text.as_ref(), self.kind(), &styling_prompt).await {
            Ok(enhanced) => StageResult::ok_with([
                ("enhanced_specification", json!(enhanced)),
                ("domain", json!(domain)),
                ("diagram_type", json!(diagram_type)),
            ])
            .add_metadata("agent", json!(self.kind().agent_name())),
            Err(e) => failed(self.kind(), &e),
        }
    }
}
