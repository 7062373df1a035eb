//! Critique stage: evaluates the styled specification and decides whether
//! to refine.

use super::{failed, generate_content, Stage, StageInput, TextGenerator};
use crate::core::{StageKind, StageResult};
use crate::critique::CritiqueParser;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Output data: `evaluation`, `should_refine`, `quality_score`, `iteration`.
pub struct CritiqueStage {
    text: Arc<dyn TextGenerator>,
    parser: CritiqueParser,
}

impl std::fmt::Debug for CritiqueStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CritiqueStage")
            .field("parser", &self.parser)
            .finish_non_exhaustive()
    }
}

impl CritiqueStage {
    /// Creates a critique stage.
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>, parser: CritiqueParser) -> Self {
        Self { text, parser }
    }
}

#[async_trait]
impl Stage for CritiqueStage {
    fn kind(&self) -> StageKind {
        StageKind::Critique
    }

    async fn execute(&self, input: &StageInput) -> StageResult {
        let specification = input.str_or("enhanced_specification", "");
        let diagram_type = input.str_or("diagram_type", "diagram");
        let domain = input.str_or("domain", "general");
        let iteration = input.u32_or("iteration", 1);
        let has_image = input.bool_or("has_image", false);

        let critique_prompt = format!(
            "Evaluate this scientific diagram specification for publication quality.\n\n\
             Specification:\n{specification}\n\nType: {diagram_type}\nDomain: {domain}\n\
             Iteration: {iteration}\nImage Generated: {has_image}\n\n\
             Assess scientific accuracy, visual clarity, aesthetic quality and completeness. \
             Provide an Overall Quality Score (1-10), an Accept/Refine decision and a prioritized \
             list of specific improvements if refinement is needed."
        );

        let evaluation = match generate_content(self.text.as_ref(), self.kind(), &critique_prompt).await {
            Ok(evaluation) => evaluation,
            Err(e) => return failed(self.kind(), &e),
        };

        let decision = self.parser.parse(&evaluation, iteration);
        tracing::debug!(
            iteration,
            should_refine = decision.should_refine,
            quality_score = decision.quality_score,
            "Critique parsed"
        );

        StageResult::ok_with([
            ("evaluation", json!(evaluation)),
            ("should_refine", json!(decision.should_refine)),
            ("quality_score", json!(decision.quality_score)),
            ("iteration", json!(iteration)),
        ])
        .add_metadata("agent", json!(self.kind().agent_name()))
        .add_metadata("iteration", json!(iteration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTextGenerator;

    fn stage(reply: &str) -> CritiqueStage {
        CritiqueStage::new(Arc::new(ScriptedTextGenerator::new([reply])), CritiqueParser::default())
    }

    #[tokio::test]
    async fn test_critique_accepts() {
        let input = StageInput::new().with("iteration", json!(1));
        let result = stage("Score: 9/10, Accept.").execute(&input).await;

        assert_eq!(result.get("should_refine"), Some(&json!(false)));
        assert_eq!(result.get("quality_score"), Some(&json!(9)));
        assert_eq!(result.get("iteration"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_critique_refines() {
        let input = StageInput::new().with("iteration", json!(2));
        let result = stage("Labels are unreadable.").execute(&input).await;

        assert_eq!(result.get("should_refine"), Some(&json!(true)));
        assert_eq!(result.get("quality_score"), Some(&json!(6)));
    }

    #[tokio::test]
    async fn test_critique_failure() {
        let stage = CritiqueStage::new(
            Arc::new(ScriptedTextGenerator::failing("rate limited")),
            CritiqueParser::default(),
        );
        let result = stage.execute(&StageInput::new()).await;
        assert_eq!(result.error_message(), "CriticAgent generation error: rate limited");
    }
}
