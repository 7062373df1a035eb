//! Per-run state of the refinement loop.

use crate::core::{FinalArtifact, StageKind, StageResult};
use crate::critique::CritiqueDecision;
use std::collections::HashMap;

/// What the loop does after a critique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTransition {
    /// Feed the critique back and run another iteration.
    Continue,
    /// Build the final artifact and leave the loop.
    Terminate,
}

impl LoopTransition {
    /// Decides the transition for `iteration`.
    ///
    /// Terminates when the critique accepts or the cap is reached.
    #[must_use]
    pub const fn decide(decision: &CritiqueDecision, iteration: u32, max_iterations: u32) -> Self {
        if !decision.should_refine || iteration >= max_iterations {
            Self::Terminate
        } else {
            Self::Continue
        }
    }
}

/// Mutable state owned by exactly one run.
#[derive(Debug, Clone)]
pub struct RunState {
    iteration: u32,
    current_specification: String,
    last_outputs: HashMap<StageKind, StageResult>,
}

impl RunState {
    /// Enters the loop at iteration 1 with the planned specification.
    #[must_use]
    pub fn new(specification: impl Into<String>) -> Self {
        Self {
            iteration: 1,
            current_specification: specification.into(),
            last_outputs: HashMap::new(),
        }
    }

    /// Current iteration, starting at 1.
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Specification the next styling pass works from.
    #[must_use]
    pub fn current_specification(&self) -> &str {
        &self.current_specification
    }

    /// Stores the latest output of a stage.
    pub fn record(&mut self, kind: StageKind, result: StageResult) {
        self.last_outputs.insert(kind, result);
    }

    /// Latest output of a stage.
    #[must_use]
    pub fn output(&self, kind: StageKind) -> Option<&StageResult> {
        self.last_outputs.get(&kind)
    }

    fn output_str(&self, kind: StageKind, key: &str) -> &str {
        self.output(kind).and_then(|r| r.get_str(key)).unwrap_or_default()
    }

    /// Styled specification of the current iteration.
    #[must_use]
    pub fn enhanced_specification(&self) -> &str {
        self.output_str(StageKind::Style, "enhanced_specification")
    }

    /// Rendered image of the current iteration, if any.
    #[must_use]
    pub fn image_data(&self) -> Option<&str> {
        self.output(StageKind::Render).and_then(|r| r.get_str("image_data"))
    }

    /// Appends the critique to the styled specification and moves to the
    /// next iteration.
    pub fn advance(&mut self) {
        self.current_specification = format!(
            "{}\n\nFeedback from previous iteration:\n{}",
            self.enhanced_specification(),
            self.output_str(StageKind::Critique, "evaluation"),
        );
        self.iteration += 1;
    }

    /// Builds the final artifact from the last Style, Render and Critique
    /// outputs.
    #[must_use]
    pub fn into_artifact(self, decision: &CritiqueDecision) -> FinalArtifact {
        let render = self.output(StageKind::Render);
        FinalArtifact {
            image_data: self.image_data().map(str::to_string),
            payload: render
                .and_then(|r| r.get("a2ui_payload"))
                .cloned()
                .unwrap_or_default(),
            code: render.and_then(|r| r.get_str("code")).map(str::to_string),
            specification: self.enhanced_specification().to_string(),
            quality_score: decision.quality_score,
            evaluation: self.output_str(StageKind::Critique, "evaluation").to_string(),
            iterations: self.iteration,
            image_path: None,
            metadata: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn styled(spec: &str) -> StageResult {
        StageResult::ok_with([("enhanced_specification", json!(spec))])
    }

    #[test]
    fn test_transition() {
        let refine = CritiqueDecision::refine(6);
        let accept = CritiqueDecision::accept(9);

        assert_eq!(LoopTransition::decide(&refine, 1, 3), LoopTransition::Continue);
        assert_eq!(LoopTransition::decide(&refine, 3, 3), LoopTransition::Terminate);
        assert_eq!(LoopTransition::decide(&accept, 1, 3), LoopTransition::Terminate);
    }

    #[test]
    fn test_advance_appends_feedback() {
        let mut state = RunState::new("planned");
        state.record(StageKind::Style, styled("styled"));
        state.record(
            StageKind::Critique,
            StageResult::ok_with([("evaluation", json!("add axis labels"))]),
        );

        state.advance();

        assert_eq!(state.iteration(), 2);
        assert_eq!(
            state.current_specification(),
            "styled\n\nFeedback from previous iteration:\nadd axis labels"
        );
    }

    #[test]
    fn test_into_artifact() {
        let mut state = RunState::new("planned");
        state.record(StageKind::Style, styled("styled"));
        state.record(
            StageKind::Render,
            StageResult::ok_with([
                ("code", json!("plt.plot([1])")),
                ("image_data", json!(null)),
                ("a2ui_payload", json!({"type": "diagram"})),
            ]),
        );
        state.record(
            StageKind::Critique,
            StageResult::ok_with([("evaluation", json!("Score: 9/10, Accept."))]),
        );

        let artifact = state.into_artifact(&CritiqueDecision::accept(9));

        assert_eq!(artifact.specification, "styled");
        assert_eq!(artifact.code.as_deref(), Some("plt.plot([1])"));
        assert!(!artifact.has_image());
        assert_eq!(artifact.payload, json!({"type": "diagram"}));
        assert_eq!(artifact.quality_score, 9);
        assert_eq!(artifact.iterations, 1);
    }
}
