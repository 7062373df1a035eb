//! Stage trait and the five specialist stages.
//!
//! Stages are the units of work of a diagram run. Each one receives a
//! [`StageInput`] mapping and returns a [`StageResult`]; collaborator
//! failures are caught and reported as `StageResult::fail`, never
//! propagated.

mod critique;
mod input;
mod plan;
mod ports;
mod render;
mod retrieve;
mod style;

pub use critique::CritiqueStage;
pub use input::StageInput;
pub use plan::PlanStage;
pub use ports::{ReferenceLookup, ReferenceRecord, RenderExecutor, StagePorts, TextGenerator};
pub use render::RenderStage;
pub use retrieve::RetrieveStage;
pub use style::StyleStage;

use crate::core::{StageKind, StageResult};
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Which of the five stages this is.
    fn kind(&self) -> StageKind;

    /// Returns the agent name of the stage.
    fn name(&self) -> &str {
        self.kind().agent_name()
    }

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `input` - Stage-specific fields taken from the request and upstream results
    ///
    /// # Returns
    ///
    /// A successful result with the stage's data, or a failure carrying the
    /// error message.
    async fn execute(&self, input: &StageInput) -> StageResult;
}

/// Calls the text collaborator on behalf of `kind`, tagging failures with
/// the agent name.
pub(crate) async fn generate_content(
    text: &dyn TextGenerator,
    kind: StageKind,
    prompt: &str,
) -> Result<String, CollaboratorError> {
    text.generate(prompt)
        .await
        .map_err(|e| CollaboratorError::generation(kind.agent_name(), e.to_string()))
}

/// Converts a collaborator error into the stage's failure result.
pub(crate) fn failed(kind: StageKind, error: &CollaboratorError) -> StageResult {
    tracing::warn!(stage = %kind, error = %error, "Stage failed");
    StageResult::fail(error.to_string()).add_metadata("agent", serde_json::json!(kind.agent_name()))
}
