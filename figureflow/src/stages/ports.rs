//! StagePorts - injected collaborators for stages.
//!
//! Each port is a narrow async trait so stages only depend on the
//! capability they call. All ports must be safe to share across
//! concurrently running diagram runs.

use crate::errors::CollaboratorError;
use crate::render::ExecutionContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Generative-text collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// A reference diagram known to the reference library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Reference identifier.
    pub id: String,
    /// Diagram type of the reference.
    #[serde(rename = "type")]
    pub diagram_type: String,
    /// Domain of the reference.
    pub domain: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ReferenceRecord {
    /// Creates a new reference record.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        diagram_type: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            diagram_type: diagram_type.into(),
            domain: domain.into(),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Reference-lookup collaborator.
///
/// Never fails: lookup errors and misses both yield an empty list.
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    /// Finds references for a diagram type within a domain.
    async fn find_references(&self, diagram_type: &str, domain: &str) -> Vec<ReferenceRecord>;
}

/// Rendering collaborator: executes generated plotting code inside the
/// constrained [`ExecutionContext`] and returns PNG bytes, or `None` when
/// the code ran but produced no image buffer.
#[async_trait]
pub trait RenderExecutor: Send + Sync {
    /// Runs `code` against `context`.
    async fn render(
        &self,
        code: &str,
        context: &ExecutionContext,
    ) -> Result<Option<Vec<u8>>, CollaboratorError>;
}

/// Combined ports container handed to the native stages.
#[derive(Clone)]
pub struct StagePorts {
    /// Text generation.
    pub text: Arc<dyn TextGenerator>,
    /// Reference lookup.
    pub references: Arc<dyn ReferenceLookup>,
    /// Rendering/code execution.
    pub renderer: Arc<dyn RenderExecutor>,
}

impl std::fmt::Debug for StagePorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePorts")
            .field("has_text", &true)
            .field("has_references", &true)
            .field("has_renderer", &true)
            .finish()
    }
}

impl StagePorts {
    /// Creates a ports container.
    #[must_use]
    pub fn new(
        text: Arc<dyn TextGenerator>,
        references: Arc<dyn ReferenceLookup>,
        renderer: Arc<dyn RenderExecutor>,
    ) -> Self {
        Self {
            text,
            references,
            renderer,
        }
    }

    /// Replaces the text generator.
    #[must_use]
    pub fn with_text(mut self, text: Arc<dyn TextGenerator>) -> Self {
        self.text = text;
        self
    }

    /// Replaces the reference lookup.
    #[must_use]
    pub fn with_references(mut self, references: Arc<dyn ReferenceLookup>) -> Self {
        self.references = references;
        self
    }

    /// Replaces the renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn RenderExecutor>) -> Self {
        self.renderer = renderer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_record_wire_shape() {
        let record = ReferenceRecord::new("r1", "plot", "mathematics").with_description("loss curve");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"id": "r1", "type": "plot", "domain": "mathematics", "description": "loss curve"})
        );
    }

    #[test]
    fn test_reference_record_without_description() {
        let record: ReferenceRecord =
            serde_json::from_value(json!({"id": "r2", "type": "flowchart", "domain": "mind"})).unwrap();
        assert!(record.description.is_none());
    }
}
