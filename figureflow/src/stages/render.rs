//! Render stage: generates plotting code and executes it.

use super::{failed, generate_content, RenderExecutor, Stage, StageInput, TextGenerator};
use crate::core::{StageKind, StageResult};
use crate::errors::CollaboratorError;
use crate::render::{clean_code, diagram_payload, png_data_url, ExecutionContext, SandboxPolicy};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Output data: `code`, `image_data`, `a2ui_payload`, `diagram_type`, `domain`.
///
/// `image_data` is a PNG `data:` URL, or `null` when the executed code did
/// not leave an image buffer behind.
pub struct RenderStage {
    text: Arc<dyn TextGenerator>,
    renderer: Arc<dyn RenderExecutor>,
    policy: SandboxPolicy,
}

impl std::fmt::Debug for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderStage")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RenderStage {
    /// Creates a render stage with the default sandbox policy.
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>, renderer: Arc<dyn RenderExecutor>) -> Self {
        Self {
            text,
            renderer,
            policy: SandboxPolicy::default(),
        }
    }

    /// Replaces the sandbox policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SandboxPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn render(
        &self,
        specification: &str,
        diagram_type: &str,
        domain: &str,
        data_info: Value,
    ) -> Result<(String, Option<String>), CollaboratorError> {
        let code_prompt = format!(
            "Generate Python matplotlib code to create this scientific diagram.\n\n\
             Enhanced Specification:\n{specification}\n\nType: {diagram_type}\nDomain: {domain}\n\n\
             Use only matplotlib (plt), numpy (np), pandas (pd) and the provided data_info. \
             Include all labels, legends and annotations. Return ONLY the Python code. \
             Save to buffer: buf = io.BytesIO(); plt.savefig(buf, format='png', dpi=300, \
             bbox_inches='tight'); buf.seek(0)"
        );

        let code = clean_code(&generate_content(self.text.as_ref(), self.kind(), &code_prompt).await?);
        self.policy.check(&code)?;

        let context = ExecutionContext::plotting(specification, data_info);
        let image = self.renderer.render(&code, &context).await?;
        Ok((code, image.as_deref().map(png_data_url)))
    }
}

#[async_trait]
impl Stage for RenderStage {
    fn kind(&self) -> StageKind {
        StageKind::Render
    }

    async fn execute(&self, input: &StageInput) -> StageResult {
        let specification = input.str_or("enhanced_specification", "");
        let diagram_type = input.str_or("diagram_type", "diagram");
        let domain = input.str_or("domain", "general");
        let data_info = input.get("data_info").cloned().unwrap_or_else(|| json!({}));

        match self.render(specification, diagram_type, domain, data_info).await {
            Ok((code, image_data)) => {
                let has_image = image_data.is_some();
                StageResult::ok_with([
                    ("code", json!(code)),
                    ("image_data", json!(image_data)),
                    ("a2ui_payload", diagram_payload(specification, diagram_type)),
                    ("diagram_type", json!(diagram_type)),
                    ("domain", json!(domain)),
                ])
                .add_metadata("agent", json!(self.kind().agent_name()))
                .add_metadata("has_image", json!(has_image))
            }
            Err(e) => failed(self.kind(), &e),
        }
    }
}
