//! The native backend: five stages run in-process.

use super::refinement::{LoopTransition, RunState};
use super::{finish_run, DiagramBackend};
use crate::config::OrchestratorConfig;
use crate::core::{BackendKind, DiagramRequest, RunPhase, StageKind, StageResult};
use crate::critique::{CritiqueDecision, CritiqueParser};
use crate::errors::Result;
use crate::events::EventEmitter;
use crate::observability::StageTimer;
use crate::persistence::PersistenceBridge;
use crate::render::SandboxPolicy;
use crate::stages::{
    CritiqueStage, PlanStage, RenderStage, RetrieveStage, Stage, StageInput, StagePorts, StyleStage,
};
use async_trait::async_trait;
use serde_json::json;

/// Runs Retrieve and Plan once, then Style, Render and Critique until the
/// critique accepts or `max_iterations` is reached.
#[derive(Debug)]
pub struct NativeOrchestrator {
    retrieve: RetrieveStage,
    plan: PlanStage,
    style: StyleStage,
    render: RenderStage,
    critique: CritiqueStage,
    persistence: PersistenceBridge,
    max_iterations: u32,
}

impl NativeOrchestrator {
    /// Builds the five stages over `ports`.
    #[must_use]
    pub fn new(ports: &StagePorts, persistence: PersistenceBridge, config: &OrchestratorConfig) -> Self {
        Self {
            retrieve: RetrieveStage::new(
                ports.text.clone(),
                ports.references.clone(),
                config.selected_reference_count,
            ),
            plan: PlanStage::new(ports.text.clone()),
            style: StyleStage::new(ports.text.clone()),
            render: RenderStage::new(ports.text.clone(), ports.renderer.clone()),
            critique: CritiqueStage::new(ports.text.clone(), CritiqueParser::new(config.max_iterations)),
            persistence,
            max_iterations: config.max_iterations,
        }
    }

    /// Replaces the policy generated rendering code is checked against.
    #[must_use]
    pub fn with_sandbox_policy(mut self, policy: SandboxPolicy) -> Self {
        self.render = self.render.with_policy(policy);
        self
    }

    /// Iteration cap of the refinement loop.
    #[must_use]
    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Announces, executes and reports one stage.
    ///
    /// Returns `None` after emitting the terminal `error` event if the stage
    /// failed.
    async fn run_stage(
        &self,
        stage: &dyn Stage,
        input: &StageInput,
        iteration: Option<u32>,
        emitter: &mut EventEmitter,
    ) -> Result<Option<StageResult>> {
        let kind = stage.kind();
        emitter
            .status(kind.phase(), status_message(kind, iteration), iteration)
            .await?;

        let timer = StageTimer::start(kind, iteration);
        let result = stage.execute(input).await;
        timer.finish(result.is_success());

        if result.is_failure() {
            emitter
                .error(format!("{} failed: {}", kind.failure_label(), result.error_message()))
                .await?;
            return Ok(None);
        }

        emitter.agent_complete(kind, result.data_json(), iteration).await?;
        Ok(Some(result))
    }
}

fn status_message(kind: StageKind, iteration: Option<u32>) -> String {
    let i = iteration.unwrap_or(1);
    match kind {
        StageKind::Retrieve => "Retrieving reference diagrams...".to_string(),
        StageKind::Plan => "Planning diagram structure...".to_string(),
        StageKind::Style => format!("Applying styling (iteration {i})..."),
        StageKind::Render => format!("Generating visualization (iteration {i})..."),
        StageKind::Critique => format!("Evaluating quality (iteration {i})..."),
    }
}

#[async_trait]
impl DiagramBackend for NativeOrchestrator {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    async fn run(&self, request: &DiagramRequest, emitter: &mut EventEmitter) -> Result<()> {
        emitter
            .status(RunPhase::Init, "Starting diagram generation...", None)
            .await?;

        let retrieve_input = StageInput::new()
            .with("prompt", json!(request.prompt))
            .with("type", json!(request.diagram_type))
            .with("domain", json!(request.domain));
        let Some(retrieved) = self.run_stage(&self.retrieve, &retrieve_input, None, emitter).await? else {
            return Ok(());
        };

        let plan_input = retrieve_input
            .with("references", retrieved.data_json())
            .with("data_info", request.data_info_json());
        let Some(planned) = self.run_stage(&self.plan, &plan_input, None, emitter).await? else {
            return Ok(());
        };

        let mut state = RunState::new(planned.get_str("specification").unwrap_or_default());
        loop {
            let iteration = state.iteration();

            let style_input = StageInput::new()
                .with("specification", json!(state.current_specification()))
                .with("domain", json!(request.domain))
                .with("diagram_type", json!(request.diagram_type));
            let Some(styled) = self.run_stage(&self.style, &style_input, Some(iteration), emitter).await? else {
                return Ok(());
            };
            state.record(StageKind::Style, styled);

            let render_input = StageInput::new()
                .with("enhanced_specification", json!(state.enhanced_specification()))
                .with("diagram_type", json!(request.diagram_type))
                .with("domain", json!(request.domain))
                .with("data_info", request.data_info_json());
            let Some(rendered) = self.run_stage(&self.render, &render_input, Some(iteration), emitter).await? else {
                return Ok(());
            };
            state.record(StageKind::Render, rendered);

            if let Some(image_data) = state.image_data() {
                emitter.image_preview(image_data, iteration).await?;
            }

            let critique_input = StageInput::new()
                .with("enhanced_specification", json!(state.enhanced_specification()))
                .with("diagram_type", json!(request.diagram_type))
                .with("domain", json!(request.domain))
                .with("iteration", json!(iteration))
                .with("has_image", json!(state.image_data().is_some()));
            let Some(critiqued) = self
                .run_stage(&self.critique, &critique_input, Some(iteration), emitter)
                .await?
            else {
                return Ok(());
            };
            let decision: CritiqueDecision = serde_json::from_value(critiqued.data_json())?;
            state.record(StageKind::Critique, critiqued);

            match LoopTransition::decide(&decision, iteration, self.max_iterations) {
                LoopTransition::Continue => {
                    tracing::debug!(
                        iteration,
                        quality_score = decision.quality_score,
                        "Critique requested refinement"
                    );
                    state.advance();
                }
                LoopTransition::Terminate => {
                    let artifact = state.into_artifact(&decision);
                    return finish_run(&self.persistence, request, artifact, self.kind(), emitter).await;
                }
            }
        }
    }
}
