//! The external backend: wraps a third-party diagram pipeline and
//! synthesizes the native event sequence around it.

use super::{finish_run, DiagramBackend};
use crate::config::ExternalPipelineConfig;
use crate::core::{BackendKind, DataInfo, DiagramRequest, FinalArtifact, RunPhase, StageKind};
use crate::errors::{CollaboratorError, Result};
use crate::events::EventEmitter;
use crate::persistence::PersistenceBridge;
use crate::render::png_data_url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use std::sync::Arc;

/// Quality score reported when the pipeline does not return `final_score`.
pub const DEFAULT_EXTERNAL_SCORE: u8 = 8;

/// Diagram families the external pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalDiagramType {
    /// Methodology, architecture and flowchart diagrams.
    Methodology,
    /// Statistical plots.
    Plot,
}

impl ExternalDiagramType {
    /// Maps a request's type, then its domain, to a pipeline diagram type.
    #[must_use]
    pub fn from_request(diagram_type: &str, domain: &str) -> Self {
        match diagram_type.to_lowercase().as_str() {
            "flowchart" | "methodology" | "architecture" | "diagram" => Self::Methodology,
            "plot" | "chart" | "graph" | "bar" | "line" | "scatter" => Self::Plot,
            _ if domain == "mathematics" => Self::Plot,
            _ => Self::Methodology,
        }
    }
}

/// Input handed to [`ExternalPipeline::generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
    /// Domain, request and dataset summary, one per line.
    pub source_context: String,
    /// What the diagram should communicate.
    pub communicative_intent: String,
    /// Diagram family.
    pub diagram_type: ExternalDiagramType,
    /// Models and iteration budget the pipeline should use.
    pub settings: ExternalPipelineConfig,
}

/// What the external pipeline returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Path of the rendered image, if one was written.
    #[serde(default)]
    pub image_path: Option<String>,
    /// One entry per refinement iteration the pipeline ran.
    #[serde(default)]
    pub iterations: Vec<Value>,
    /// Pipeline metadata; `final_score` carries the quality score.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl GenerationOutput {
    /// Number of iterations reported, at least 1.
    #[must_use]
    pub fn iteration_count(&self) -> u32 {
        u32::try_from(self.iterations.len()).unwrap_or(u32::MAX).max(1)
    }

    /// The `final_score` metadata entry clamped into `1..=10`, or
    /// [`DEFAULT_EXTERNAL_SCORE`].
    #[must_use]
    pub fn quality_score(&self) -> u8 {
        self.metadata
            .get("final_score")
            .and_then(Value::as_f64)
            .map_or(DEFAULT_EXTERNAL_SCORE, clamped_score)
    }
}

/// Rounds `score` to the nearest whole score in `1..=10`.
fn clamped_score(score: f64) -> u8 {
    if score.is_nan() {
        return DEFAULT_EXTERNAL_SCORE;
    }
    let rounded = score.round();
    (1..=10u8).rev().find(|n| f64::from(*n) <= rounded).unwrap_or(1)
}

/// The external diagram pipeline.
#[async_trait]
pub trait ExternalPipeline: Send + Sync {
    /// Runs retrieval, planning, styling, rendering and critique in one call.
    async fn generate(&self, input: &GenerationInput) -> std::result::Result<GenerationOutput, CollaboratorError>;
}

/// Builds the pipeline's source context from the request.
#[must_use]
pub fn source_context(request: &DiagramRequest) -> String {
    let mut context = format!("Domain: {}\nRequest: {}", request.domain, request.prompt);
    if let Some(data_info) = request.data_info.as_ref() {
        append_data_context(&mut context, data_info);
    }
    context
}

fn append_data_context(context: &mut String, data_info: &DataInfo) {
    if !data_info.columns.is_empty() {
        let _ = write!(context, "\nData columns: {}", data_info.columns.join(", "));
    }
    if let Some(rows) = data_info.row_count {
        let _ = write!(context, "\nData rows: {rows}");
    }
    if !data_info.sample.is_empty() {
        let sample: Vec<&Value> = data_info.sample.iter().take(3).collect();
        let _ = write!(context, "\nSample data: {}", json!(sample));
    }
}

/// Runs the external pipeline and reports it with the native event
/// contract: retrieval and planning before the call, then one
/// styling/visualization/critique cycle per reported iteration.
pub struct ExternalOrchestrator {
    pipeline: Arc<dyn ExternalPipeline>,
    persistence: PersistenceBridge,
    settings: ExternalPipelineConfig,
}

impl std::fmt::Debug for ExternalOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ExternalOrchestrator {
    /// Wraps `pipeline`.
    #[must_use]
    pub fn new(
        pipeline: Arc<dyn ExternalPipeline>,
        persistence: PersistenceBridge,
        settings: ExternalPipelineConfig,
    ) -> Self {
        Self {
            pipeline,
            persistence,
            settings,
        }
    }

    async fn load_image(path: Option<&str>) -> Option<String> {
        let path = path?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(png_data_url(&bytes)),
            Err(e) => {
                tracing::warn!(path, error = %e, "External pipeline image not readable");
                None
            }
        }
    }
}

#[async_trait]
impl DiagramBackend for ExternalOrchestrator {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    async fn run(&self, request: &DiagramRequest, emitter: &mut EventEmitter) -> Result<()> {
        emitter
            .status(RunPhase::Init, "Starting diagram generation...", None)
            .await?;

        let input = GenerationInput {
            source_context: source_context(request),
            communicative_intent: request.prompt.clone(),
            diagram_type: ExternalDiagramType::from_request(&request.diagram_type, &request.domain),
            settings: self.settings.clone(),
        };

        emitter
            .status(RunPhase::Retrieval, "Retrieving reference diagrams...", None)
            .await?;
        emitter
            .agent_complete(
                StageKind::Retrieve,
                json!({"status": "selecting reference diagrams from curated set"}),
                None,
            )
            .await?;
        emitter
            .status(RunPhase::Planning, "Planning diagram structure...", None)
            .await?;
        emitter
            .agent_complete(
                StageKind::Plan,
                json!({"status": "generating textual diagram description", "diagram_type": input.diagram_type}),
                None,
            )
            .await?;

        let output = match self.pipeline.generate(&input).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "External pipeline failed");
                return emitter.error(format!("External pipeline error: {e}")).await;
            }
        };

        let iterations = output.iteration_count();
        let image_data = Self::load_image(output.image_path.as_deref()).await;

        for (index, i) in (1..=iterations).enumerate() {
            let report = output.iterations.get(index).cloned().unwrap_or(Value::Null);

            emitter
                .status(RunPhase::Styling, format!("Applying styling (iteration {i})..."), Some(i))
                .await?;
            emitter
                .agent_complete(
                    StageKind::Style,
                    json!({"iteration": i, "status": "applying publication style guidelines"}),
                    Some(i),
                )
                .await?;
            emitter
                .status(
                    RunPhase::Visualization,
                    format!("Generating visualization (iteration {i})..."),
                    Some(i),
                )
                .await?;
            emitter
                .agent_complete(
                    StageKind::Render,
                    json!({"iteration": i, "status": "rendering diagram"}),
                    Some(i),
                )
                .await?;
            if i == iterations {
                if let Some(image) = image_data.as_deref() {
                    emitter.image_preview(image, i).await?;
                }
            }
            emitter
                .status(RunPhase::Critique, format!("Evaluating quality (iteration {i})..."), Some(i))
                .await?;
            emitter
                .agent_complete(
                    StageKind::Critique,
                    json!({
                        "iteration": i,
                        "status": "evaluating faithfulness, readability, conciseness, aesthetics",
                        "report": report,
                    }),
                    Some(i),
                )
                .await?;
        }

        let quality_score = output.quality_score();
        let artifact = FinalArtifact {
            image_data,
            payload: Value::Object(output.metadata.clone()),
            code: None,
            specification: input.source_context,
            quality_score,
            evaluation: format!("Quality score: {quality_score}"),
            iterations,
            image_path: output.image_path,
            metadata: output.metadata,
        };

        finish_run(&self.persistence, request, artifact, self.kind(), emitter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventSink;
    use crate::persistence::InMemoryFigureStore;
    use crate::testing::{assert_single_terminal, event_labels, ScriptedExternalPipeline};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    fn request() -> DiagramRequest {
        DiagramRequest::new("compare model accuracy", "bar", "mathematics", "user-1")
    }

    async fn run(pipeline: ScriptedExternalPipeline) -> (Vec<crate::core::Event>, Arc<InMemoryFigureStore>) {
        let store = Arc::new(InMemoryFigureStore::new());
        let backend = ExternalOrchestrator::new(
            Arc::new(pipeline),
            PersistenceBridge::new(store.clone()),
            ExternalPipelineConfig::default(),
        );
        let (mut emitter, stream) = EventEmitter::channel(64, Arc::new(NoOpEventSink));
        backend.run(&request(), &mut emitter).await.unwrap();
        drop(emitter);
        (stream.collect().await, store)
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(ExternalDiagramType::from_request("Flowchart", "mind"), ExternalDiagramType::Methodology);
        assert_eq!(ExternalDiagramType::from_request("scatter", "mind"), ExternalDiagramType::Plot);
        assert_eq!(ExternalDiagramType::from_request("heatmap", "mathematics"), ExternalDiagramType::Plot);
        assert_eq!(ExternalDiagramType::from_request("heatmap", "matter"), ExternalDiagramType::Methodology);
    }

    #[test]
    fn test_source_context() {
        let data_info = DataInfo {
            columns: vec!["epoch".to_string(), "loss".to_string()],
            row_count: Some(100),
            sample: vec![json!({"epoch": 1}), json!({"epoch": 2}), json!({"epoch": 3}), json!({"epoch": 4})],
            ..DataInfo::default()
        };
        let request = request().with_data_info(data_info);

        assert_eq!(
            source_context(&request),
            "Domain: mathematics\nRequest: compare model accuracy\nData columns: epoch, loss\n\
             Data rows: 100\nSample data: [{\"epoch\":1},{\"epoch\":2},{\"epoch\":3}]"
        );
    }

    #[test]
    fn test_output_defaults() {
        let output = GenerationOutput::default();
        assert_eq!(output.iteration_count(), 1);
        assert_eq!(output.quality_score(), DEFAULT_EXTERNAL_SCORE);

        let mut metadata = Map::new();
        metadata.insert("final_score".to_string(), json!(14));
        let output = GenerationOutput { metadata, ..GenerationOutput::default() };
        assert_eq!(output.quality_score(), 10);
    }

    #[test]
    fn test_fractional_and_negative_scores() {
        let score = |value: Value| {
            let mut metadata = Map::new();
            metadata.insert("final_score".to_string(), value);
            GenerationOutput { metadata, ..GenerationOutput::default() }.quality_score()
        };

        assert_eq!(score(json!(6.6)), 7);
        assert_eq!(score(json!(7.4)), 7);
        assert_eq!(score(json!(-3)), 1);
        assert_eq!(score(json!("high")), DEFAULT_EXTERNAL_SCORE);
        assert_eq!(clamped_score(f64::NAN), DEFAULT_EXTERNAL_SCORE);
    }

    #[tokio::test]
    async fn test_synthesized_sequence_matches_native_shape() {
        let pipeline = ScriptedExternalPipeline::new(GenerationOutput {
            image_path: None,
            iterations: vec![json!({"critique": "tighten labels"}), json!({"critique": "ok"})],
            metadata: Map::new(),
        });
        let inputs = pipeline.inputs_handle();

        let (events, store) = run(pipeline).await;

        assert_eq!(
            event_labels(&events),
            vec![
                "status(init)",
                "status(retrieval)",
                "agent_complete(RetrieverAgent)",
                "status(planning)",
                "agent_complete(PlannerAgent)",
                "status(styling,1)",
                "agent_complete(StylistAgent,1)",
                "status(visualization,1)",
                "agent_complete(VisualizerAgent,1)",
                "status(critique,1)",
                "agent_complete(CriticAgent,1)",
                "status(styling,2)",
                "agent_complete(StylistAgent,2)",
                "status(visualization,2)",
                "agent_complete(VisualizerAgent,2)",
                "status(critique,2)",
                "agent_complete(CriticAgent,2)",
                "status(complete)",
                "complete",
            ]
        );
        assert_single_terminal(&events);

        let complete = events.last().unwrap();
        assert_eq!(complete.data["data"]["quality_score"], json!(8));
        assert_eq!(complete.data["data"]["iterations"], json!(2));

        let figure_id = complete.data["figure_id"].as_str().unwrap();
        let figure = store.figure(figure_id).unwrap();
        assert_eq!(figure.parameters["pipeline"], json!("paperbanana"));

        let inputs = inputs.lock();
        assert_eq!(inputs[0].diagram_type, ExternalDiagramType::Plot);
        assert_eq!(inputs[0].communicative_intent, "compare model accuracy");
    }

    #[tokio::test]
    async fn test_pipeline_failure() {
        let (events, store) = run(ScriptedExternalPipeline::failing("quota exhausted")).await;

        assert_eq!(event_labels(&events).last().map(String::as_str), Some("error"));
        assert_eq!(events.last().unwrap().message(), Some("External pipeline error: quota exhausted"));
        assert_eq!(store.figure_count(), 0);
    }

    #[tokio::test]
    async fn test_image_preview_on_last_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        tokio::fs::write(&path, [1u8, 2, 3]).await.unwrap();

        let pipeline = ScriptedExternalPipeline::new(GenerationOutput {
            image_path: Some(path.to_string_lossy().into_owned()),
            iterations: vec![json!({}), json!({})],
            metadata: Map::new(),
        });
        let (events, _) = run(pipeline).await;

        let previews: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == crate::core::EventType::ImagePreview)
            .collect();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].iteration(), Some(2));
        assert_eq!(previews[0].data["image_data"], json!("data:image/png;base64,AQID"));
    }
}
