//! Diagram orchestration.
//!
//! This module provides:
//! - The [`DiagramBackend`] contract shared by both backends
//! - The native five-stage backend and its refinement loop
//! - The external-pipeline backend
//! - Backend availability and selection
//! - The [`Orchestrator`] that drives one run per request

mod external;
mod native;
mod refinement;
mod selection;

pub use external::{
    source_context, ExternalDiagramType, ExternalOrchestrator, ExternalPipeline, GenerationInput,
    GenerationOutput, DEFAULT_EXTERNAL_SCORE,
};
pub use native::NativeOrchestrator;
pub use refinement::{LoopTransition, RunState};
pub use selection::{select_backend, BackendAvailability, NO_BACKEND_MESSAGE};

use crate::config::OrchestratorConfig;
use crate::core::{BackendKind, DiagramRequest, Event, FinalArtifact, RunPhase};
use crate::errors::{FigureflowError, Result};
use crate::events::{EventEmitter, EventSink, EventStream, NoOpEventSink};
use crate::observability::RunSpanAttributes;
use crate::persistence::{FigureStore, PersistenceBridge};
use crate::stages::StagePorts;
use crate::utils::{elapsed_ms, new_run_id};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::Instrument;

/// One interchangeable orchestrator implementation.
///
/// A backend writes a run's events through `emitter` and must end every run
/// it does not abandon with exactly one terminal event. Returning `Err`
/// hands the failure to the [`Orchestrator`], which reports it as the
/// terminal `error` event unless the consumer is gone.
#[async_trait]
pub trait DiagramBackend: Send + Sync + Debug {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Runs one request to completion.
    async fn run(&self, request: &DiagramRequest, emitter: &mut EventEmitter) -> Result<()>;
}

/// Persists a finished run, then emits `status(complete)` and `complete`.
///
/// A persistence failure becomes the run's terminal `error` event; no
/// completion is reported for a figure that was not recorded.
pub(crate) async fn finish_run(
    persistence: &PersistenceBridge,
    request: &DiagramRequest,
    artifact: FinalArtifact,
    backend: BackendKind,
    emitter: &mut EventEmitter,
) -> Result<()> {
    match persistence.save(request, &artifact, backend).await {
        Ok(figure_id) => {
            emitter
                .status(RunPhase::Complete, "Diagram generation complete!", None)
                .await?;
            emitter.complete(figure_id, &artifact).await
        }
        Err(e) => {
            tracing::error!(error = %e, "Persisting figure failed");
            emitter.error(e.to_string()).await
        }
    }
}

/// Entry point: selects a backend per request and drives the run on its own
/// task, handing the caller the event stream.
///
/// Stateless after construction and safe to share across concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    native: Option<Arc<dyn DiagramBackend>>,
    external: Option<Arc<dyn DiagramBackend>>,
    sink: Arc<dyn EventSink>,
}

impl Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("native", &self.native)
            .field("external", &self.external)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator with no backends configured.
    ///
    /// # Errors
    ///
    /// Returns [`FigureflowError::Config`] if `config` fails validation.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            native: None,
            external: None,
            sink: Arc::new(NoOpEventSink),
        })
    }

    /// Builds the backends `availability` allows.
    ///
    /// The external backend is built only when it is ready and `external`
    /// is given.
    ///
    /// # Errors
    ///
    /// Returns [`FigureflowError::Config`] if `config` fails validation.
    pub fn from_availability(
        config: OrchestratorConfig,
        availability: &BackendAvailability,
        ports: &StagePorts,
        store: Arc<dyn FigureStore>,
        external: Option<Arc<dyn ExternalPipeline>>,
    ) -> Result<Self> {
        let mut orchestrator = Self::new(config)?;
        let persistence = PersistenceBridge::new(store);

        if availability.native_ready {
            let native = NativeOrchestrator::new(ports, persistence.clone(), &orchestrator.config);
            orchestrator = orchestrator.with_native(Arc::new(native));
        }
        if let (true, Some(pipeline)) = (availability.external_ready, external) {
            let backend =
                ExternalOrchestrator::new(pipeline, persistence, orchestrator.config.external.clone());
            orchestrator = orchestrator.with_external(Arc::new(backend));
        }

        tracing::info!(
            native = orchestrator.native.is_some(),
            external = orchestrator.external.is_some(),
            text_model = %orchestrator.config.text_model,
            max_iterations = orchestrator.config.max_iterations,
            "Orchestrator configured"
        );
        Ok(orchestrator)
    }

    /// Sets the native backend.
    #[must_use]
    pub fn with_native(mut self, backend: Arc<dyn DiagramBackend>) -> Self {
        self.native = Some(backend);
        self
    }

    /// Sets the external backend.
    #[must_use]
    pub fn with_external(mut self, backend: Arc<dyn DiagramBackend>) -> Self {
        self.external = Some(backend);
        self
    }

    /// Mirrors every emitted event to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Selects the backend for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`FigureflowError::BackendUnavailable`] if no backend is
    /// configured.
    pub fn backend_for(&self, request: &DiagramRequest) -> Result<Arc<dyn DiagramBackend>> {
        select_backend(
            request.use_preferred_backend,
            self.native.as_ref(),
            self.external.as_ref(),
        )
    }

    /// Starts a run and returns its event stream.
    ///
    /// When no backend is configured, or no Tokio runtime is running, the
    /// stream holds a single `error` event and no run is started. Dropping
    /// the stream stops the run at its next emit.
    #[must_use]
    pub fn generate_diagram(&self, request: DiagramRequest) -> EventStream {
        let backend = match self.backend_for(&request) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %request.user_id, "Diagram request rejected");
                return EventStream::single(Event::error(e.to_string()));
            }
        };
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Diagram run requested outside a Tokio runtime");
                return EventStream::single(Event::error(format!("Orchestration error: {e}")));
            }
        };

        let (emitter, stream) = EventEmitter::channel(self.config.event_buffer, self.sink.clone());
        let span = RunSpanAttributes::new(new_run_id(), backend.kind(), &request).span();
        runtime.spawn(drive(backend, request, emitter).instrument(span));
        stream
    }
}

/// Runs `backend` and enforces the terminal-event guarantee at the
/// outermost boundary.
async fn drive(backend: Arc<dyn DiagramBackend>, request: DiagramRequest, mut emitter: EventEmitter) {
    let start = Instant::now();
    tracing::info!(prompt_len = request.prompt.len(), "Diagram run started");

    let outcome = AssertUnwindSafe(backend.run(&request, &mut emitter))
        .catch_unwind()
        .await;
    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(panic) => Some(FigureflowError::Internal(panic_message(panic.as_ref()))),
    };

    match failure {
        None => {
            if !emitter.is_terminated() {
                tracing::error!("Backend finished without a terminal event");
                let _ = emitter
                    .error("Orchestration error: run ended without a result")
                    .await;
            }
            tracing::info!(
                duration_ms = elapsed_ms(start),
                events = emitter.emitted(),
                "Diagram run finished"
            );
        }
        Some(e) if e.is_consumer_gone() => {
            tracing::info!(
                duration_ms = elapsed_ms(start),
                events = emitter.emitted(),
                "Consumer disconnected, run stopped"
            );
        }
        Some(e) => {
            tracing::error!(error = %e, duration_ms = elapsed_ms(start), "Diagram run failed");
            if !emitter.is_terminated() {
                if let Err(send) = emitter.error(format!("Orchestration error: {e}")).await {
                    tracing::debug!(error = %send, "Could not deliver run failure");
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "run panicked".to_string())
}
