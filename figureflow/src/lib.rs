//! # Figureflow
//!
//! A streaming orchestrator for scientific diagram generation.
//!
//! Figureflow turns a natural-language request into a diagram by running a
//! fixed sequence of specialist stages and streaming progress to the caller:
//!
//! - **Stages**: Retrieve, Plan, Style, Render and Critique behind one
//!   [`Stage`](stages::Stage) contract; collaborator failures become failed
//!   results, never panics or errors
//! - **Bounded refinement**: Style, Render and Critique repeat until the
//!   critique accepts or the iteration cap is reached
//! - **Ordered events**: every run yields `status`, `agent_complete` and
//!   `image_preview` events ending in exactly one `complete` or `error`
//! - **Two backends**: a native in-process pipeline and a wrapper around an
//!   external pipeline, chosen per request behind the same event contract
//! - **Persistence**: finished figures are recorded through a storage
//!   collaborator before completion is reported
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use figureflow::prelude::*;
//!
//! let availability = BackendAvailability::detect(&Credentials::from_env(), false);
//! let orchestrator = Orchestrator::from_availability(
//!     OrchestratorConfig::default(),
//!     &availability,
//!     &ports,
//!     store,
//!     None,
//! )?;
//!
//! let request = DiagramRequest::new("show training loss curve", "plot", "mathematics", "user-1");
//! let mut frames = orchestrator.generate_diagram(request).sse_frames();
//! while let Some(frame) = frames.next().await {
//!     write(frame).await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod critique;
pub mod errors;
pub mod events;
pub mod observability;
pub mod persistence;
pub mod pipeline;
pub mod render;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Credentials, ExternalPipelineConfig, OrchestratorConfig};
    pub use crate::core::{
        BackendKind, DataInfo, DiagramRequest, Event, EventType, FinalArtifact, RunPhase,
        StageKind, StageResult,
    };
    pub use crate::critique::{parse_evaluation, CritiqueDecision, CritiqueParser};
    pub use crate::errors::{CollaboratorError, FigureflowError, PersistenceError, Result};
    pub use crate::events::{
        CollectingEventSink, EventEmitter, EventSink, EventStream, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::persistence::{FigureStore, InMemoryFigureStore, InMemoryReferenceLibrary, PersistenceBridge};
    pub use crate::pipeline::{
        BackendAvailability, DiagramBackend, ExternalOrchestrator, ExternalPipeline,
        NativeOrchestrator, Orchestrator,
    };
    pub use crate::render::{ExecutionContext, SandboxPolicy};
    pub use crate::stages::{
        ReferenceLookup, ReferenceRecord, RenderExecutor, Stage, StageInput, StagePorts,
        TextGenerator,
    };
}
