//! Core domain model types for figureflow.
//!
//! This module contains the fundamental types shared by every backend:
//! - Stage kinds and run phases
//! - The stage result type with factory methods
//! - Progress events and the final artifact
//! - The immutable diagram request

mod artifact;
mod event;
mod output;
mod request;
mod status;

pub use artifact::FinalArtifact;
pub use event::{Event, EventType};
pub use output::StageResult;
pub use request::{DataInfo, DiagramRequest};
pub use status::{BackendKind, RunPhase, StageKind};
