//! Testing utilities for figureflow runs.
//!
//! This module provides:
//! - Scripted collaborators (text generation, references, rendering,
//!   storage, external pipeline) and stub backends
//! - Fixtures for common runs and artifacts
//! - Assertions over event sequences

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_event_labels, assert_single_terminal, event_labels};
pub use fixtures::{native_script, sample_artifact, PLOT_CODE};
pub use mocks::{
    FailingFigureStore, ScriptedExternalPipeline, ScriptedTextGenerator, StaticReferences, StubBackend,
    StubRenderer,
};
