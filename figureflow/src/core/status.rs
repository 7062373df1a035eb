//! Stage kinds and run phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five specialist stages of a diagram run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Looks up reference diagrams and analyzes their relevance.
    Retrieve,
    /// Turns the request into a textual diagram specification.
    Plan,
    /// Adds publication-grade aesthetic directives to a specification.
    Style,
    /// Produces rendering code and an image from the styled specification.
    Render,
    /// Evaluates the result and decides whether to refine.
    Critique,
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::Retrieve,
        Self::Plan,
        Self::Style,
        Self::Render,
        Self::Critique,
    ];

    /// The agent name reported in `agent_complete` events.
    #[must_use]
    pub const fn agent_name(self) -> &'static str {
        match self {
            Self::Retrieve => "RetrieverAgent",
            Self::Plan => "PlannerAgent",
            Self::Style => "StylistAgent",
            Self::Render => "VisualizerAgent",
            Self::Critique => "CriticAgent",
        }
    }

    /// The run phase this stage executes in.
    #[must_use]
    pub const fn phase(self) -> RunPhase {
        match self {
            Self::Retrieve => RunPhase::Retrieval,
            Self::Plan => RunPhase::Planning,
            Self::Style => RunPhase::Styling,
            Self::Render => RunPhase::Visualization,
            Self::Critique => RunPhase::Critique,
        }
    }

    /// Prefix used in the `error` event message when this stage fails.
    #[must_use]
    pub const fn failure_label(self) -> &'static str {
        match self {
            Self::Retrieve => "Retrieval",
            Self::Plan => "Planning",
            Self::Style => "Styling",
            Self::Render => "Visualization",
            Self::Critique => "Critique",
        }
    }

    /// Returns true for stages that run inside the refinement loop.
    #[must_use]
    pub const fn is_refinement_stage(self) -> bool {
        matches!(self, Self::Style | Self::Render | Self::Critique)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrieve => write!(f, "retrieve"),
            Self::Plan => write!(f, "plan"),
            Self::Style => write!(f, "style"),
            Self::Render => write!(f, "render"),
            Self::Critique => write!(f, "critique"),
        }
    }
}

/// The `stage` tag carried by `status` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Run accepted, nothing executed yet.
    Init,
    /// Reference retrieval.
    Retrieval,
    /// Specification planning.
    Planning,
    /// Styling (per iteration).
    Styling,
    /// Rendering (per iteration).
    Visualization,
    /// Quality evaluation (per iteration).
    Critique,
    /// Loop terminated and the figure is recorded.
    Complete,
}

impl RunPhase {
    /// Returns the wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Retrieval => "retrieval",
            Self::Planning => "planning",
            Self::Styling => "styling",
            Self::Visualization => "visualization",
            Self::Critique => "critique",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two interchangeable orchestrator implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// The five-stage pipeline run in-process.
    Native,
    /// The wrapper around the external pipeline library.
    External,
}

impl BackendKind {
    /// Label recorded with persisted figures.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::External => "paperbanana",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_names() {
        assert_eq!(StageKind::Retrieve.agent_name(), "RetrieverAgent");
        assert_eq!(StageKind::Render.agent_name(), "VisualizerAgent");
        assert_eq!(StageKind::Critique.agent_name(), "CriticAgent");
    }

    #[test]
    fn test_stage_phases() {
        assert_eq!(StageKind::Plan.phase(), RunPhase::Planning);
        assert_eq!(StageKind::Render.phase(), RunPhase::Visualization);
        assert_eq!(RunPhase::Visualization.to_string(), "visualization");
    }

    #[test]
    fn test_refinement_stages() {
        let looped: Vec<_> = StageKind::ALL
            .into_iter()
            .filter(|k| k.is_refinement_stage())
            .collect();
        assert_eq!(looped, vec![StageKind::Style, StageKind::Render, StageKind::Critique]);
    }

    #[test]
    fn test_backend_labels() {
        assert_eq!(BackendKind::Native.to_string(), "native");
        assert_eq!(BackendKind::External.to_string(), "paperbanana");
    }

    #[test]
    fn test_run_phase_serialize() {
        let json = serde_json::to_string(&RunPhase::Init).unwrap();
        assert_eq!(json, r#""init""#);
    }
}
