//! Error types for the figureflow orchestrator.
//!
//! Stage failures are not errors in this taxonomy: they travel as
//! [`StageResult::fail`](crate::core::StageResult::fail) values. The types
//! here cover collaborator faults (caught inside stages), persistence,
//! backend selection and the run boundary itself.

use thiserror::Error;

/// The main error type for figureflow operations.
#[derive(Debug, Error)]
pub enum FigureflowError {
    /// No orchestrator backend can serve the request.
    #[error("{0}")]
    BackendUnavailable(String),

    /// Persisting a finished figure failed.
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// A collaborator call failed outside of a stage boundary.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    /// The caller dropped the event stream.
    #[error("Event stream consumer disconnected")]
    ConsumerGone,

    /// An event was produced after the terminal event.
    #[error("Event protocol violation: {0}")]
    Protocol(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FigureflowError {
    /// Returns true if the error means nobody is listening any more.
    #[must_use]
    pub fn is_consumer_gone(&self) -> bool {
        matches!(self, Self::ConsumerGone)
    }
}

/// Errors raised by external collaborators (text generation, rendering,
/// reference lookup, external pipeline).
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or rejected the request.
    #[error("{0}")]
    Request(String),

    /// The text-generation collaborator failed.
    #[error("{agent} generation error: {message}")]
    Generation {
        /// Agent that issued the request.
        agent: String,
        /// Collaborator message.
        message: String,
    },

    /// Rendering or code execution failed.
    #[error("Code execution failed: {0}")]
    Render(String),

    /// Generated code was rejected before execution.
    #[error("Code execution failed: {0}")]
    Sandbox(#[from] SandboxViolation),

    /// The external pipeline failed.
    #[error("{0}")]
    ExternalPipeline(String),
}

impl CollaboratorError {
    /// Creates a generation error for the named agent.
    #[must_use]
    pub fn generation(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            agent: agent.into(),
            message: message.into(),
        }
    }
}

/// Raised when generated rendering code asks for a capability outside the
/// plotting surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("generated code uses forbidden capability '{capability}' ({category})")]
pub struct SandboxViolation {
    /// The offending token found in the code.
    pub capability: String,
    /// Capability class (filesystem, process, network, dynamic evaluation).
    pub category: String,
}

impl SandboxViolation {
    /// Creates a new sandbox violation.
    #[must_use]
    pub fn new(capability: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            category: category.into(),
        }
    }
}

/// Errors raised by the storage collaborator or the persistence bridge.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    /// An insert was rejected by the store.
    #[error("Database save failed: insert into '{table}' failed: {message}")]
    Insert {
        /// Target table.
        table: String,
        /// Store message.
        message: String,
    },

    /// The figure insert succeeded but returned no identifier.
    #[error("Database save failed: no row returned for '{table}'")]
    NoRowReturned {
        /// Target table.
        table: String,
    },
}

impl PersistenceError {
    /// Creates an insert error.
    #[must_use]
    pub fn insert(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Insert {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Result alias for figureflow operations.
pub type Result<T> = std::result::Result<T, FigureflowError>;
