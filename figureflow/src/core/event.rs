//! Progress events streamed to the caller of a run.

use super::{FinalArtifact, RunPhase, StageKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// The kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A phase is starting.
    Status,
    /// A stage finished successfully.
    AgentComplete,
    /// An intermediate rendered image is available.
    ImagePreview,
    /// The run finished and the figure was recorded. Terminal.
    Complete,
    /// The run failed. Terminal.
    Error,
}

impl EventType {
    /// Returns true for the two event types that end a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::AgentComplete => write!(f, "agent_complete"),
            Self::ImagePreview => write!(f, "image_preview"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One unit of a run's observable output.
///
/// Serializes as `{"type": ..., "data": {...}}`, the shape downstream
/// consumers parse out of each server-sent-events frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event type.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// The event payload.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    /// Creates an event with an empty payload.
    #[must_use]
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            data: Map::new(),
        }
    }

    /// Adds a payload field.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    fn with_iteration(self, iteration: Option<u32>) -> Self {
        match iteration {
            Some(i) => self.add_data("iteration", json!(i)),
            None => self,
        }
    }

    /// Creates a `status` event.
    #[must_use]
    pub fn status(phase: RunPhase, message: impl Into<String>, iteration: Option<u32>) -> Self {
        Self::new(EventType::Status)
            .add_data("message", json!(message.into()))
            .add_data("stage", json!(phase.as_str()))
            .with_iteration(iteration)
    }

    /// Creates an `agent_complete` event.
    #[must_use]
    pub fn agent_complete(stage: StageKind, data: Value, iteration: Option<u32>) -> Self {
        Self::new(EventType::AgentComplete)
            .add_data("agent", json!(stage.agent_name()))
            .add_data("data", data)
            .with_iteration(iteration)
    }

    /// Creates an `image_preview` event.
    #[must_use]
    pub fn image_preview(image_data: impl Into<String>, iteration: u32) -> Self {
        Self::new(EventType::ImagePreview)
            .add_data("image_data", json!(image_data.into()))
            .add_data("iteration", json!(iteration))
    }

    /// Creates the terminal `complete` event.
    #[must_use]
    pub fn complete(figure_id: impl Into<String>, artifact: &FinalArtifact) -> Self {
        Self::new(EventType::Complete)
            .add_data("figure_id", json!(figure_id.into()))
            .add_data("data", artifact.to_json())
    }

    /// Creates the terminal `error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventType::Error).add_data("message", json!(message.into()))
    }

    /// Returns true if this event ends the run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }

    /// The `stage` tag of a status event.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.data.get("stage").and_then(Value::as_str)
    }

    /// The `agent` of an `agent_complete` event.
    #[must_use]
    pub fn agent(&self) -> Option<&str> {
        self.data.get("agent").and_then(Value::as_str)
    }

    /// The refinement iteration tag, if any.
    #[must_use]
    pub fn iteration(&self) -> Option<u64> {
        self.data.get("iteration").and_then(Value::as_u64)
    }

    /// The human-readable message of a `status` or `error` event.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Compact label used by logs and test assertions, e.g.
    /// `status(styling,2)` or `agent_complete(CriticAgent,1)`.
    #[must_use]
    pub fn label(&self) -> String {
        let tag = match self.event_type {
            EventType::Status => self.stage().map(str::to_string),
            EventType::AgentComplete => self.agent().map(str::to_string),
            EventType::ImagePreview | EventType::Complete | EventType::Error => None,
        };
        match (tag, self.iteration()) {
            (Some(tag), Some(i)) if self.event_type != EventType::ImagePreview => {
                format!("{}({tag},{i})", self.event_type)
            }
            (Some(tag), _) => format!("{}({tag})", self.event_type),
            (None, Some(i)) => format!("{}({i})", self.event_type),
            (None, None) => self.event_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event() {
        let event = Event::status(RunPhase::Styling, "Applying styling (iteration 2)...", Some(2));
        assert_eq!(event.event_type, EventType::Status);
        assert_eq!(event.stage(), Some("styling"));
        assert_eq!(event.iteration(), Some(2));
        assert_eq!(event.label(), "status(styling,2)");
    }

    #[test]
    fn test_status_without_iteration() {
        let event = Event::status(RunPhase::Init, "Starting diagram generation...", None);
        assert!(!event.data.contains_key("iteration"));
        assert_eq!(event.label(), "status(init)");
    }

    #[test]
    fn test_agent_complete_event() {
        let event = Event::agent_complete(StageKind::Plan, json!({"specification": "s"}), None);
        assert_eq!(event.agent(), Some("PlannerAgent"));
        assert_eq!(event.label(), "agent_complete(PlannerAgent)");
    }

    #[test]
    fn test_terminal_events() {
        assert!(Event::error("boom").is_terminal());
        assert!(!Event::image_preview("data:image/png;base64,AA==", 1).is_terminal());
        assert_eq!(Event::image_preview("x", 3).label(), "image_preview(3)");
        assert_eq!(Event::error("boom").label(), "error");
    }

    #[test]
    fn test_wire_shape() {
        let event = Event::error("Retrieval failed: timeout");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({"type": "error", "data": {"message": "Retrieval failed: timeout"}})
        );
    }
}
