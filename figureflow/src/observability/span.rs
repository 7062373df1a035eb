//! Span attributes for diagram runs.

use crate::core::{BackendKind, DiagramRequest, StageKind};
use crate::utils::elapsed_ms;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Attributes recorded on the `diagram_run` span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Run identifier.
    pub run_id: Uuid,
    /// Backend serving the run.
    pub backend: BackendKind,
    /// Requesting user.
    pub user_id: String,
    /// Requested diagram type.
    pub diagram_type: String,
    /// Requested domain.
    pub domain: String,
}

impl RunSpanAttributes {
    /// Collects the attributes of a run.
    #[must_use]
    pub fn new(run_id: Uuid, backend: BackendKind, request: &DiagramRequest) -> Self {
        Self {
            run_id,
            backend,
            user_id: request.user_id.clone(),
            diagram_type: request.diagram_type.clone(),
            domain: request.domain.clone(),
        }
    }

    /// Opens the `diagram_run` span.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "diagram_run",
            run_id = %self.run_id,
            backend = %self.backend,
            user_id = %self.user_id,
            diagram_type = %self.diagram_type,
            domain = %self.domain,
        )
    }
}

/// Times one stage invocation and logs its outcome.
#[derive(Debug)]
pub struct StageTimer {
    stage: StageKind,
    iteration: Option<u32>,
    start: Instant,
}

impl StageTimer {
    /// Starts timing `stage`.
    #[must_use]
    pub fn start(stage: StageKind, iteration: Option<u32>) -> Self {
        tracing::debug!(stage = %stage, iteration, "Stage started");
        Self {
            stage,
            iteration,
            start: Instant::now(),
        }
    }

    /// Milliseconds since the stage started.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        elapsed_ms(self.start)
    }

    /// Logs completion and returns the duration in milliseconds.
    pub fn finish(self, success: bool) -> u64 {
        let duration_ms = self.elapsed_ms();
        if success {
            tracing::info!(stage = %self.stage, iteration = self.iteration, duration_ms, "Stage completed");
        } else {
            tracing::warn!(stage = %self.stage, iteration = self.iteration, duration_ms, "Stage failed");
        }
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_attributes_from_request() {
        let request = DiagramRequest::new("loss curve", "plot", "mathematics", "u1");
        let run_id = Uuid::new_v4();
        let attrs = RunSpanAttributes::new(run_id, BackendKind::Native, &request);

        assert_eq!(attrs.run_id, run_id);
        assert_eq!(attrs.user_id, "u1");
        assert_eq!(attrs.diagram_type, "plot");
        let _span = attrs.span();
    }

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start(StageKind::Plan, None);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.finish(true) >= 5);
    }
}
