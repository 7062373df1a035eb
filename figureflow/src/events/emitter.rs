//! The producer side of a run's event channel.

use super::{EventSink, EventStream};
use crate::core::{Event, FinalArtifact, RunPhase, StageKind};
use crate::errors::{FigureflowError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Writes a run's events, in order, into a bounded channel.
///
/// Owned by exactly one run. Enforces the stream protocol: once a terminal
/// event (`complete` or `error`) has been written, every further emit fails
/// with [`FigureflowError::Protocol`]. A dropped consumer surfaces as
/// [`FigureflowError::ConsumerGone`] so the run can stop early.
pub struct EventEmitter {
    tx: mpsc::Sender<Event>,
    sink: Arc<dyn EventSink>,
    terminated: bool,
    emitted: usize,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("terminated", &self.terminated)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates a connected emitter/stream pair with the given buffer size.
    #[must_use]
    pub fn channel(capacity: usize, sink: Arc<dyn EventSink>) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let emitter = Self {
            tx,
            sink,
            terminated: false,
            emitted: 0,
        };
        (emitter, EventStream::new(rx))
    }

    /// Writes one event, waiting for buffer space if the consumer is slow.
    pub async fn emit(&mut self, event: Event) -> Result<()> {
        if self.terminated {
            return Err(FigureflowError::Protocol(format!(
                "{} emitted after terminal event",
                event.label()
            )));
        }
        if event.is_terminal() {
            self.terminated = true;
        }

        self.sink.try_emit(&event);
        self.tx
            .send(event)
            .await
            .map_err(|_| FigureflowError::ConsumerGone)?;
        self.emitted += 1;
        Ok(())
    }

    /// Emits a `status` event.
    pub async fn status(&mut self, phase: RunPhase, message: impl Into<String>, iteration: Option<u32>) -> Result<()> {
        self.emit(Event::status(phase, message, iteration)).await
    }

    /// Emits an `agent_complete` event.
    pub async fn agent_complete(&mut self, stage: StageKind, data: Value, iteration: Option<u32>) -> Result<()> {
        self.emit(Event::agent_complete(stage, data, iteration)).await
    }

    /// Emits an `image_preview` event.
    pub async fn image_preview(&mut self, image_data: impl Into<String>, iteration: u32) -> Result<()> {
        self.emit(Event::image_preview(image_data, iteration)).await
    }

    /// Emits the terminal `complete` event.
    pub async fn complete(&mut self, figure_id: impl Into<String>, artifact: &FinalArtifact) -> Result<()> {
        self.emit(Event::complete(figure_id, artifact)).await
    }

    /// Emits the terminal `error` event.
    pub async fn error(&mut self, message: impl Into<String>) -> Result<()> {
        self.emit(Event::error(message)).await
    }

    /// Returns true once a terminal event has been written.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of events delivered to the channel.
    #[must_use]
    pub const fn emitted(&self) -> usize {
        self.emitted
    }

    /// Returns true if the consumer has dropped its stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
