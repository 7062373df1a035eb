//! Event emission for diagram runs.
//!
//! A run writes its progress through an [`EventEmitter`] into a bounded
//! channel; the caller reads it back as an [`EventStream`], optionally
//! framed for server-sent events. [`EventSink`]s observe the same events
//! for logging and testing.

mod emitter;
pub mod sse;
mod sink;
mod stream;

pub use emitter::EventEmitter;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
pub use stream::EventStream;
