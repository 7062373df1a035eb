//! The consumer side of a run's event channel.

use super::sse;
use crate::core::Event;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A lazy, finite, non-restartable sequence of run events.
///
/// Ends after the terminal event once the producing run has finished.
/// Dropping the stream cancels the run cooperatively: the producer stops at
/// its next emit.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Event>,
}

impl EventStream {
    pub(crate) const fn new(rx: mpsc::Receiver<Event>) -> Self {
        Self { rx }
    }

    /// A stream holding exactly one event, with no producer behind it.
    #[must_use]
    pub fn single(event: Event) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh receiver: this cannot be full or closed.
        let _ = tx.try_send(event);
        Self { rx }
    }

    /// Waits for the next event.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Drains the stream to completion.
    pub async fn collect_all(self) -> Vec<Event> {
        self.collect().await
    }

    /// Maps the stream to server-sent-events frames (`data: <json>\n\n`).
    pub fn sse_frames(self) -> impl Stream<Item = String> + Send {
        self.map(|event| sse::frame(&event))
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
