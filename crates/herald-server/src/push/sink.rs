//! Bounded, closable output channel between a connection and its transport.
//!
//! [`EventSink`] is the write side held by the registry; [`EventStream`] is
//! the read side handed to the HTTP layer as the response body. Writes never
//! wait: a full buffer or a closed channel fails immediately.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use herald_core::WriteFailure;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Create a sink/stream pair buffering up to `capacity` frames.
pub fn channel(capacity: usize) -> (EventSink, EventStream) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (
        EventSink {
            tx: Mutex::new(Some(tx)),
            capacity,
        },
        EventStream { rx },
    )
}

/// Write side of a connection's output.
///
/// `write` and `close` serialize on the same lock, so a write racing a close
/// either lands before the close or fails with [`WriteFailure::Closed`].
pub struct EventSink {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    capacity: usize,
}

impl EventSink {
    /// Enqueue one encoded frame without waiting.
    pub fn write(&self, frame: Bytes) -> Result<(), WriteFailure> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(WriteFailure::Closed);
        };
        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => WriteFailure::Full {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => WriteFailure::Closed,
        })
    }

    /// Close the sink.
    ///
    /// Frames already buffered are still delivered, then the stream ends.
    /// Returns `false` if the sink was already closed.
    pub fn close(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    /// Whether the sink was closed locally or the stream was dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    /// Configured buffer capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Read side of a connection's output, consumed by the transport.
///
/// Dropping it (the remote side went away) makes the next write fail.
pub struct EventStream {
    rx: mpsc::Receiver<Bytes>,
}

impl EventStream {
    /// Wait for the next frame; `None` once the sink is closed and drained.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a buffered frame without waiting.
    pub fn try_next_frame(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Drain every buffered frame.
    pub fn drain(&mut self) -> Vec<Bytes> {
        std::iter::from_fn(|| self.try_next_frame()).collect()
    }
}

impl Stream for EventStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}
