//! Push connection state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use herald_core::{ConnectionId, WriteFailure};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::sink::EventSink;

/// A registered one-way push channel to a single subscriber.
pub struct PushConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    owner_id: Option<String>,
    session_id: Option<String>,
    sink: EventSink,
    /// When this connection was established.
    pub connected_at: Instant,
    /// When the last frame was written successfully.
    last_activity: Mutex<Instant>,
    frames_sent: AtomicU64,
}

impl PushConnection {
    /// Create a new connection around an output sink.
    pub fn new(
        id: ConnectionId,
        owner_id: Option<String>,
        session_id: Option<String>,
        sink: EventSink,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            owner_id,
            session_id,
            sink,
            connected_at: now,
            last_activity: Mutex::new(now),
            frames_sent: AtomicU64::new(0),
        }
    }

    /// Authenticated principal this channel belongs to.
    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    /// Client-supplied correlation tag.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Write one encoded frame.
    ///
    /// Only a successful write refreshes the activity timestamp.
    pub fn send(&self, frame: Bytes) -> Result<(), WriteFailure> {
        self.sink.write(frame)?;
        self.touch();
        let _ = self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Refresh the activity timestamp.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// When the last successful write happened.
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Time elapsed between the last successful write and `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    /// Close the output sink. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.sink.close()
    }

    /// Whether the output sink can no longer accept frames.
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    /// Frames written successfully over the connection's lifetime.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for PushConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConnection")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("session_id", &self.session_id)
            .field("frames_sent", &self.frames_sent())
            .finish_non_exhaustive()
    }
}
