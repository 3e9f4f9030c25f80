//! Event delivery against the connection registry.
//!
//! Delivery is best-effort: a failed write is treated as proof the
//! subscriber is gone, so the connection is evicted instead of retried.
//! The client reconnects and gets a fresh connection.

use std::sync::Arc;

use bytes::Bytes;
use herald_core::PushEvent;
use herald_core::Result;
use herald_core::frame;
use serde::Serialize;
use tracing::{debug, warn};

use super::connection::PushConnection;
use super::registry::{ConnectionFilter, ConnectionRegistry, DisconnectReason};
use crate::metrics::{SSE_EVENTS_DELIVERED_TOTAL, SSE_WRITE_FAILURES_TOTAL};

/// Sends events to one, some or all live connections.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over a shared registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher delivers against.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send an event to a single connection.
    ///
    /// Returns `Ok(false)` when the connection is not live or the write
    /// failed (the connection is then evicted). An encoding failure is
    /// returned as an error and leaves the connection untouched.
    pub fn send_to<T: Serialize>(&self, connection_id: &str, event: &PushEvent<T>) -> Result<bool> {
        let Some(conn) = self.registry.get(connection_id) else {
            debug!(conn_id = connection_id, event_type = %event.event_type, "send to unknown connection");
            return Ok(false);
        };
        let frame = frame::encode(event)?;
        Ok(self.deliver(&conn, &event.event_type, frame))
    }

    /// Send an event to every connection matching `filter`.
    ///
    /// The event is encoded once. Returns how many connections accepted it;
    /// partial delivery is normal.
    pub fn send_to_filtered<T: Serialize>(
        &self,
        filter: &ConnectionFilter,
        event: &PushEvent<T>,
    ) -> Result<usize> {
        let frame = frame::encode(event)?;
        let targets = self.registry.lookup(filter);
        let delivered = targets
            .iter()
            .filter(|conn| self.deliver(conn, &event.event_type, frame.clone()))
            .count();
        debug!(
            event_type = %event.event_type,
            recipients = targets.len(),
            delivered,
            "dispatched event"
        );
        Ok(delivered)
    }

    /// Send an event to every live connection.
    pub fn broadcast<T: Serialize>(&self, event: &PushEvent<T>) -> Result<usize> {
        self.send_to_filtered(&ConnectionFilter::all(), event)
    }

    /// Send an event to every connection owned by `owner_id`.
    pub fn send_to_user<T: Serialize>(&self, owner_id: &str, event: &PushEvent<T>) -> Result<usize> {
        self.send_to_filtered(&ConnectionFilter::owner(owner_id), event)
    }

    /// Write an already-encoded frame, evicting the connection on failure.
    pub(crate) fn deliver(&self, conn: &PushConnection, event_type: &str, frame: Bytes) -> bool {
        match conn.send(frame) {
            Ok(()) => {
                metrics::counter!(SSE_EVENTS_DELIVERED_TOTAL, "event_type" => event_type.to_owned())
                    .increment(1);
                true
            }
            Err(failure) => {
                metrics::counter!(SSE_WRITE_FAILURES_TOTAL, "kind" => failure.kind()).increment(1);
                warn!(conn_id = %conn.id, event_type, error = %failure, "write failed, evicting connection");
                let _ = self
                    .registry
                    .remove_with_reason(&conn.id, DisconnectReason::WriteFailed);
                false
            }
        }
    }
}
