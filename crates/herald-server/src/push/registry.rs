//! Live set of push connections.
//!
//! Every mutation and every full-set traversal goes through one lock.
//! Lookups return snapshots, so callers iterate without holding it and
//! concurrent inserts or removals never invalidate an iteration in flight.

use std::collections::HashMap;
use std::sync::Arc;

use herald_core::{ConnectionId, HeraldError, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info};

use super::connection::PushConnection;
use crate::metrics::{SSE_CONNECTIONS_ACTIVE, SSE_CONNECTIONS_TOTAL, SSE_DISCONNECTIONS_TOTAL};

/// Targeting rule. Set fields are ANDed; an empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionFilter {
    /// Match a single connection.
    pub connection_id: Option<ConnectionId>,
    /// Match connections owned by this principal.
    pub owner_id: Option<String>,
    /// Match connections carrying this session tag.
    pub session_id: Option<String>,
}

impl ConnectionFilter {
    /// Filter matching every live connection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching one connection id.
    pub fn connection(id: impl Into<ConnectionId>) -> Self {
        Self {
            connection_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Filter matching every connection of an owner.
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }

    /// Filter matching every connection with a session tag.
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// Narrow this filter to a session tag.
    #[must_use]
    pub fn and_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Whether no field is set.
    pub fn is_broadcast(&self) -> bool {
        self.connection_id.is_none() && self.owner_id.is_none() && self.session_id.is_none()
    }

    /// Whether a connection satisfies every set field.
    pub fn matches(&self, conn: &PushConnection) -> bool {
        self.connection_id.as_ref().is_none_or(|id| *id == conn.id)
            && self
                .owner_id
                .as_deref()
                .is_none_or(|owner| conn.owner_id() == Some(owner))
            && self
                .session_id
                .as_deref()
                .is_none_or(|session| conn.session_id() == Some(session))
    }
}

/// Why a connection left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Explicit removal, including the remote side closing the stream.
    Removed,
    /// A frame write failed.
    WriteFailed,
    /// No successful write within the idle timeout.
    IdleTimeout,
    /// Full teardown at process exit.
    Shutdown,
}

impl DisconnectReason {
    /// Label used for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::WriteFailed => "write_failed",
            Self::IdleTimeout => "idle_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Owns the live set of push connections.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<PushConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection.
    ///
    /// Fails with [`HeraldError::DuplicateId`] if the id is already live; the
    /// existing entry is left untouched.
    pub fn insert(&self, connection: Arc<PushConnection>) -> Result<()> {
        {
            let mut conns = self.connections.lock();
            if conns.contains_key(&connection.id) {
                return Err(HeraldError::DuplicateId(connection.id.clone()));
            }
            let _ = conns.insert(connection.id.clone(), Arc::clone(&connection));
        }

        metrics::counter!(SSE_CONNECTIONS_TOTAL).increment(1);
        metrics::gauge!(SSE_CONNECTIONS_ACTIVE).increment(1.0);
        debug!(
            conn_id = %connection.id,
            owner_id = connection.owner_id(),
            session_id = connection.session_id(),
            "push connection registered"
        );
        Ok(())
    }

    /// Remove a connection and close its sink.
    ///
    /// Returns whether an entry was present; only one caller wins per id.
    pub fn remove(&self, connection_id: &str) -> bool {
        self.remove_with_reason(connection_id, DisconnectReason::Removed)
    }

    /// [`remove`](Self::remove) with the reason recorded in logs and metrics.
    pub fn remove_with_reason(&self, connection_id: &str, reason: DisconnectReason) -> bool {
        let removed = self.connections.lock().remove(connection_id);
        let Some(conn) = removed else {
            return false;
        };
        Self::retire(&conn, reason);
        true
    }

    /// Remove every connection, closing each sink. Returns how many were live.
    pub fn drain(&self, reason: DisconnectReason) -> usize {
        let drained: Vec<_> = self.connections.lock().drain().map(|(_, c)| c).collect();
        for conn in &drained {
            Self::retire(conn, reason);
        }
        drained.len()
    }

    fn retire(conn: &PushConnection, reason: DisconnectReason) {
        // Already closed when the remote side dropped the stream first.
        let _ = conn.close();
        metrics::counter!(SSE_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
        metrics::gauge!(SSE_CONNECTIONS_ACTIVE).decrement(1.0);
        info!(
            conn_id = %conn.id,
            reason = reason.as_str(),
            frames_sent = conn.frames_sent(),
            age_secs = conn.age().as_secs(),
            "push connection removed"
        );
    }

    /// Fetch a single live connection.
    pub fn get(&self, connection_id: &str) -> Option<Arc<PushConnection>> {
        self.connections.lock().get(connection_id).cloned()
    }

    /// Snapshot of every live connection matching `filter`.
    ///
    /// The returned list can be iterated any number of times. Connections
    /// inserted after the call are not included; ones removed after it stay
    /// in the list but their sinks are closed.
    pub fn lookup(&self, filter: &ConnectionFilter) -> Vec<Arc<PushConnection>> {
        let conns = self.connections.lock();
        if let Some(id) = &filter.connection_id {
            return conns
                .get(id)
                .filter(|c| filter.matches(c))
                .cloned()
                .into_iter()
                .collect();
        }
        conns
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect()
    }

    /// Every connection owned by `owner_id`.
    pub fn by_owner(&self, owner_id: &str) -> Vec<Arc<PushConnection>> {
        self.lookup(&ConnectionFilter::owner(owner_id))
    }

    /// Every live connection.
    pub fn snapshot(&self) -> Vec<Arc<PushConnection>> {
        self.lookup(&ConnectionFilter::all())
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether a connection id is live.
    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.lock().contains_key(connection_id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
