//! Push events and the reserved protocol event types.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ids::ConnectionId;

/// Well-known event type labels.
///
/// [`CONNECTION`](types::CONNECTION) and [`PING`](types::PING) are protocol
/// events emitted by the server itself; application code must not reuse them.
pub mod types {
    /// Handshake sent once when a connection opens.
    pub const CONNECTION: &str = "connection";
    /// Heartbeat probe.
    pub const PING: &str = "ping";
    /// Human-readable notification.
    pub const NOTIFICATION: &str = "notification";
    /// Alert with a severity.
    pub const ALERT: &str = "alert";
    /// Real-time data update.
    pub const UPDATE: &str = "update";

    /// Protocol event types that application events may not use.
    pub const RESERVED: [&str; 2] = [CONNECTION, PING];

    /// Whether `event_type` is reserved for protocol events.
    pub fn is_reserved(event_type: &str) -> bool {
        RESERVED.contains(&event_type)
    }
}

/// A typed event destined for one or more push connections.
///
/// `data` is opaque to the server: the only contract is that it serializes
/// to single-line JSON. `id` is forwarded into the wire frame for client-side
/// dedup/resume and is never read internally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushEvent<T = Value> {
    /// Category label, also the push-protocol event name.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Arbitrary payload.
    pub data: T,
    /// Optional event identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl<T> PushEvent<T> {
    /// Create an event without an id.
    pub fn new(event_type: impl Into<String>, data: T) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            id: None,
        }
    }

    /// Attach an event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether this event uses a reserved protocol type.
    pub fn is_protocol_event(&self) -> bool {
        types::is_reserved(&self.event_type)
    }
}

impl PushEvent {
    /// Handshake telling the remote side its own connection id.
    pub fn handshake(connection_id: &ConnectionId) -> Self {
        Self::new(
            types::CONNECTION,
            json!({ "message": "Connected", "connectionId": connection_id }),
        )
    }

    /// Heartbeat probe stamped with a Unix-millisecond timestamp.
    pub fn ping(timestamp_ms: i64) -> Self {
        Self::new(types::PING, json!({ "timestamp": timestamp_ms }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_types() {
        assert!(types::is_reserved("connection"));
        assert!(types::is_reserved("ping"));
        assert!(!types::is_reserved("notification"));
        assert!(!types::is_reserved("Ping"));
    }

    #[test]
    fn handshake_payload() {
        let id = ConnectionId::from("c-1");
        let event = PushEvent::handshake(&id);
        assert_eq!(event.event_type, "connection");
        assert_eq!(event.data["message"], "Connected");
        assert_eq!(event.data["connectionId"], "c-1");
        assert!(event.id.is_none());
        assert!(event.is_protocol_event());
    }

    #[test]
    fn ping_payload() {
        let event = PushEvent::ping(1_700_000_000_000);
        assert_eq!(event.event_type, "ping");
        assert_eq!(event.data["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn with_id_sets_id() {
        let event = PushEvent::new("update", json!({})).with_id("42");
        assert_eq!(event.id.as_deref(), Some("42"));
        assert!(!event.is_protocol_event());
    }

    #[test]
    fn deserialize_uses_type_key() {
        let event: PushEvent =
            serde_json::from_str(r#"{"type":"alert","data":{"severity":"error"}}"#).unwrap();
        assert_eq!(event.event_type, "alert");
        assert_eq!(event.data["severity"], "error");
        assert!(event.id.is_none());
    }

    #[test]
    fn serialize_skips_missing_id() {
        let event = PushEvent::new("update", json!(1));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({"type": "update", "data": 1}));
    }

    #[test]
    fn typed_payload() {
        #[derive(Serialize)]
        struct Progress {
            done: u32,
        }
        let event = PushEvent::new("update", Progress { done: 3 });
        assert_eq!(event.data.done, 3);
    }
}
