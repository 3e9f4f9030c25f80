//! Semantic notification helpers over the dispatcher.
//!
//! Human-readable intents always carry `message` and an RFC 3339 UTC
//! `timestamp` (millisecond precision) in their payload.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use herald_core::events::types;
use herald_core::{PushEvent, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::dispatcher::Dispatcher;

/// Alert level carried in `alert` payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational.
    #[default]
    Info,
    /// Needs attention.
    Warning,
    /// Something failed.
    Error,
}

/// A human-readable notification before it is stamped and sent.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    message: String,
    event_type: String,
    fields: Map<String, Value>,
}

impl Notification {
    /// A `notification` event carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            event_type: types::NOTIFICATION.to_owned(),
            fields: Map::new(),
        }
    }

    /// Override the event type.
    #[must_use]
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Add one payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.fields.insert(key.into(), value.into());
        self
    }

    /// Merge extra payload data.
    ///
    /// Object keys are merged into the payload; `null` is ignored; any other
    /// value is nested under `data`.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        match data {
            Value::Object(map) => self.fields.extend(map),
            Value::Null => {}
            other => {
                let _ = self.fields.insert("data".to_owned(), other);
            }
        }
        self
    }

    /// Event type this notification will be sent as.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Build the event, stamping `message` and `timestamp`.
    ///
    /// The stamped keys win over extra fields of the same name.
    pub fn into_event(self, timestamp: &str) -> PushEvent {
        let mut data = self.fields;
        let _ = data.insert("message".to_owned(), Value::String(self.message));
        let _ = data.insert("timestamp".to_owned(), Value::String(timestamp.to_owned()));
        PushEvent::new(self.event_type, Value::Object(data))
    }
}

/// Current time in the stamped `timestamp` format.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Notification entry points used by request handlers and webhooks.
#[derive(Clone)]
pub struct Notifier {
    dispatcher: Arc<Dispatcher>,
}

impl Notifier {
    /// Create a notifier over a shared dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Send a notification to every connection of a user.
    pub fn notify_user(&self, user_id: &str, notification: Notification) -> Result<usize> {
        let event = notification.into_event(&timestamp_now());
        self.dispatcher.send_to_user(user_id, &event)
    }

    /// Send a notification to every live connection.
    pub fn notify_all(&self, notification: Notification) -> Result<usize> {
        let event = notification.into_event(&timestamp_now());
        self.dispatcher.broadcast(&event)
    }

    /// Send an arbitrary event to one connection, payload untouched.
    pub fn send_custom_event<T: Serialize>(
        &self,
        connection_id: &str,
        event_type: &str,
        data: T,
    ) -> Result<bool> {
        self.dispatcher
            .send_to(connection_id, &PushEvent::new(event_type, data))
    }

    /// Tell a user that something changed.
    pub fn send_update(&self, user_id: &str, update_type: &str, payload: Value) -> Result<usize> {
        let notification = Notification::new(format!("Update: {update_type}"))
            .with_type(types::UPDATE)
            .with_data(json!({ "updateType": update_type, "payload": payload }));
        self.notify_user(user_id, notification)
    }

    /// Raise an alert for a user.
    pub fn send_alert(&self, user_id: &str, message: &str, severity: AlertSeverity) -> Result<usize> {
        let notification = Notification::new(message)
            .with_type(types::ALERT)
            .with_data(json!({ "severity": severity }));
        self.notify_user(user_id, notification)
    }
}
