//! `POST /sse/send`: push an application event to a target.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use herald_core::events::types;
use herald_core::{HeraldError, PushEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use super::{AppState, error_response};

/// Request body.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Event payload.
    pub data: Option<Value>,
    /// Optional event id forwarded to clients.
    pub id: Option<String>,
    /// Who receives the event (defaults to broadcast).
    pub target: Option<SendTarget>,
}

/// Targeting rule in a send request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTarget {
    /// `user`, `connection` or `broadcast`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Owner to target when `kind` is `user`.
    pub user_id: Option<String>,
    /// Connection to target when `kind` is `connection`.
    pub connection_id: Option<String>,
}

/// Response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    /// Always `true`; zero deliveries is not a failure.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Connections that accepted the event.
    pub sent_count: usize,
    /// Live connections after delivery.
    pub connection_count: usize,
}

/// Deliver an event and report how many connections received it.
pub async fn send_event(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let event_type = request
        .event_type
        .filter(|t| !t.is_empty())
        .ok_or("Missing required fields: type and data");
    let data = request
        .data
        .filter(|d| !d.is_null())
        .ok_or("Missing required fields: type and data");
    let (event_type, data) = match (event_type, data) {
        (Ok(t), Ok(d)) => (t, d),
        (Err(msg), _) | (_, Err(msg)) => return error_response(StatusCode::BAD_REQUEST, msg),
    };
    if types::is_reserved(&event_type) {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("Event type '{event_type}' is reserved"),
        );
    }

    let mut event = PushEvent::new(event_type, data);
    if let Some(id) = request.id {
        event = event.with_id(id);
    }

    let dispatcher = state.push.dispatcher();
    let target = request.target.unwrap_or_default();
    let result = match target.kind.as_deref() {
        Some("user") => match target.user_id {
            Some(user_id) => dispatcher.send_to_user(&user_id, &event),
            None => Ok(0),
        },
        Some("connection") => match target.connection_id {
            Some(connection_id) => dispatcher.send_to(&connection_id, &event).map(usize::from),
            None => Ok(0),
        },
        _ => dispatcher.broadcast(&event),
    };

    match result {
        Ok(sent_count) => {
            debug!(event_type = %event.event_type, sent_count, "event sent via http");
            Json(SendResponse {
                success: true,
                message: format!("Event sent to {sent_count} connection(s)"),
                sent_count,
                connection_count: state.push.connection_count(),
            })
            .into_response()
        }
        Err(e @ HeraldError::Encoding(_)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => {
            error!(error = %e, "failed to send event");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}
