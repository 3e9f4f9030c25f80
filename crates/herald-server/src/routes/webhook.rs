//! `POST /webhooks/example`: translate inbound webhooks into notifications.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use herald_core::Result as HeraldResult;
use herald_core::events::types;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use super::{AppState, error_response};
use crate::push::{Notification, Notifier};

/// Inbound webhook body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Webhook event name, e.g. `order.status_changed`.
    pub event: String,
    /// User the event concerns, if any.
    pub user_id: Option<String>,
    /// Event-specific payload.
    #[serde(default)]
    pub data: Value,
}

/// Accept a webhook and fan it out as notifications.
pub async fn receive_webhook(
    State(state): State<AppState>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };

    match translate(state.push.notifier(), &payload) {
        Ok(delivered) => Json(json!({ "success": true, "delivered": delivered })).into_response(),
        Err(e) => {
            error!(event = %payload.event, error = %e, "webhook processing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Map a webhook onto notifier calls. Returns the number of deliveries.
pub fn translate(notifier: &Notifier, payload: &WebhookPayload) -> HeraldResult<usize> {
    let user_id = payload.user_id.as_deref().filter(|u| !u.is_empty());
    let data = &payload.data;

    match (payload.event.as_str(), user_id) {
        ("user.updated", Some(user_id)) => notifier.notify_user(
            user_id,
            Notification::new("Your profile has been updated")
                .with_type(types::UPDATE)
                .with_data(data.clone()),
        ),
        ("system.maintenance", _) => notifier.notify_all(
            Notification::new("System maintenance scheduled")
                .with_type(types::ALERT)
                .with_field("severity", "warning")
                .with_field("scheduledTime", data["scheduledTime"].clone()),
        ),
        ("order.status_changed", Some(user_id)) => {
            let order_id = &data["orderId"];
            let status = &data["status"];
            notifier.notify_user(
                user_id,
                Notification::new(format!(
                    "Order {} is now {}",
                    display(order_id),
                    display(status)
                ))
                .with_field("orderId", order_id.clone())
                .with_field("status", status.clone()),
            )
        }
        ("user.updated" | "order.status_changed", None) => {
            info!(event = %payload.event, "webhook without userId, nothing to notify");
            Ok(0)
        }
        (event, _) => {
            info!(event, "unknown webhook event");
            Ok(0)
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "unknown".to_owned(),
        other => other.to_string(),
    }
}
