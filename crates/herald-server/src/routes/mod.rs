//! HTTP boundary: routes, CORS and shared handler state.

pub mod send;
pub mod stream;
pub mod webhook;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::health::{self, HealthResponse};
use crate::push::PushService;

/// Request header carrying the authenticated principal.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Request header carrying the client's session tag.
pub const SESSION_ID_HEADER: &str = "x-session-id";
/// Response header echoing the new connection id.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Push engine.
    pub push: Arc<PushService>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

/// Build the router with every route, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            CACHE_CONTROL,
            HeaderName::from_static(SESSION_ID_HEADER),
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(CONNECTION_ID_HEADER)]);

    Router::new()
        .route("/sse", get(stream::open_stream))
        .route("/sse/send", post(send::send_event))
        .route("/webhooks/example", post(webhook::receive_webhook))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error body `{"error": message}` with the given status.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.push.connection_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}
