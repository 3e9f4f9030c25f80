//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Build a handle without installing it globally.
///
/// Metrics recorded through the `metrics` macros will not show up in it;
/// used where a process-wide recorder is already installed or unwanted.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Render Prometheus text format from a handle.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Push connections opened total (counter).
pub const SSE_CONNECTIONS_TOTAL: &str = "sse_connections_total";
/// Push connections removed total (counter, labels: reason).
pub const SSE_DISCONNECTIONS_TOTAL: &str = "sse_disconnections_total";
/// Live push connections (gauge).
pub const SSE_CONNECTIONS_ACTIVE: &str = "sse_connections_active";
/// Frames written successfully (counter, labels: event_type).
pub const SSE_EVENTS_DELIVERED_TOTAL: &str = "sse_events_delivered_total";
/// Failed frame writes (counter, labels: kind).
pub const SSE_WRITE_FAILURES_TOTAL: &str = "sse_write_failures_total";
/// Heartbeat ticks completed (counter).
pub const SSE_HEARTBEAT_TICKS_TOTAL: &str = "sse_heartbeat_ticks_total";
