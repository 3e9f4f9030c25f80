//! `GET /sse`: open a push stream.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use herald_core::{ConnectionId, HeraldError};
use tracing::{debug, error};

use super::{AppState, CONNECTION_ID_HEADER, SESSION_ID_HEADER, USER_ID_HEADER, error_response};
use crate::push::{ConnectionRegistry, EventStream};

/// Open a push connection and stream its frames as the response body.
///
/// The owner comes from `x-user-id`, the session tag from `x-session-id`.
/// The new connection id is echoed in `x-connection-id` and in the
/// `connection` handshake event.
pub async fn open_stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let owner_id = header_value(&headers, USER_ID_HEADER);
    let session_id = header_value(&headers, SESSION_ID_HEADER);

    let opened = match state.push.open(owner_id, session_id) {
        Ok(opened) => opened,
        Err(e @ (HeraldError::CapacityExceeded { .. } | HeraldError::ShuttingDown)) => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string());
        }
        Err(e) => {
            error!(error = %e, "failed to open push connection");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    let id = opened.id.clone();
    let body = DisconnectOnDrop {
        inner: opened.stream,
        registry: Arc::clone(state.push.registry()),
        id: opened.id,
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        .header(CONNECTION_ID_HEADER, id.as_str())
        .body(Body::from_stream(body))
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to build stream response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Response body that removes its connection once the transport drops it.
///
/// This forwards client disconnects into the registry; the heartbeat's idle
/// timeout remains the backstop when a drop is never observed.
struct DisconnectOnDrop {
    inner: EventStream,
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl Stream for DisconnectOnDrop {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for DisconnectOnDrop {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            debug!(conn_id = %self.id, "client closed push stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_value_trims_and_skips_empty() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(USER_ID_HEADER, HeaderValue::from_static(" u1 "));
        let _ = headers.insert(SESSION_ID_HEADER, HeaderValue::from_static(""));
        assert_eq!(header_value(&headers, USER_ID_HEADER).as_deref(), Some("u1"));
        assert_eq!(header_value(&headers, SESSION_ID_HEADER), None);
        assert_eq!(header_value(&headers, "x-missing"), None);
    }

    #[test]
    fn dropping_body_removes_connection() {
        let push = crate::push::PushService::default();
        let opened = push.open(None, None).unwrap();
        let body = DisconnectOnDrop {
            inner: opened.stream,
            registry: Arc::clone(push.registry()),
            id: opened.id.clone(),
        };
        assert!(push.registry().contains(&opened.id));
        drop(body);
        assert!(!push.registry().contains(&opened.id));
    }
}
