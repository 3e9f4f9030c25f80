//! Explicitly owned push engine: registry, dispatcher, heartbeat, notifier.

use std::sync::Arc;
use std::time::Duration;

use herald_core::events::types;
use herald_core::frame;
use herald_core::{ConnectionId, HeraldError, PushEvent, Result};
use tracing::{info, warn};

use super::connection::PushConnection;
use super::dispatcher::Dispatcher;
use super::heartbeat::HeartbeatScheduler;
use super::notify::Notifier;
use super::registry::{ConnectionRegistry, DisconnectReason};
use super::sink::{self, EventStream};
use crate::metrics::SSE_EVENTS_DELIVERED_TOTAL;

/// Push engine tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushConfig {
    /// Heartbeat tick period.
    pub heartbeat_interval: Duration,
    /// Idle threshold for eviction.
    pub connection_timeout: Duration,
    /// Per-connection output buffer, in frames.
    pub channel_capacity: usize,
    /// Maximum number of live connections.
    pub max_connections: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(60),
            channel_capacity: 64,
            max_connections: 10_000,
        }
    }
}

/// A freshly opened connection: its id and the stream to hand to the transport.
pub struct OpenedConnection {
    /// Registry key of the new connection.
    pub id: ConnectionId,
    /// Encoded frames, starting with the `connection` handshake.
    pub stream: EventStream,
}

impl std::fmt::Debug for OpenedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The push engine a hosting process constructs once and shares.
pub struct PushService {
    config: PushConfig,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<Dispatcher>,
    heartbeat: Arc<HeartbeatScheduler>,
    notifier: Notifier,
}

impl PushService {
    /// Build a stopped engine. Call [`start`](Self::start) to run the heartbeat.
    pub fn new(config: PushConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry)));
        let heartbeat = Arc::new(HeartbeatScheduler::new(
            Arc::clone(&dispatcher),
            config.heartbeat_interval,
            config.connection_timeout,
        ));
        let notifier = Notifier::new(Arc::clone(&dispatcher));
        Self {
            config,
            registry,
            dispatcher,
            heartbeat,
            notifier,
        }
    }

    /// Open a connection for an optional owner and session tag.
    ///
    /// The `connection` handshake is written before the connection is
    /// registered, so it is always the first frame on the stream even while
    /// other callers broadcast. Fails once the engine has been shut down.
    pub fn open(
        &self,
        owner_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<OpenedConnection> {
        if self.heartbeat.is_stopped() {
            return Err(HeraldError::ShuttingDown);
        }
        let limit = self.config.max_connections;
        if self.registry.count() >= limit {
            warn!(limit, "rejecting push connection, limit reached");
            return Err(HeraldError::CapacityExceeded { limit });
        }

        let id = ConnectionId::new();
        let handshake = frame::encode(&PushEvent::handshake(&id))?;
        let (sink, stream) = sink::channel(self.config.channel_capacity);
        let conn = PushConnection::new(id.clone(), owner_id, session_id, sink);
        conn.send(handshake).map_err(HeraldError::Handshake)?;
        metrics::counter!(SSE_EVENTS_DELIVERED_TOTAL, "event_type" => types::CONNECTION).increment(1);
        self.registry.insert(Arc::new(conn))?;

        // A shutdown that drained the registry between the check above and
        // the insert would never see this connection.
        if self.heartbeat.is_stopped() {
            let _ = self
                .registry
                .remove_with_reason(&id, DisconnectReason::Shutdown);
            return Err(HeraldError::ShuttingDown);
        }

        info!(conn_id = %id, total = self.registry.count(), "push connection opened");
        Ok(OpenedConnection { id, stream })
    }

    /// Start the heartbeat. Returns `false` if it was already started.
    pub fn start(&self) -> bool {
        self.heartbeat.start()
    }

    /// Stop the heartbeat and evict every connection, ending their streams.
    pub fn shutdown(&self) -> usize {
        self.heartbeat.stop()
    }

    /// Engine configuration.
    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Shared connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Heartbeat scheduler.
    pub fn heartbeat(&self) -> &Arc<HeartbeatScheduler> {
        &self.heartbeat
    }

    /// Notification helpers bound to this engine.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.count()
    }
}

impl Default for PushService {
    fn default() -> Self {
        Self::new(PushConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use herald_core::FrameDecoder;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn service(max_connections: usize) -> PushService {
        PushService::new(PushConfig {
            max_connections,
            ..PushConfig::default()
        })
    }

    #[test]
    fn default_config() {
        let cfg = PushConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.connection_timeout, Duration::from_secs(60));
        assert_eq!(cfg.channel_capacity, 64);
        assert_eq!(cfg.max_connections, 10_000);
    }

    #[test]
    fn open_sends_handshake_first() {
        let svc = PushService::default();
        let mut opened = svc.open(Some("u1".into()), Some("s1".into())).unwrap();

        let chunk = opened.stream.try_next_frame().unwrap();
        let frame = FrameDecoder::new().push(&chunk).remove(0);
        assert_eq!(frame.event, "connection");
        assert_eq!(
            frame.json().unwrap(),
            json!({"message": "Connected", "connectionId": opened.id.as_str()})
        );

        let conn = svc.registry().get(&opened.id).unwrap();
        assert_eq!(conn.owner_id(), Some("u1"));
        assert_eq!(conn.session_id(), Some("s1"));
    }

    #[test]
    fn opened_connection_is_addressable() {
        let svc = PushService::default();
        let mut opened = svc.open(None, None).unwrap();
        let _ = opened.stream.try_next_frame();

        assert!(
            svc.dispatcher()
                .send_to(&opened.id, &PushEvent::new("update", json!({})))
                .unwrap()
        );
        assert!(opened.stream.try_next_frame().is_some());
    }

    #[test]
    fn ids_are_unique() {
        let svc = PushService::default();
        let a = svc.open(None, None).unwrap();
        let b = svc.open(None, None).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(svc.connection_count(), 2);
    }

    #[test]
    fn open_rejects_past_limit() {
        let svc = service(1);
        let _first = svc.open(None, None).unwrap();
        assert_matches!(
            svc.open(None, None),
            Err(HeraldError::CapacityExceeded { limit: 1 })
        );
        assert_eq!(svc.connection_count(), 1);
    }

    #[test]
    fn removal_frees_capacity() {
        let svc = service(1);
        let first = svc.open(None, None).unwrap();
        assert!(svc.registry().remove(&first.id));
        assert!(svc.open(None, None).is_ok());
    }

    #[tokio::test]
    async fn shutdown_ends_streams() {
        let svc = PushService::default();
        assert!(svc.start());
        let mut opened = svc.open(None, None).unwrap();

        assert_eq!(svc.shutdown(), 1);
        assert!(opened.stream.next_frame().await.is_some()); // handshake
        assert!(opened.stream.next_frame().await.is_none());
        assert!(!svc.heartbeat().is_running());
    }

    #[test]
    fn handshake_stays_first_under_concurrent_broadcast() {
        let svc = PushService::default();
        let done = AtomicBool::new(false);

        let first_events: Vec<String> = std::thread::scope(|s| {
            let _ = s.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let _ = svc
                        .dispatcher()
                        .broadcast(&PushEvent::new("news", json!({})));
                }
            });

            let first_events = (0..2000)
                .map(|_| {
                    let mut opened = svc.open(None, None).unwrap();
                    let _ = svc.registry().remove(&opened.id);
                    let chunk = opened.stream.try_next_frame().unwrap_or_default();
                    FrameDecoder::new()
                        .push(&chunk)
                        .first()
                        .map(|f| f.event.clone())
                        .unwrap_or_default()
                })
                .collect();
            done.store(true, Ordering::Relaxed);
            first_events
        });

        assert!(first_events.iter().all(|event| event == "connection"));
    }

    #[tokio::test]
    async fn open_after_shutdown_is_rejected() {
        let svc = PushService::default();
        assert!(svc.start());
        let _ = svc.shutdown();

        assert_matches!(svc.open(None, None), Err(HeraldError::ShuttingDown));
        assert_eq!(svc.connection_count(), 0);
    }

    #[test]
    fn opened_connection_debug_shows_id() {
        let svc = PushService::default();
        let opened = svc.open(None, None).unwrap();
        assert!(format!("{opened:?}").contains(opened.id.as_str()));
    }

    #[test]
    fn notifier_shares_registry() {
        let svc = PushService::default();
        let _opened = svc.open(Some("u1".into()), None).unwrap();
        let sent = svc
            .notifier()
            .notify_user("u1", crate::push::Notification::new("hi"))
            .unwrap();
        assert_eq!(sent, 1);
    }
}
