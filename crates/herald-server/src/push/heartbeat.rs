//! Periodic liveness probe and stale connection reaper.
//!
//! Each tick walks a snapshot of the registry. Connections idle past the
//! timeout are evicted without a send attempt; every other connection gets a
//! `ping` event, and a failed ping evicts through the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use herald_core::PushEvent;
use herald_core::events::types;
use herald_core::frame;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::PushConnection;
use super::dispatcher::Dispatcher;
use super::registry::DisconnectReason;
use crate::metrics::SSE_HEARTBEAT_TICKS_TOTAL;

/// Outcome of a single heartbeat tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Connections that accepted the ping.
    pub pinged: usize,
    /// Connections whose ping write failed (evicted by the dispatcher).
    pub failed: usize,
    /// Connections evicted for exceeding the idle timeout.
    pub idle_evicted: usize,
}

impl TickReport {
    /// Total connections that left the registry during the tick.
    pub fn evicted(&self) -> usize {
        self.failed + self.idle_evicted
    }
}

/// Recurring heartbeat over every live connection.
pub struct HeartbeatScheduler {
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatScheduler {
    /// Create a stopped scheduler.
    pub fn new(dispatcher: Arc<Dispatcher>, interval: Duration, timeout: Duration) -> Self {
        Self {
            dispatcher,
            interval,
            timeout,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Idle threshold.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one heartbeat pass.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let registry = self.dispatcher.registry();
        let now = Instant::now();

        let ping = PushEvent::ping(chrono::Utc::now().timestamp_millis());
        let frame = match frame::encode(&ping) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode heartbeat ping, skipping tick");
                return report;
            }
        };

        let mut stale = Vec::new();
        for conn in registry.snapshot() {
            let idle = conn.idle_for(now);
            if idle > self.timeout {
                debug!(conn_id = %conn.id, idle_ms = idle.as_millis(), "connection idle past timeout");
                stale.push(conn);
                continue;
            }
            if self.dispatcher.deliver(&conn, types::PING, frame.clone()) {
                report.pinged += 1;
            } else {
                report.failed += 1;
            }
        }

        report.idle_evicted = self.evict_idle(&stale);

        metrics::counter!(SSE_HEARTBEAT_TICKS_TOTAL).increment(1);
        if report.evicted() > 0 {
            info!(
                idle = report.idle_evicted,
                failed = report.failed,
                remaining = registry.count(),
                "cleaned up stale push connections"
            );
        } else {
            debug!(pinged = report.pinged, "heartbeat tick");
        }
        report
    }

    /// Evict connections found idle earlier in the tick.
    ///
    /// Each one is checked again first: a send that succeeded since the
    /// snapshot keeps the connection. Ids another path already removed are
    /// skipped.
    fn evict_idle(&self, stale: &[Arc<PushConnection>]) -> usize {
        let registry = self.dispatcher.registry();
        stale
            .iter()
            .filter(|conn| conn.idle_for(Instant::now()) > self.timeout)
            .filter(|conn| registry.remove_with_reason(&conn.id, DisconnectReason::IdleTimeout))
            .count()
    }

    /// Start the recurring tick on the current runtime.
    ///
    /// The first tick fires one interval after start. Returns `false` if the
    /// scheduler is already running or was stopped.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if task.is_some() || self.cancel.is_cancelled() {
            return false;
        }
        let scheduler = Arc::clone(self);
        *task = Some(tokio::spawn(scheduler.run()));
        info!(
            interval_ms = self.interval.as_millis(),
            timeout_ms = self.timeout.as_millis(),
            "heartbeat started"
        );
        true
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.tick();
                }
                () = self.cancel.cancelled() => break,
            }
        }
        debug!("heartbeat loop exited");
    }

    /// Whether the recurring tick is running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the timer and evict every remaining connection.
    ///
    /// Returns how many connections were evicted. Full teardown, meant for
    /// process exit.
    pub fn stop(&self) -> usize {
        self.cancel.cancel();
        let _ = self.task.lock().take();
        let evicted = self
            .dispatcher
            .registry()
            .drain(DisconnectReason::Shutdown);
        info!(evicted, "heartbeat stopped");
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::registry::ConnectionRegistry;
    use crate::push::sink::{self, EventStream};
    use herald_core::{ConnectionId, FrameDecoder};

    const INTERVAL: Duration = Duration::from_secs(30);
    const TIMEOUT: Duration = Duration::from_secs(60);

    fn setup() -> Arc<HeartbeatScheduler> {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(ConnectionRegistry::new())));
        Arc::new(HeartbeatScheduler::new(dispatcher, INTERVAL, TIMEOUT))
    }

    fn open(scheduler: &HeartbeatScheduler, id: &str) -> EventStream {
        let (sink, stream) = sink::channel(8);
        let conn = PushConnection::new(ConnectionId::from(id), None, None, sink);
        scheduler
            .dispatcher
            .registry()
            .insert(Arc::new(conn))
            .unwrap();
        stream
    }

    fn registry(scheduler: &HeartbeatScheduler) -> &ConnectionRegistry {
        scheduler.dispatcher.registry()
    }

    fn events(stream: &mut EventStream) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        stream
            .drain()
            .iter()
            .flat_map(|chunk| decoder.push(chunk))
            .map(|f| f.event)
            .collect()
    }

    // ── tick ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn tick_pings_fresh_connections() {
        let scheduler = setup();
        let mut rx = open(&scheduler, "c1");

        let report = scheduler.tick();
        assert_eq!(report, TickReport { pinged: 1, failed: 0, idle_evicted: 0 });

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&rx.try_next_frame().unwrap());
        assert_eq!(frames[0].event, "ping");
        assert!(frames[0].json().unwrap()["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_evicted_without_send() {
        let scheduler = setup();
        let mut rx = open(&scheduler, "idle");
        time::advance(TIMEOUT + Duration::from_secs(1)).await;

        let report = scheduler.tick();

        assert_eq!(report.idle_evicted, 1);
        assert_eq!(report.pinged, 0);
        assert!(!registry(&scheduler).contains("idle"));
        // Sink closed with nothing written to it.
        assert!(rx.next_frame().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn connection_exactly_at_timeout_is_kept() {
        let scheduler = setup();
        let _rx = open(&scheduler, "edge");
        time::advance(TIMEOUT).await;

        let report = scheduler.tick();
        assert_eq!(report.pinged, 1);
        assert!(registry(&scheduler).contains("edge"));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_refreshes_activity() {
        let scheduler = setup();
        let _rx = open(&scheduler, "c1");

        time::advance(Duration::from_secs(45)).await;
        assert_eq!(scheduler.tick().pinged, 1);
        time::advance(Duration::from_secs(45)).await;
        // 90s since connect but only 45s since the last ping.
        assert_eq!(scheduler.tick().pinged, 1);
        assert!(registry(&scheduler).contains("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ping_evicts_once_and_does_not_abort_tick() {
        let scheduler = setup();
        let dead = open(&scheduler, "dead");
        let mut a = open(&scheduler, "a");
        let mut b = open(&scheduler, "b");
        drop(dead);

        let report = scheduler.tick();

        assert_eq!(report, TickReport { pinged: 2, failed: 1, idle_evicted: 0 });
        assert_eq!(report.evicted(), 1);
        assert_eq!(registry(&scheduler).count(), 2);
        assert_eq!(events(&mut a), vec!["ping"]);
        assert_eq!(events(&mut b), vec!["ping"]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_and_dead_connection_counted_once() {
        let scheduler = setup();
        let dead = open(&scheduler, "both");
        drop(dead);
        time::advance(TIMEOUT * 2).await;

        let report = scheduler.tick();
        assert_eq!(report.evicted(), 1);
        assert_eq!(report.idle_evicted, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_after_snapshot_keeps_connection() {
        let scheduler = setup();
        let mut rx = open(&scheduler, "c1");
        time::advance(TIMEOUT + Duration::from_secs(1)).await;
        let stale = registry(&scheduler).snapshot();
        assert!(stale[0].idle_for(Instant::now()) > TIMEOUT);

        // A send lands between the idle check and the eviction.
        assert!(
            scheduler
                .dispatcher
                .send_to("c1", &PushEvent::new("update", serde_json::json!({})))
                .unwrap()
        );

        assert_eq!(scheduler.evict_idle(&stale), 0);
        assert!(registry(&scheduler).contains("c1"));
        assert_eq!(events(&mut rx), vec!["update"]);
    }

    #[tokio::test(start_paused = true)]
    async fn evict_idle_skips_already_removed() {
        let scheduler = setup();
        let _rx = open(&scheduler, "c1");
        time::advance(TIMEOUT * 2).await;
        let stale = registry(&scheduler).snapshot();
        assert!(registry(&scheduler).remove("c1"));

        assert_eq!(scheduler.evict_idle(&stale), 0);
    }

    #[tokio::test]
    async fn tick_on_empty_registry() {
        let scheduler = setup();
        assert_eq!(scheduler.tick(), TickReport::default());
    }

    // ── lifecycle ───────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn started_scheduler_ticks_on_interval() {
        let scheduler = setup();
        let mut rx = open(&scheduler, "c1");
        assert!(scheduler.start());
        assert!(scheduler.is_running());

        // Nothing before the first interval elapses.
        time::sleep(INTERVAL - Duration::from_secs(1)).await;
        assert!(events(&mut rx).is_empty());

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(events(&mut rx), vec!["ping"]);

        time::sleep(INTERVAL).await;
        assert_eq!(events(&mut rx), vec!["ping"]);
        let _ = scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn background_tick_reaps_silent_connection() {
        let scheduler = setup();
        let _rx = open(&scheduler, "c1");
        assert!(scheduler.start());

        // Fill the buffer so the next ping fails.
        let conn = registry(&scheduler).get("c1").unwrap();
        while conn.send(bytes::Bytes::from_static(b"x")).is_ok() {}

        time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(registry(&scheduler).count(), 0);
        let _ = scheduler.stop();
    }

    #[tokio::test]
    async fn start_twice_is_noop() {
        let scheduler = setup();
        assert!(scheduler.start());
        assert!(!scheduler.start());
        let _ = scheduler.stop();
    }

    #[tokio::test]
    async fn stop_evicts_everything_and_prevents_restart() {
        let scheduler = setup();
        let mut a = open(&scheduler, "a");
        let _b = open(&scheduler, "b");
        assert!(scheduler.start());

        assert_eq!(scheduler.stop(), 2);
        assert_eq!(registry(&scheduler).count(), 0);
        assert!(a.next_frame().await.is_none());
        assert!(!scheduler.is_running());
        assert!(scheduler.is_stopped());
        assert!(!scheduler.start());
    }

    #[test]
    fn accessors() {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(ConnectionRegistry::new())));
        let scheduler = HeartbeatScheduler::new(dispatcher, INTERVAL, TIMEOUT);
        assert_eq!(scheduler.interval(), INTERVAL);
        assert_eq!(scheduler.timeout(), TIMEOUT);
        assert!(!scheduler.is_running());
    }
}
