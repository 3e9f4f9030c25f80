//! `HeraldServer`: the push engine behind an Axum HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::push::PushService;
use crate::routes::{self, AppState};
use crate::shutdown::ShutdownCoordinator;

/// The main Herald server.
pub struct HeraldServer {
    config: ServerConfig,
    push: Arc<PushService>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl HeraldServer {
    /// Create a new server. Nothing is bound until [`listen`](Self::listen).
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let push = Arc::new(PushService::new(config.push_config()));
        Self {
            config,
            push,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        routes::router(AppState {
            push: Arc::clone(&self.push),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        })
    }

    /// Bind, start the heartbeat and serve until shutdown.
    ///
    /// Returns the bound address and the serving task. When the shutdown
    /// token fires, every push connection is evicted so open streams end and
    /// the listener can drain.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let _ = self.push.start();

        let app = self.router();
        let push = Arc::clone(&self.push);
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    token.cancelled().await;
                    let evicted = push.shutdown();
                    info!(evicted, "closing push streams for shutdown");
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });

        info!(%addr, "herald listening");
        Ok((addr, handle))
    }

    /// Get the push engine.
    pub fn push(&self) -> &Arc<PushService> {
        &self.push
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
