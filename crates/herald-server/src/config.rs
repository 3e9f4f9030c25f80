//! Server configuration.

use std::time::Duration;

use herald_settings::HeraldSettings;
use serde::{Deserialize, Serialize};

use crate::push::PushConfig;

/// Configuration for the Herald server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent push connections.
    pub max_connections: usize,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Idle timeout in milliseconds before a connection is evicted.
    pub connection_timeout_ms: u64,
    /// Per-connection output buffer, in frames.
    pub channel_capacity: usize,
}

impl ServerConfig {
    /// Push engine settings derived from this config.
    pub fn push_config(&self) -> PushConfig {
        PushConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            channel_capacity: self.channel_capacity,
            max_connections: self.max_connections,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&HeraldSettings::default())
    }
}

impl From<&HeraldSettings> for ServerConfig {
    fn from(settings: &HeraldSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            heartbeat_interval_ms: settings.push.heartbeat_interval_ms,
            connection_timeout_ms: settings.push.connection_timeout_ms,
            channel_capacity: settings.push.channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "0.0.0.0");
    }

    #[test]
    fn default_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 3000);
    }

    #[test]
    fn default_intervals() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval_ms, 30_000);
        assert_eq!(cfg.connection_timeout_ms, 60_000);
    }

    #[test]
    fn push_config_converts_millis() {
        let cfg = ServerConfig {
            heartbeat_interval_ms: 1500,
            connection_timeout_ms: 4000,
            channel_capacity: 3,
            max_connections: 7,
            ..ServerConfig::default()
        };
        let push = cfg.push_config();
        assert_eq!(push.heartbeat_interval, Duration::from_millis(1500));
        assert_eq!(push.connection_timeout, Duration::from_secs(4));
        assert_eq!(push.channel_capacity, 3);
        assert_eq!(push.max_connections, 7);
    }

    #[test]
    fn from_settings() {
        let mut settings = HeraldSettings::default();
        settings.server.port = 8080;
        settings.push.channel_capacity = 16;
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.channel_capacity, 16);
    }

    #[test]
    fn bind_addr() {
        let cfg = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.channel_capacity, cfg.channel_capacity);
    }
}
