//! Settings types.
//!
//! JSON keys are camelCase and every struct is `#[serde(default)]`, so a
//! settings file only needs the keys it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeraldSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Push connection settings.
    pub push: PushSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl HeraldSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.push.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "push.heartbeatIntervalMs must be greater than 0".into(),
            ));
        }
        if self.push.connection_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "push.connectionTimeoutMs must be greater than 0".into(),
            ));
        }
        if self.push.channel_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "push.channelCapacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Maximum number of simultaneously open push connections.
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 10_000,
        }
    }
}

/// Push connection lifecycle settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Heartbeat tick period in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Idle threshold in milliseconds after which a connection is evicted.
    pub connection_timeout_ms: u64,
    /// Per-connection output buffer, in frames.
    pub channel_capacity: usize,
}

impl PushSettings {
    /// Heartbeat tick period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Idle eviction threshold.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30_000,
            connection_timeout_ms: 60_000,
            channel_capacity: 64,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
