//! Server-push connection management.
//!
//! - [`sink`]: bounded per-connection output channel
//! - [`connection`]: one registered channel and its activity clock
//! - [`registry`]: the live set, filtered lookup
//! - [`dispatcher`]: targeted and fan-out delivery with eviction on failure
//! - [`heartbeat`]: periodic ping and idle reaper
//! - [`notify`]: human-readable notification helpers
//! - [`service`]: the owned engine tying them together

pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod notify;
pub mod registry;
pub mod service;
pub mod sink;

pub use connection::PushConnection;
pub use dispatcher::Dispatcher;
pub use heartbeat::{HeartbeatScheduler, TickReport};
pub use notify::{AlertSeverity, Notification, Notifier};
pub use registry::{ConnectionFilter, ConnectionRegistry, DisconnectReason};
pub use service::{OpenedConnection, PushConfig, PushService};
pub use sink::{EventSink, EventStream};
