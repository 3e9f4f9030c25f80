//! Error hierarchy for Herald.
//!
//! - [`HeraldError`]: failures surfaced to callers of the push engine
//! - [`FrameError`]: an event could not be turned into wire bytes
//! - [`WriteFailure`]: a connection's output sink refused a frame
//!
//! A missing connection is not an error: lookups that race a disconnect
//! report `false` / `0` instead.

use thiserror::Error;

use crate::ids::ConnectionId;

/// An event could not be encoded into a wire frame.
///
/// The failure is in the payload, never in the connection it was meant for.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload could not be serialized to JSON.
    #[error("failed to serialize event data: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A line-level field would break the line-delimited framing.
    #[error("invalid event {field}: {reason}")]
    InvalidField {
        /// Offending field (`type` or `id`).
        field: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// A write into a connection's output sink failed.
///
/// Recovered locally by evicting the connection; never propagated as a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriteFailure {
    /// The sink was closed locally or the remote side went away.
    #[error("output sink is closed")]
    Closed,

    /// The bounded buffer could not accept another frame.
    #[error("output buffer is full (capacity {capacity})")]
    Full {
        /// Configured buffer capacity.
        capacity: usize,
    },
}

impl WriteFailure {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Full { .. } => "full",
        }
    }
}

/// Top-level error type for push operations.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// A connection with this id is already registered.
    #[error("connection id already registered: {0}")]
    DuplicateId(ConnectionId),

    /// The event could not be encoded.
    #[error(transparent)]
    Encoding(#[from] FrameError),

    /// The registry is at its configured connection limit.
    #[error("connection limit reached ({limit})")]
    CapacityExceeded {
        /// Configured maximum number of live connections.
        limit: usize,
    },

    /// The handshake could not be written to a new connection.
    #[error("handshake write failed: {0}")]
    Handshake(WriteFailure),

    /// The engine was shut down and accepts no new connections.
    #[error("push service is shutting down")]
    ShuttingDown,
}

/// Result type for push operations.
pub type Result<T> = std::result::Result<T, HeraldError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn duplicate_id_display() {
        let err = HeraldError::DuplicateId(ConnectionId::from("c1"));
        assert_eq!(err.to_string(), "connection id already registered: c1");
    }

    #[test]
    fn frame_error_converts_into_herald_error() {
        let frame = FrameError::InvalidField {
            field: "type",
            reason: "must not be empty",
        };
        let err: HeraldError = frame.into();
        assert_matches!(err, HeraldError::Encoding(FrameError::InvalidField { field: "type", .. }));
    }

    #[test]
    fn encoding_error_is_transparent() {
        let err = HeraldError::from(FrameError::InvalidField {
            field: "id",
            reason: "must not contain line breaks",
        });
        assert_eq!(err.to_string(), "invalid event id: must not contain line breaks");
    }

    #[test]
    fn serialize_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: FrameError = json_err.into();
        assert_matches!(err, FrameError::Serialize(_));
    }

    #[test]
    fn write_failure_kinds() {
        assert_eq!(WriteFailure::Closed.kind(), "closed");
        assert_eq!(WriteFailure::Full { capacity: 8 }.kind(), "full");
        assert_eq!(
            WriteFailure::Full { capacity: 8 }.to_string(),
            "output buffer is full (capacity 8)"
        );
    }

    #[test]
    fn capacity_display() {
        let err = HeraldError::CapacityExceeded { limit: 3 };
        assert_eq!(err.to_string(), "connection limit reached (3)");
    }

    #[test]
    fn lifecycle_error_display() {
        assert_eq!(
            HeraldError::Handshake(WriteFailure::Closed).to_string(),
            "handshake write failed: output sink is closed"
        );
        assert_eq!(
            HeraldError::ShuttingDown.to_string(),
            "push service is shutting down"
        );
    }
}
