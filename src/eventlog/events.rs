//! Event types for the append-only proxy log.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Security- and failure-relevant events recorded by the proxy.
///
/// Each event is serialized as one JSON line in the log file for its kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProxyEvent {
    /// A request was rejected because its host matched the blocklist.
    Blocked {
        /// The full target URL of the rejected request.
        url: String,
    },

    /// An upstream fetch failed before any response was received.
    UpstreamUnavailable {
        /// The target URL of the failed fetch.
        url: String,
        /// Error message from the transport.
        message: String,
    },

    /// An origin response body could not be read to completion.
    CaptureFailed {
        /// The target URL whose response was being captured.
        url: String,
        /// Error message from the body read.
        message: String,
    },

    /// A tunnel could not be established or its upgrade failed.
    TunnelFailed {
        /// The `host:port` target of the tunnel.
        target: String,
        /// Error message.
        message: String,
    },
}

/// Which log file an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Blocked-request events.
    Blocked,
    /// Everything that went wrong.
    Error,
}

impl ProxyEvent {
    /// The log file kind this event is appended to.
    pub fn kind(&self) -> EventKind {
        match self {
            ProxyEvent::Blocked { .. } => EventKind::Blocked,
            ProxyEvent::UpstreamUnavailable { .. }
            | ProxyEvent::CaptureFailed { .. }
            | ProxyEvent::TunnelFailed { .. } => EventKind::Error,
        }
    }

    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}

/// Wrapper for serializing events with an ISO8601 timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a ProxyEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_serialization() {
        let event = ProxyEvent::Blocked {
            url: "http://blocked.example/path".to_string(),
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"event\":\"blocked\""));
        assert!(json.contains("\"url\":\"http://blocked.example/path\""));
        assert!(json.contains("\"ts\""));
    }

    #[test]
    fn test_upstream_unavailable_serialization() {
        let event = ProxyEvent::UpstreamUnavailable {
            url: "http://origin.example/".to_string(),
            message: "connection refused".to_string(),
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"event\":\"upstream_unavailable\""));
        assert!(json.contains("\"message\":\"connection refused\""));
    }

    #[test]
    fn test_tunnel_failed_serialization() {
        let event = ProxyEvent::TunnelFailed {
            target: "origin.example:443".to_string(),
            message: "dial timeout".to_string(),
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"event\":\"tunnel_failed\""));
        assert!(json.contains("\"target\":\"origin.example:443\""));
    }

    #[test]
    fn test_event_kinds() {
        let blocked = ProxyEvent::Blocked { url: String::new() };
        assert_eq!(blocked.kind(), EventKind::Blocked);

        let capture = ProxyEvent::CaptureFailed {
            url: String::new(),
            message: String::new(),
        };
        assert_eq!(capture.kind(), EventKind::Error);

        let tunnel = ProxyEvent::TunnelFailed {
            target: String::new(),
            message: String::new(),
        };
        assert_eq!(tunnel.kind(), EventKind::Error);
    }
}
