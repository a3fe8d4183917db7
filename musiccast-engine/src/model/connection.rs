//! Connection state of a device session

use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness of one device as seen by its session
///
/// Owned by the device's session and mutated only from its own loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No contact attempted yet
    #[default]
    Disconnected,
    /// Connect handshake in progress
    Connecting,
    /// Last poll succeeded
    Connected,
    /// Recent failures below the offline threshold; snapshot is stale
    Degraded,
    /// Offline; probing on the backoff schedule
    Retrying,
}

impl ConnectionState {
    /// Whether a session in this state has a live connection to the device
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Degraded)
    }

    /// Whether commands issued in this state fail without being queued
    pub fn rejects_commands(&self) -> bool {
        matches!(self, ConnectionState::Retrying)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Degraded => "degraded",
            ConnectionState::Retrying => "retrying",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_states() {
        assert!(ConnectionState::Connected.is_online());
        assert!(ConnectionState::Degraded.is_online());
        assert!(!ConnectionState::Connecting.is_online());
        assert!(!ConnectionState::Retrying.is_online());
        assert!(!ConnectionState::default().is_online());
    }

    #[test]
    fn test_only_retrying_rejects_commands() {
        assert!(ConnectionState::Retrying.rejects_commands());
        assert!(!ConnectionState::Degraded.rejects_commands());
        assert!(!ConnectionState::Connecting.rejects_commands());
    }
}
