//! Per-device failure bookkeeping

use std::time::Duration;

use musiccast_api::TransportErrorKind;
use tokio::time::Instant;

/// Consecutive failures of one device
///
/// Reset on any successful poll or command. `backoff` holds the nominal
/// (unjittered) reconnect interval while the device is offline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureRecord {
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_error: Option<TransportErrorKind>,
    pub backoff: Option<Duration>,
}

impl FailureRecord {
    /// Count one more failure
    pub fn record(&mut self, kind: TransportErrorKind, at: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(at);
        self.last_error = Some(kind);
    }

    /// Forget the failure streak
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the streak has reached `threshold`
    pub fn is_offline(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold
    }

    /// Kind of the last failure, `Network` when none was recorded
    pub fn last_error_or_network(&self) -> TransportErrorKind {
        self.last_error.unwrap_or(TransportErrorKind::Network)
    }
}
