//! Device view - what the state store holds per device

use musiccast_api::DeviceInfo;
use state_store::Snapshot;

use super::{ConnectionState, DeviceIdentity, DeviceSnapshot, FailureRecord};

/// Everything a consumer can observe about one device
///
/// `snapshot` is `None` until the first successful poll. Once present it is
/// retained across failures; `stale` tells whether it still reflects the
/// device and `available` whether the device can currently be controlled.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceView {
    pub identity: DeviceIdentity,
    pub connection: ConnectionState,
    pub snapshot: Option<DeviceSnapshot>,
    pub stale: bool,
    pub available: bool,
    pub info: Option<DeviceInfo>,
    pub failures: FailureRecord,
}

impl DeviceView {
    /// View of a device that has not been contacted yet
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            connection: ConnectionState::Disconnected,
            snapshot: None,
            stale: false,
            available: false,
            info: None,
            failures: FailureRecord::default(),
        }
    }

    /// Whether commands to this device fail without being queued
    ///
    /// Holds while offline, including the handshake of a reconnect attempt.
    pub fn rejects_commands(&self) -> bool {
        match self.connection {
            ConnectionState::Connecting => self.failures.consecutive_failures > 0,
            other => other.rejects_commands(),
        }
    }
}

impl Snapshot for DeviceView {
    fn diff(&self, previous: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.connection != previous.connection {
            fields.push("connection");
        }
        if self.stale != previous.stale {
            fields.push("stale");
        }
        if self.available != previous.available {
            fields.push("available");
        }
        if self.info != previous.info {
            fields.push("info");
        }
        if self.failures != previous.failures {
            fields.push("failures");
        }

        match (&self.snapshot, &previous.snapshot) {
            (Some(current), Some(before)) => fields.extend(current.diff(before)),
            (None, None) => {}
            _ => fields.push("snapshot"),
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use musiccast_api::{Features, PlayInfoResponse, StatusResponse};

    fn view() -> DeviceView {
        DeviceView::new(DeviceIdentity::new("den", "Den", "10.0.0.2", 80))
    }

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot::from_responses(
            &StatusResponse::default(),
            &PlayInfoResponse::default(),
            &Features::default(),
            "main",
        )
    }

    #[test]
    fn test_new_view_is_empty() {
        let view = view();
        assert_eq!(view.connection, ConnectionState::Disconnected);
        assert!(view.snapshot.is_none());
        assert!(!view.available);
        assert!(view.diff(&view.clone()).is_empty());
    }

    #[test]
    fn test_reconnect_handshake_rejects_commands() {
        let mut view = view();
        view.connection = ConnectionState::Connecting;
        assert!(!view.rejects_commands());

        view.failures.consecutive_failures = 3;
        assert!(view.rejects_commands());

        view.connection = ConnectionState::Retrying;
        assert!(view.rejects_commands());

        view.connection = ConnectionState::Degraded;
        assert!(!view.rejects_commands());
    }

    #[test]
    fn test_first_snapshot_reports_snapshot_field() {
        let before = view();
        let mut after = before.clone();
        after.connection = ConnectionState::Connected;
        after.available = true;
        after.snapshot = Some(snapshot());

        assert_eq!(after.diff(&before), vec!["connection", "available", "snapshot"]);
    }

    #[test]
    fn test_snapshot_fields_are_flattened() {
        let mut before = view();
        before.snapshot = Some(snapshot());
        let mut after = before.clone();
        if let Some(snapshot) = after.snapshot.as_mut() {
            snapshot.volume = 12;
        }
        after.stale = true;

        assert_eq!(after.diff(&before), vec!["stale", "volume"]);
    }
}
