//! Device identity types

use serde::{Deserialize, Serialize};
use std::fmt;

use musiccast_api::MAIN_ZONE;

/// Unique identifier for a configured MusicCast device
///
/// This is the key of the device entry in the device file, trimmed of
/// surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new DeviceId
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(id.trim().to_string())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}

/// Who a device is and where to reach it
///
/// Created from configuration at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: DeviceId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub zone: String,
}

impl DeviceIdentity {
    /// Identity for the main zone of `address:port`
    pub fn new(
        id: impl Into<DeviceId>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            port,
            zone: MAIN_ZONE.to_string(),
        }
    }

    /// Use a zone other than `main`
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.address, self.port)
    }
}
