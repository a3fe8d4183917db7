//! Configuration types for the musiccast-engine crate
//!
//! `EngineConfig` controls the timing and limits of every device session.
//! `DeviceFile` loads the list of devices from the JSON file written by the
//! integration's setup flow.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use musiccast_api::MAIN_ZONE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backoff::BackoffPolicy;
use crate::error::{EngineError, Result};
use crate::model::{DeviceId, DeviceIdentity};

/// Configuration for the DeviceRegistry and its sessions
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between routine polls
    /// Default: 5 seconds
    pub poll_interval: Duration,

    /// Fraction of the poll interval used to spread devices apart at startup
    /// Default: 0.2
    pub startup_jitter: f64,

    /// Deadline for every single request to a device
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Consecutive failures after which a device is considered offline
    /// Default: 3
    pub offline_threshold: u32,

    /// First reconnect interval
    /// Default: 5 seconds
    pub backoff_base: Duration,

    /// Longest reconnect interval
    /// Default: 60 seconds
    pub backoff_cap: Duration,

    /// Fraction of each reconnect interval applied as random jitter
    /// Default: 0.2
    pub backoff_jitter: f64,

    /// How long shutdown waits for device loops to exit
    /// Default: 10 seconds
    pub shutdown_timeout: Duration,

    /// Pending commands buffered per device
    /// Default: 32
    pub command_queue_capacity: usize,

    /// Delay before the confirming poll that follows an applied command
    /// Default: 500 milliseconds
    pub post_command_refresh: Duration,

    /// Maximum number of devices
    /// Default: 10
    pub max_devices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            startup_jitter: 0.2,
            request_timeout: Duration::from_secs(10),
            offline_threshold: 3,
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(60),
            backoff_jitter: 0.2,
            shutdown_timeout: Duration::from_secs(10),
            command_queue_capacity: 32,
            post_command_refresh: Duration::from_millis(500),
            max_devices: 10,
        }
    }
}

impl EngineConfig {
    /// Create a new EngineConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an EngineConfig that notices changes and outages quickly
    pub fn responsive() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Create an EngineConfig that keeps network traffic low
    pub fn conservative() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            backoff_base: Duration::from_secs(10),
            backoff_cap: Duration::from_secs(120),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(EngineError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(EngineError::Configuration(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.offline_threshold == 0 {
            return Err(EngineError::Configuration(
                "Offline threshold must be greater than 0".to_string(),
            ));
        }

        if self.backoff_base.is_zero() || self.backoff_base > self.backoff_cap {
            return Err(EngineError::Configuration(
                "Invalid backoff: base must be greater than 0 and at most the cap".to_string(),
            ));
        }

        for (name, fraction) in [
            ("Startup jitter", self.startup_jitter),
            ("Backoff jitter", self.backoff_jitter),
        ] {
            if !(0.0..1.0).contains(&fraction) {
                return Err(EngineError::Configuration(format!(
                    "{} must be in [0, 1)",
                    name
                )));
            }
        }

        if self.command_queue_capacity == 0 {
            return Err(EngineError::Configuration(
                "Command queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.max_devices == 0 {
            return Err(EngineError::Configuration(
                "Max devices must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Backoff policy described by this configuration
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.backoff_base, self.backoff_cap, self.backoff_jitter)
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_startup_jitter(mut self, fraction: f64) -> Self {
        self.startup_jitter = fraction;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_offline_threshold(mut self, failures: u32) -> Self {
        self.offline_threshold = failures;
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration, jitter: f64) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self.backoff_jitter = jitter;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity;
        self
    }

    pub fn with_post_command_refresh(mut self, delay: Duration) -> Self {
        self.post_command_refresh = delay;
        self
    }

    pub fn with_max_devices(mut self, max: usize) -> Self {
        self.max_devices = max;
        self
    }
}

/// One configured device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub enabled: bool,
    pub zone: String,
}

impl DeviceConfig {
    /// An enabled main-zone device on port 80
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            port: default_port(),
            enabled: true,
            zone: MAIN_ZONE.to_string(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The immutable identity this entry registers
    pub fn identity(&self) -> DeviceIdentity {
        let name = if self.name.trim().is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        };
        DeviceIdentity::new(self.id.clone(), name, self.address.trim(), self.port)
            .with_zone(self.zone.clone())
    }
}

/// On-disk device list
///
/// ```json
/// {
///   "devices": {
///     "living_room": { "name": "Living Room", "address": "192.168.1.20", "port": 80, "enabled": true }
///   }
/// }
/// ```
///
/// Addresses are not validated here; a device with an unusable address is
/// still registered and reported as unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFile {
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceEntry>,
}

/// A device entry as stored in the device file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_zone")]
    pub zone: String,
}

fn default_port() -> u16 {
    80
}

fn default_enabled() -> bool {
    true
}

fn default_zone() -> String {
    MAIN_ZONE.to_string()
}

impl DeviceFile {
    /// Read and parse a device file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let file = Self::from_json(&contents)?;
        debug!(path = %path.display(), devices = file.devices.len(), "Loaded device file");
        Ok(file)
    }

    /// Parse a device file from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Enabled devices, ordered by id
    pub fn device_configs(&self) -> Vec<DeviceConfig> {
        self.devices
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(id, entry)| DeviceConfig {
                id: DeviceId::new(id.as_str()),
                name: entry.name.clone(),
                address: entry.address.clone(),
                port: entry.port,
                enabled: entry.enabled,
                zone: entry.zone.clone(),
            })
            .collect()
    }
}
