//! Error types for the musiccast-engine crate.
//!
//! Transport failures never surface here: sessions absorb them into their
//! failure records. These errors cover configuration and lifecycle misuse.

use crate::model::DeviceId;

/// Errors that can occur while configuring or driving the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested device is not registered
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// More devices were configured than the engine supports
    #[error("Too many devices: {count} configured, at most {max} supported")]
    TooManyDevices {
        /// Number of enabled devices in the configuration
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// The same device id appears twice
    #[error("Duplicate device id: {0}")]
    DuplicateDevice(DeviceId),

    /// `start` was called on a registry that is already running
    #[error("Registry already started")]
    AlreadyStarted,

    /// The registry has not been started
    #[error("Registry not started")]
    NotStarted,

    /// Some device loops did not exit within the shutdown timeout
    #[error("Shutdown timed out; aborted {} device loop(s)", aborted.len())]
    ShutdownTimeout {
        /// Devices whose loops had to be aborted
        aborted: Vec<DeviceId>,
    },

    /// Reading the device file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device file is not valid JSON
    #[error("Invalid device file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for results that can return an EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::TooManyDevices { count: 12, max: 10 };
        assert_eq!(
            err.to_string(),
            "Too many devices: 12 configured, at most 10 supported"
        );

        let err = EngineError::ShutdownTimeout {
            aborted: vec![DeviceId::new("den"), DeviceId::new("office")],
        };
        assert_eq!(err.to_string(), "Shutdown timed out; aborted 2 device loop(s)");
    }

    #[test]
    fn test_json_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: EngineError = parse.unwrap_err().into();
        assert!(matches!(err, EngineError::Json(_)));
    }
}
