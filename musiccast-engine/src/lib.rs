//! # MusicCast Engine
//!
//! Mirrors the live state of up to ten Yamaha MusicCast devices and
//! carries commands to them.
//!
//! Each device gets its own session and polling loop: one task that polls
//! on a fixed cadence, executes queued commands ahead of routine polls, and
//! backs off when the device goes offline. Sessions never share anything
//! but the state store, so one unreachable device never slows the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use musiccast_engine::{DeviceCommand, DeviceConfig, DeviceId, DeviceRegistry, EngineConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DeviceRegistry::with_http(EngineConfig::default())?;
//! let ready = registry.start(vec![
//!     DeviceConfig::new("living_room", "Living Room", "192.168.1.20"),
//! ])?;
//! ready.wait().await;
//!
//! let id = DeviceId::new("living_room");
//! if let Some(snapshot) = registry.current_snapshot(&id) {
//!     println!("{} at {}%", snapshot.input_name(), snapshot.volume_percent());
//! }
//!
//! let outcome = registry.issue_command(&id, DeviceCommand::VolumeUp(1)).await?;
//! println!("volume up: {}", outcome);
//!
//! let mut updates = registry.subscribe(&id)?;
//! while let Some(update) = updates.next().await {
//!     println!("{} changed {:?}", id, update.changed_fields);
//! }
//!
//! registry.shutdown(Duration::from_secs(10)).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The engine logs through `tracing`. Hosts without a subscriber of their
//! own can call [`logging::init_logging_from_env`].

pub mod backoff;
pub mod command;
pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod model;
pub mod polling;
pub mod queue;
pub mod registry;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use backoff::BackoffPolicy;
pub use command::{CommandOutcome, CommandTicket, DeviceCommand, PendingCommand, RejectReason};
pub use config::{DeviceConfig, DeviceEntry, DeviceFile, EngineConfig};
pub use error::{EngineError, Result};
pub use factory::{HttpTransportFactory, TransportFactory};
pub use model::{
    ConnectionState, DeviceId, DeviceIdentity, DeviceSnapshot, DeviceView, FailureRecord,
    InputSource, SoundProgram, TrackInfo,
};
pub use polling::PollingLoop;
pub use queue::{CommandQueue, CommandReceiver};
pub use registry::{DeviceRegistry, ReadySignal, ShutdownReport};
pub use session::{DeviceSession, PollOutcome};

// Re-export the pieces of the lower layers that appear in this crate's API
pub use musiccast_api::{
    ApiError, DeviceInfo, DeviceTransport, PlaybackState, PowerState, RepeatMode,
    TransportErrorKind,
};
pub use state_store::{ChangeEvent, ChangeFeed, Subscription, Update};
