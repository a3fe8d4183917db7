//! Typed API for Yamaha MusicCast devices
//!
//! This crate sits on top of the private `musiccast-client` crate and
//! provides:
//!
//! - typed response bodies ([`StatusResponse`], [`PlayInfoResponse`],
//!   [`Features`], [`DeviceInfo`]) and the small value enums parsed from them
//! - typed control [`Command`]s rendered to endpoint + parameters
//! - the [`DeviceTransport`] trait, the only way the engine reaches a
//!   device, with an HTTP implementation in [`HttpTransport`]
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use musiccast_api::{DeviceTransport, HttpTransport};
//!
//! # async fn run() -> musiccast_api::Result<()> {
//! let transport = HttpTransport::new("192.168.1.40", 80, Duration::from_secs(10))?;
//! let status = transport.fetch_status().await?;
//! println!("volume {}", status.volume);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod service;
pub mod transport;
pub mod types;

pub use command::{Command, CommandRequest, PowerAction, TransportAction};
pub use error::{ApiError, Result, TransportErrorKind};
pub use service::{Service, MAIN_ZONE};
pub use transport::{DeviceTransport, HttpTransport};
pub use types::{
    friendly_input_name, friendly_sound_program_name, shuffle_from_wire, DeviceInfo, Features,
    PlayInfoResponse, PlaybackState, PowerState, RangeStep, RepeatMode, StatusResponse,
    SystemFeatures, SystemInput, ZoneFeatures,
};
