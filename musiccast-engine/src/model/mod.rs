//! Model types for musiccast-engine

mod connection;
mod device_id;
mod failure;
mod snapshot;
mod view;

pub use connection::ConnectionState;
pub use device_id::{DeviceId, DeviceIdentity};
pub use failure::FailureRecord;
pub use snapshot::{DeviceSnapshot, InputSource, SoundProgram, TrackInfo, DEFAULT_MAX_VOLUME};
pub use view::DeviceView;
