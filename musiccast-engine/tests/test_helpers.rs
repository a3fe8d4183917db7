//! Helpers shared by the engine integration tests.
//!
//! Each test device is backed by a [`ScriptedTransport`]; the registry is
//! handed a closure factory that looks transports up by device id.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use musiccast_engine::testing::ScriptedTransport;
use musiccast_engine::{
    ApiError, DeviceConfig, DeviceId, DeviceIdentity, DeviceRegistry, DeviceTransport,
    EngineConfig,
};

/// Device config with a unique fake address
pub fn device(id: &str) -> DeviceConfig {
    let host = id.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    DeviceConfig::new(id, id.replace('_', " "), format!("10.0.0.{}", host.max(1)))
}

/// Registry whose devices talk to the given scripted transports
///
/// Devices without a transport fail to build one, as a bad address would.
pub fn registry(config: EngineConfig, transports: &[(&str, &ScriptedTransport)]) -> DeviceRegistry {
    let transports: HashMap<DeviceId, ScriptedTransport> = transports
        .iter()
        .map(|(id, transport)| (DeviceId::new(*id), (*transport).clone()))
        .collect();

    let factory = move |identity: &DeviceIdentity| -> Result<Arc<dyn DeviceTransport>, ApiError> {
        transports
            .get(&identity.id)
            .cloned()
            .map(|transport| Arc::new(transport) as Arc<dyn DeviceTransport>)
            .ok_or_else(|| ApiError::NetworkError(format!("no route to {}", identity.address)))
    };

    DeviceRegistry::new(config, factory).expect("valid config")
}

/// Start one healthy device and wait until it is ready
pub async fn started_single(config: EngineConfig) -> (DeviceRegistry, ScriptedTransport, DeviceId) {
    let transport = ScriptedTransport::new();
    let registry = registry(config, &[("living_room", &transport)]);
    registry
        .start(vec![device("living_room")])
        .expect("start")
        .wait()
        .await;
    (registry, transport, DeviceId::new("living_room"))
}

/// Let the paused clock run for `duration`
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Advance in small steps until `condition` holds or `limit` passes
pub async fn advance_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < limit {
        if condition() {
            return true;
        }
        advance(step).await;
        waited += step;
    }
    condition()
}
