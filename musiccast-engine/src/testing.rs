//! In-memory device for tests
//!
//! [`ScriptedTransport`] behaves like a MusicCast receiver: status and play
//! info reflect the commands it has received. Tests can take it offline,
//! queue one-shot failures, add per-call latency, and inspect a log of
//! every call including how many calls were ever in flight at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use musiccast_api::{
    ApiError, CommandRequest, DeviceInfo, DeviceTransport, Features, PlayInfoResponse, RangeStep,
    StatusResponse, SystemFeatures, SystemInput, ZoneFeatures,
};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Kind of request a transport received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    DeviceInfo,
    Features,
    Status,
    PlayInfo,
    Command(CommandRequest),
}

/// One logged call with its execution window
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub call: TransportCall,
    pub started: Instant,
    pub finished: Instant,
}

/// Device state the transport serves
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    pub info: DeviceInfo,
    pub features: Features,
    pub status: StatusResponse,
    pub play_info: PlayInfoResponse,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self {
            info: DeviceInfo {
                model_name: "RX-V685".to_string(),
                device_id: "00A0DEABCDEF".to_string(),
                system_version: "2.87".to_string(),
                api_version: "2.09".to_string(),
            },
            features: Features {
                system: SystemFeatures {
                    input_list: vec![SystemInput {
                        id: "spotify".to_string(),
                    }],
                },
                zone: vec![ZoneFeatures {
                    id: "main".to_string(),
                    input_list: vec![
                        "hdmi1".to_string(),
                        "hdmi2".to_string(),
                        "spotify".to_string(),
                        "net_radio".to_string(),
                    ],
                    sound_program_list: vec![
                        "straight".to_string(),
                        "munich".to_string(),
                        "2ch_stereo".to_string(),
                    ],
                    range_step: vec![RangeStep {
                        id: "volume".to_string(),
                        min: 0,
                        max: 161,
                        step: 1,
                    }],
                }],
            },
            status: StatusResponse {
                power: "on".to_string(),
                volume: 60,
                max_volume: Some(161),
                mute: false,
                input: "spotify".to_string(),
                sound_program: Some("straight".to_string()),
            },
            play_info: PlayInfoResponse {
                playback: "play".to_string(),
                repeat: "off".to_string(),
                shuffle: "off".to_string(),
                artist: "Khruangbin".to_string(),
                album: "Mordechai".to_string(),
                track: "Time (You and I)".to_string(),
                play_time: 12,
                total_time: 245,
                albumart_url: String::new(),
                input: "spotify".to_string(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    device: Mutex<ScriptedDevice>,
    failures: Mutex<VecDeque<ApiError>>,
    latency: Mutex<Duration>,
    calls: Mutex<Vec<CallRecord>>,
    offline: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Scripted [`DeviceTransport`]; clones share state
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    /// A powered-on receiver playing Spotify
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(device: ScriptedDevice) -> Self {
        let transport = Self::default();
        *transport.inner.device.lock() = device;
        transport
    }

    /// While offline every call fails with a network error
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next call with `error`; queued errors are used in order
    pub fn fail_next(&self, error: ApiError) {
        self.inner.failures.lock().push_back(error);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = latency;
    }

    /// Change the device state behind the transport
    pub fn update(&self, f: impl FnOnce(&mut ScriptedDevice)) {
        f(&mut *self.inner.device.lock());
    }

    pub fn device(&self) -> ScriptedDevice {
        self.inner.device.lock().clone()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.inner.calls.lock().clone()
    }

    /// Number of read requests received
    pub fn fetch_count(&self) -> usize {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|record| !matches!(record.call, TransportCall::Command(_)))
            .count()
    }

    /// Command requests received, in order
    pub fn commands(&self) -> Vec<CommandRequest> {
        self.inner
            .calls
            .lock()
            .iter()
            .filter_map(|record| match &record.call {
                TransportCall::Command(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Calls executing right now
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were ever executing at the same time
    pub fn max_concurrency(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call<T>(
        &self,
        call: TransportCall,
        respond: impl FnOnce(&mut ScriptedDevice) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let started = Instant::now();
        let _in_flight = InFlight::enter(&self.inner);

        let latency = *self.inner.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let injected = self.inner.failures.lock().pop_front();
        let result = if let Some(error) = injected {
            Err(error)
        } else if self.inner.offline.load(Ordering::SeqCst) {
            Err(ApiError::NetworkError("connection refused".to_string()))
        } else {
            respond(&mut *self.inner.device.lock())
        };

        self.inner.calls.lock().push(CallRecord {
            call,
            started,
            finished: Instant::now(),
        });
        result
    }
}

/// Counts a call as in flight until dropped, including when it is cancelled
struct InFlight<'a> {
    inner: &'a Inner,
}

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceTransport for ScriptedTransport {
    async fn fetch_device_info(&self) -> musiccast_api::Result<DeviceInfo> {
        self.call(TransportCall::DeviceInfo, |device| Ok(device.info.clone()))
            .await
    }

    async fn fetch_features(&self) -> musiccast_api::Result<Features> {
        self.call(TransportCall::Features, |device| Ok(device.features.clone()))
            .await
    }

    async fn fetch_status(&self) -> musiccast_api::Result<StatusResponse> {
        self.call(TransportCall::Status, |device| Ok(device.status.clone()))
            .await
    }

    async fn fetch_play_info(&self) -> musiccast_api::Result<PlayInfoResponse> {
        self.call(TransportCall::PlayInfo, |device| Ok(device.play_info.clone()))
            .await
    }

    async fn send_command(&self, request: &CommandRequest) -> musiccast_api::Result<()> {
        let call = TransportCall::Command(request.clone());
        self.call(call, |device| apply_request(device, request))
            .await
    }
}

/// Mutate the device the way a receiver reacts to a command
fn apply_request(device: &mut ScriptedDevice, request: &CommandRequest) -> Result<(), ApiError> {
    let param = |key: &str| {
        request
            .params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    };
    let action = request
        .endpoint
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let max_volume = device.status.max_volume.unwrap_or(100);

    match action {
        "setPower" => {
            device.status.power = match param("power") {
                "toggle" if device.status.power == "on" => "standby".to_string(),
                "toggle" => "on".to_string(),
                other => other.to_string(),
            };
        }
        "setVolume" => {
            let step: u32 = param("step").parse().unwrap_or(1);
            device.status.volume = match param("volume") {
                "up" => (device.status.volume + step).min(max_volume),
                "down" => device.status.volume.saturating_sub(step),
                value => {
                    let volume: u32 = value
                        .parse()
                        .map_err(|_| ApiError::InvalidParameter(value.to_string()))?;
                    if volume > max_volume {
                        return Err(ApiError::InvalidParameter(format!("volume {}", volume)));
                    }
                    volume
                }
            };
        }
        "setMute" => device.status.mute = param("enable") == "true",
        "setInput" => {
            device.status.input = param("input").to_string();
            device.play_info.input = param("input").to_string();
        }
        "setSoundProgram" => device.status.sound_program = Some(param("program").to_string()),
        "setPlayback" => {
            device.play_info.playback = match param("playback") {
                "toggle" if device.play_info.playback == "play" => "pause".to_string(),
                "toggle" => "play".to_string(),
                "next" | "previous" => "play".to_string(),
                other => other.to_string(),
            };
        }
        "setRepeat" => device.play_info.repeat = param("repeat").to_string(),
        "setShuffle" => device.play_info.shuffle = param("shuffle").to_string(),
        other => {
            return Err(ApiError::InvalidParameter(format!("unknown action {}", other)));
        }
    }
    Ok(())
}
