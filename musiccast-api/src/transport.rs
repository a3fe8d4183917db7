//! The request/response seam between the engine and a device
//!
//! The engine only ever talks to devices through [`DeviceTransport`].
//! Implementations make exactly one request per call and report failures
//! as errors; retry and backoff policy live above this layer.

use std::time::Duration;

use async_trait::async_trait;
use musiccast_client::MusicCastClient;
use tracing::debug;

use crate::command::CommandRequest;
use crate::error::Result;
use crate::service::{Service, MAIN_ZONE};
use crate::types::{DeviceInfo, Features, PlayInfoResponse, StatusResponse};

/// Request/response capability against one device
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// `system/getDeviceInfo`
    async fn fetch_device_info(&self) -> Result<DeviceInfo>;

    /// `system/getFeatures`
    async fn fetch_features(&self) -> Result<Features>;

    /// `{zone}/getStatus`
    async fn fetch_status(&self) -> Result<StatusResponse>;

    /// `netusb/getPlayInfo`
    async fn fetch_play_info(&self) -> Result<PlayInfoResponse>;

    /// Send one control command; `Ok(())` is the device's acknowledgement
    async fn send_command(&self, request: &CommandRequest) -> Result<()>;
}

/// [`DeviceTransport`] over HTTP using the MusicCast client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: MusicCastClient,
    zone: String,
}

impl HttpTransport {
    /// Create a transport for `address:port`, controlling the main zone
    pub fn new(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        let client = MusicCastClient::with_timeout(address, port, timeout)?;
        Ok(Self::with_client(client, MAIN_ZONE))
    }

    /// Create a transport from an existing client and zone
    pub fn with_client(client: MusicCastClient, zone: impl Into<String>) -> Self {
        Self {
            client,
            zone: zone.into(),
        }
    }

    /// Control `zone` instead of the current one
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    /// Zone this transport controls
    pub fn zone(&self) -> &str {
        &self.zone
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    async fn fetch_device_info(&self) -> Result<DeviceInfo> {
        let endpoint = Service::System.endpoint(&self.zone, "getDeviceInfo");
        Ok(self.client.get_json(&endpoint, &[]).await?)
    }

    async fn fetch_features(&self) -> Result<Features> {
        let endpoint = Service::System.endpoint(&self.zone, "getFeatures");
        Ok(self.client.get_json(&endpoint, &[]).await?)
    }

    async fn fetch_status(&self) -> Result<StatusResponse> {
        let endpoint = Service::Zone.endpoint(&self.zone, "getStatus");
        Ok(self.client.get_json(&endpoint, &[]).await?)
    }

    async fn fetch_play_info(&self) -> Result<PlayInfoResponse> {
        let endpoint = Service::NetUsb.endpoint(&self.zone, "getPlayInfo");
        let mut info: PlayInfoResponse = self.client.get_json(&endpoint, &[]).await?;
        info.albumart_url = self.client.resolve(&info.albumart_url).unwrap_or_default();
        Ok(info)
    }

    async fn send_command(&self, request: &CommandRequest) -> Result<()> {
        debug!(endpoint = %request.endpoint, params = ?request.params, "Sending command");
        self.client.get(&request.endpoint, &request.params).await?;
        Ok(())
    }
}
