//! Building one transport per configured device

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use musiccast_api::{
    ApiError, CommandRequest, DeviceInfo, DeviceTransport, Features, HttpTransport,
    PlayInfoResponse, StatusResponse,
};

use crate::model::DeviceIdentity;

/// Creates the transport a device session talks through
///
/// Any `Fn(&DeviceIdentity) -> Result<Arc<dyn DeviceTransport>>` closure is
/// a factory, which keeps tests free of boilerplate.
pub trait TransportFactory: Send + Sync {
    fn create(&self, identity: &DeviceIdentity) -> musiccast_api::Result<Arc<dyn DeviceTransport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&DeviceIdentity) -> musiccast_api::Result<Arc<dyn DeviceTransport>> + Send + Sync,
{
    fn create(&self, identity: &DeviceIdentity) -> musiccast_api::Result<Arc<dyn DeviceTransport>> {
        self(identity)
    }
}

/// Production factory: one [`HttpTransport`] per device
#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self, identity: &DeviceIdentity) -> musiccast_api::Result<Arc<dyn DeviceTransport>> {
        let transport = HttpTransport::new(&identity.address, identity.port, self.timeout)?
            .with_zone(identity.zone.clone());
        Ok(Arc::new(transport))
    }
}

/// Stand-in transport for a device whose address could not be used
///
/// Every call fails, so the device stays offline and its reconnect attempts settle at
/// the backoff cap.
#[derive(Debug, Clone)]
pub(crate) struct UnusableTransport {
    reason: String,
}

impl UnusableTransport {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> musiccast_api::Result<T> {
        Err(ApiError::NetworkError(self.reason.clone()))
    }
}

#[async_trait]
impl DeviceTransport for UnusableTransport {
    async fn fetch_device_info(&self) -> musiccast_api::Result<DeviceInfo> {
        self.fail()
    }

    async fn fetch_features(&self) -> musiccast_api::Result<Features> {
        self.fail()
    }

    async fn fetch_status(&self) -> musiccast_api::Result<StatusResponse> {
        self.fail()
    }

    async fn fetch_play_info(&self) -> musiccast_api::Result<PlayInfoResponse> {
        self.fail()
    }

    async fn send_command(&self, _request: &CommandRequest) -> musiccast_api::Result<()> {
        self.fail()
    }
}
