//! Private HTTP client for Yamaha MusicCast devices
//!
//! MusicCast speakers and receivers expose the "Extended Control" API:
//! plain HTTP GET requests under `/YamahaExtendedControl/v1/` answering
//! with JSON bodies that always carry a `response_code`. This crate owns
//! only that wire concern: URL construction, the request timeout, HTTP
//! status handling and `response_code` checking. It does not retry.

mod error;

pub use error::ClientError;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;
use url::Url;

/// Path prefix shared by every Extended Control endpoint
pub const API_PREFIX: &str = "YamahaExtendedControl/v1/";

/// Default HTTP port of MusicCast devices
pub const DEFAULT_PORT: u16 = 80;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Convenience alias for client results
pub type Result<T> = std::result::Result<T, ClientError>;

/// A minimal client bound to a single MusicCast device
#[derive(Debug, Clone)]
pub struct MusicCastClient {
    http: reqwest::Client,
    device_url: Url,
    api_url: Url,
}

impl MusicCastClient {
    /// Create a client for `address:port` with the default timeout
    pub fn new(address: &str, port: u16) -> Result<Self> {
        Self::with_timeout(address, port, DEFAULT_TIMEOUT)
    }

    /// Create a client for `address:port` with a custom request timeout
    pub fn with_timeout(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ClientError::InvalidAddress("empty address".to_string()));
        }

        let device_url = Url::parse(&format!("http://{}:{}/", address, port))
            .map_err(|e| ClientError::InvalidAddress(format!("{}: {}", address, e)))?;
        Self::from_base_url(device_url, timeout)
    }

    /// Create a client from an explicit device base URL (scheme + host + port)
    ///
    /// Mostly useful for pointing the client at a local mock server.
    pub fn from_base_url(device_url: Url, timeout: Duration) -> Result<Self> {
        let api_url = device_url
            .join(API_PREFIX)
            .map_err(|e| ClientError::InvalidAddress(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            device_url,
            api_url,
        })
    }

    /// The device root URL, e.g. `http://192.168.1.20:80/`
    pub fn device_url(&self) -> &Url {
        &self.device_url
    }

    /// Resolve a device-relative path (such as album art) to an absolute URL
    ///
    /// Absolute URLs are returned unchanged; empty input yields `None`.
    pub fn resolve(&self, path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }
        self.device_url.join(path).ok().map(|u| u.to_string())
    }

    /// Issue a GET against `endpoint` (relative to the API prefix)
    ///
    /// Returns the decoded JSON body once `response_code` has been
    /// verified to be zero.
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut url = self
            .api_url
            .join(endpoint)
            .map_err(|e| ClientError::InvalidAddress(e.to_string()))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        trace!(url = %url, "MusicCast request");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http(status.as_u16()));
        }

        let body: Value = response.json().await?;
        check_response_code(&body)?;
        Ok(body)
    }

    /// Issue a GET and deserialize the body into `T`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let body = self.get(endpoint, params).await?;
        serde_json::from_value(body).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

/// Verify the `response_code` field of a MusicCast reply
///
/// A body without the field is treated as an error, matching the
/// device firmware which always includes it.
pub fn check_response_code(body: &Value) -> Result<()> {
    match body.get("response_code").and_then(Value::as_i64) {
        Some(0) => Ok(()),
        Some(code) => Err(ClientError::ResponseCode(code)),
        None => Err(ClientError::ResponseCode(-1)),
    }
}
