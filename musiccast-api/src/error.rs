use musiccast_client::ClientError;
use thiserror::Error;

/// High-level API errors for MusicCast operations
///
/// Abstracts the HTTP client details into the categories the rest of the
/// SDK reasons about: the device could not be reached, it took too long,
/// it answered with something we could not read, or it refused the request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network communication error
    ///
    /// Connection refused, host unreachable, DNS failure or a non-200
    /// HTTP status from the device web server.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Response parsing error
    ///
    /// The device answered but the body did not have the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The device reported a non-zero `response_code`
    #[error("Device error: response code {0}")]
    ResponseCode(i64),

    /// Invalid parameter value
    ///
    /// Returned both for locally detected bad arguments and for device
    /// response codes 3 (invalid zone/parameter) and 4 (invalid value).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Coarse classification of transport failures, kept in failure records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection refused, unreachable, reset
    Network,
    /// Request exceeded its deadline
    Timeout,
    /// Body could not be decoded
    Malformed,
    /// Device answered with an error code
    Device,
    /// Device or caller rejected a parameter
    InvalidParameter,
}

impl ApiError {
    /// Whether the failure is worth retrying later
    pub fn is_transient(&self) -> bool {
        !matches!(self, ApiError::InvalidParameter(_))
    }

    /// Classification used by failure bookkeeping
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            ApiError::NetworkError(_) => TransportErrorKind::Network,
            ApiError::Timeout => TransportErrorKind::Timeout,
            ApiError::ParseError(_) => TransportErrorKind::Malformed,
            ApiError::ResponseCode(_) => TransportErrorKind::Device,
            ApiError::InvalidParameter(_) => TransportErrorKind::InvalidParameter,
        }
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<ClientError> for ApiError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Network(msg) => ApiError::NetworkError(msg),
            ClientError::Http(status) => ApiError::NetworkError(format!("HTTP {}", status)),
            ClientError::Timeout => ApiError::Timeout,
            ClientError::Parse(msg) => ApiError::ParseError(msg),
            ClientError::ResponseCode(3) => {
                ApiError::InvalidParameter("invalid zone or parameter (response code 3)".to_string())
            }
            ClientError::ResponseCode(4) => {
                ApiError::InvalidParameter("invalid parameter value (response code 4)".to_string())
            }
            ClientError::ResponseCode(code) => ApiError::ResponseCode(code),
            ClientError::InvalidAddress(msg) => ApiError::NetworkError(msg),
        }
    }
}
