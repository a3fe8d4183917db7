//! Error types for the MusicCast HTTP client

use thiserror::Error;

/// Errors that can occur while talking to a MusicCast device
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, reset, etc.
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The request did not complete within the client timeout
    #[error("Request timed out")]
    Timeout,

    /// The device answered with a non-200 HTTP status
    #[error("HTTP status {0}")]
    Http(u16),

    /// The body was not the JSON shape we expected
    #[error("JSON parsing error: {0}")]
    Parse(String),

    /// The device answered but reported a non-zero `response_code`
    #[error("Device response code {0}")]
    ResponseCode(i64),

    /// The configured address cannot form a device URL
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),
}

impl ClientError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Response codes 3 and 4 mean the request itself was wrong
    /// (bad zone / bad value); everything network-shaped is transient.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Network(_) | ClientError::Timeout | ClientError::Http(_) => true,
            ClientError::Parse(_) => true,
            ClientError::ResponseCode(code) => !matches!(code, 3 | 4),
            ClientError::InvalidAddress(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout
        } else if error.is_decode() {
            ClientError::Parse(error.to_string())
        } else if let Some(status) = error.status() {
            ClientError::Http(status.as_u16())
        } else {
            ClientError::Network(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::Network("refused".to_string()).is_transient());
        assert!(ClientError::Timeout.is_transient());
        assert!(ClientError::Http(503).is_transient());
        assert!(ClientError::ResponseCode(5).is_transient());
        assert!(!ClientError::ResponseCode(3).is_transient());
        assert!(!ClientError::ResponseCode(4).is_transient());
        assert!(!ClientError::InvalidAddress("".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ClientError::Timeout.to_string(), "Request timed out");
        assert_eq!(ClientError::ResponseCode(4).to_string(), "Device response code 4");
        assert_eq!(
            ClientError::Network("connection refused".to_string()).to_string(),
            "Network/HTTP error: connection refused"
        );
    }
}
