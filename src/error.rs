use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::response::Response;

/// Result type for httpwrap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for httpwrap
#[derive(Error, Debug)]
pub enum Error {
    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The request could not be assembled (bad method, scheme or header)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport-level failure: refused connection, DNS, TLS handshake
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// JSON deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// XML deserialization errors
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// A PEM trust store could not be loaded
    #[error("Trust store load failed for {}: {message}", .path.display())]
    TrustStore { path: PathBuf, message: String },

    /// Read attempted on a wrapper that never received a response
    #[error("the response of request is nil")]
    NilResponse,

    /// The response body could not be buffered
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new timeout error
    pub fn timeout(duration: Duration) -> Self {
        Error::Timeout { duration }
    }

    /// Create a new invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }

    /// Create a new trust store error
    pub fn trust_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::TrustStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Classify a reqwest failure observed while executing a request
    pub(crate) fn from_execution(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Error::timeout(timeout)
        } else {
            Error::Network(err)
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this is a network error
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Check if the request failed before anything was sent
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::Url(_) | Error::InvalidRequest(_) | Error::Encode(_)
        )
    }

    /// Check if this is a body decoding error
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Json(_) | Error::Xml(_))
    }

    /// Check if this is a trust store error
    pub fn is_trust_store(&self) -> bool {
        matches!(self, Error::TrustStore { .. })
    }

    /// Get the underlying reqwest error if this is a network error
    pub fn as_network_error(&self) -> Option<&reqwest::Error> {
        match self {
            Error::Network(e) => Some(e),
            _ => None,
        }
    }

    /// The response wrapper that accompanies this failure.
    ///
    /// A timeout yields a wrapper flagged as timed out with status 408.
    /// Every other failure yields an empty wrapper (status 0).
    pub fn response(&self) -> Response {
        match self {
            Error::Timeout { duration } => Response::timed_out(*duration),
            _ => Response::empty(),
        }
    }

    /// Consume the error, returning its response wrapper
    pub fn into_response(self) -> Response {
        self.response()
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Error::InvalidRequest(format!("Invalid header name: {}", err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Error::InvalidRequest(format!("Invalid header value: {}", err))
    }
}

impl From<http::method::InvalidMethod> for Error {
    fn from(err: http::method::InvalidMethod) -> Self {
        Error::InvalidRequest(format!("Invalid method: {}", err))
    }
}
