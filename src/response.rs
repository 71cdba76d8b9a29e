use std::time::Duration;

use http::{HeaderMap, StatusCode};
use reqwest::Response as ReqwestResponse;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// The outcome of a single request
///
/// Status and headers are captured when the response arrives and the body is
/// read fully into memory, which releases the pooled connection straight
/// away and lets the decode helpers be called any number of times.
///
/// A wrapper with no underlying response (the request failed before one was
/// received) reports status `0`, empty headers, and fails every body read
/// with [`Error::NilResponse`].
#[derive(Debug, Clone, Default)]
pub struct Response {
    status_code: u16,
    headers: HeaderMap,
    body: Body,
    timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
enum Body {
    #[default]
    Missing,
    Buffered(Vec<u8>),
    Failed(String),
}

impl Response {
    /// A wrapper with no underlying response
    pub fn empty() -> Self {
        Self::default()
    }

    /// A wrapper for a request that exceeded its timeout
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            status_code: StatusCode::REQUEST_TIMEOUT.as_u16(),
            timeout: Some(duration),
            ..Self::default()
        }
    }

    /// Capture a reqwest response, buffering its body.
    ///
    /// A timeout while reading the body is returned as an error, the same
    /// as a timeout before the headers arrived. Any other read failure is
    /// kept and reported by the decode helpers.
    pub async fn capture(response: ReqwestResponse, timeout: Duration) -> Result<Self> {
        let status_code = response.status().as_u16();
        let headers = response.headers().clone();

        let body = match response.bytes().await {
            Ok(bytes) => Body::Buffered(bytes.to_vec()),
            Err(e) if e.is_timeout() => return Err(Error::timeout(timeout)),
            Err(e) => {
                tracing::debug!(error = %e, "failed to buffer response body");
                Body::Failed(e.to_string())
            }
        };

        Ok(Self {
            status_code,
            headers,
            body,
            timeout: None,
        })
    }

    /// Build a wrapper from parts already in memory
    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code: status.as_u16(),
            headers,
            body: Body::Buffered(body.into()),
            timeout: None,
        }
    }

    /// Get the HTTP status code, or `0` if no response was received
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Get a response header value, or `""` if absent
    pub fn header(&self, name: &str) -> &str {
        if self.status_code == 0 {
            return "";
        }

        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    /// Get all response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Check if the request was classified as a timeout
    pub fn is_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    /// Get the buffered body bytes
    pub fn raw(&self) -> Result<&[u8]> {
        match &self.body {
            Body::Buffered(bytes) => Ok(bytes),
            Body::Failed(message) => Err(Error::Body(message.clone())),
            Body::Missing => Err(Error::NilResponse),
        }
    }

    /// Get the body as text
    pub fn text(&self) -> Result<String> {
        self.check_timeout()?;
        let bytes = self.raw()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Decode the body as JSON
    pub fn json<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.check_timeout()?;
        let value = serde_json::from_slice(self.raw()?)?;
        Ok(value)
    }

    /// Decode the body as XML
    pub fn xml<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.check_timeout()?;
        let value = quick_xml::de::from_reader(self.raw()?)?;
        Ok(value)
    }

    fn check_timeout(&self) -> Result<()> {
        match self.timeout {
            Some(duration) => Err(Error::timeout(duration)),
            None => Ok(()),
        }
    }
}
