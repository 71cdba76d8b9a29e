//! httpwrap - a small configurable HTTP client wrapper
//!
//! A [`Client`] collects configuration through chainable setters (headers,
//! query parameters, timeout, PEM trust store) and sends requests through a
//! connection-pooled transport that is built once, on first use. Every
//! request yields a [`Response`] whose body is buffered in memory and can be
//! decoded on demand as bytes, text, JSON or XML.
//!
//! ## Features
//!
//! - **Fluent configuration** with last-write-wins setters
//! - **Deterministic query strings** encoded in key order
//! - **Latched default timeout** of 10 seconds
//! - **Custom trust stores** loaded from PEM bundles
//! - **Cookie persistence** across requests
//! - **Timeout classification** with status 408 on the response wrapper
//!
//! ## Quick Start
//!
//! ```no_run
//! use httpwrap::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new();
//!     client.set_header("Accept", "application/json");
//!
//!     let response = client.get("https://httpbin.org/json").await?;
//!     println!("Status: {}", response.status_code());
//!     println!("Body: {}", response.text()?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod cookies;
pub mod error;
pub mod response;
pub mod timeout;
pub mod tls;
pub mod transport;

// Re-export main types for convenience
pub use client::Client;
pub use cookies::CookieJar;
pub use error::{Error, Result};
pub use response::Response;
pub use timeout::{TimeoutSetting, DEFAULT_REQUEST_TIMEOUT};
pub use tls::TrustStore;
pub use transport::{
    PooledTransport, Transport, TransportConfig, DEFAULT_MAX_IDLE_CONNS_PER_HOST,
    DEFAULT_POOL_IDLE_TIMEOUT,
};

// Re-export common HTTP types
pub use http::{HeaderMap, StatusCode};

// Re-export URL types
pub use url::Url;
