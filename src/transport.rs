use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Request as ReqwestRequest, Response as ReqwestResponse};

use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::tls::TrustStore;

/// Idle connections kept per host by the pooled transport
pub const DEFAULT_MAX_IDLE_CONNS_PER_HOST: usize = 100;

/// How long an idle pooled connection is kept before being closed
pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Transport trait for HTTP operations
///
/// A transport dials, negotiates TLS, sends the request and returns the raw
/// response. Implementations must be safe to share across tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response
    ///
    /// Failures must be classified: a timeout is reported as
    /// [`Error::Timeout`], everything else as [`Error::Network`].
    async fn send(&self, request: ReqwestRequest) -> Result<ReqwestResponse>;

    /// The timeout this transport enforces per request
    fn timeout(&self) -> Duration;

    /// Get the transport name/type
    fn name(&self) -> &str;
}

/// Connection pool and TLS parameters for the default transport
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Maximum idle connections kept per host
    pub max_idle_per_host: usize,
    /// Idle connections older than this are closed
    pub pool_idle_timeout: Option<Duration>,
    /// Connection establishment timeout
    pub connect_timeout: Option<Duration>,
    /// Custom roots used instead of the built-in ones
    pub trust_store: Option<TrustStore>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: DEFAULT_MAX_IDLE_CONNS_PER_HOST,
            pool_idle_timeout: Some(DEFAULT_POOL_IDLE_TIMEOUT),
            connect_timeout: None,
            trust_store: None,
        }
    }
}

impl TransportConfig {
    /// Create a default transport configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// A default configuration that verifies servers against `trust_store`
    pub fn with_trust_store(trust_store: TrustStore) -> Self {
        Self {
            trust_store: Some(trust_store),
            ..Self::default()
        }
    }

    /// Set the maximum idle connections per host
    pub fn max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Set the pool idle timeout
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Default transport: a pooled reqwest client
pub struct PooledTransport {
    client: ReqwestClient,
    timeout: Duration,
}

impl PooledTransport {
    /// Build the transport from its configuration
    pub fn build(
        config: &TransportConfig,
        timeout: Duration,
        cookie_jar: Option<Arc<CookieJar>>,
    ) -> Result<Self> {
        let mut builder = ReqwestClient::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout);

        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if let Some(trust_store) = &config.trust_store {
            builder = trust_store.apply_to_builder(builder);
        }

        if let Some(cookie_jar) = cookie_jar {
            builder = builder.cookie_provider(cookie_jar);
        }

        let client = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build transport: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Get the underlying reqwest client
    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }
}

#[async_trait]
impl Transport for PooledTransport {
    async fn send(&self, request: ReqwestRequest) -> Result<ReqwestResponse> {
        self.client
            .execute(request)
            .await
            .map_err(|e| Error::from_execution(e, self.timeout))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn name(&self) -> &str {
        "pooled"
    }
}

impl std::fmt::Debug for PooledTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}
