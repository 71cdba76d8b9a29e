use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::Method;
use reqwest::Request as ReqwestRequest;
use url::Url;

use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::response::Response;
use crate::timeout::TimeoutSetting;
use crate::tls::TrustStore;
use crate::transport::{PooledTransport, Transport, TransportConfig};

/// Configurable HTTP client
///
/// Configuration is mutated in place through chainable setters. Headers and
/// the query suffix are applied to every request. The timeout, transport
/// configuration and cookie jar are consumed once, when the first request
/// builds the pooled transport; changing them afterwards has no effect.
///
/// Every setter and every request takes `&mut self`, so a client cannot be
/// reconfigured while a request is in flight. Share one client behind a lock
/// or give each caller its own clone.
///
/// # Examples
///
/// ```no_run
/// use httpwrap::Client;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), httpwrap::Error> {
///     let mut client = Client::new();
///     client
///         .set_timeout(Duration::from_secs(5))
///         .set_header("Accept", "application/json")
///         .set_query([("page", "2")]);
///
///     let response = client.get("https://httpbin.org/get").await?;
///     println!("Status: {}", response.status_code());
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct Client {
    headers: BTreeMap<String, String>,
    query_string: String,
    timeout: TimeoutSetting,
    transport_config: TransportConfig,
    cookie_jar: Option<Arc<CookieJar>>,
    transport: Option<Arc<dyn Transport>>,
}

impl Client {
    /// Create a new client with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client that sends through an already built transport.
    ///
    /// The client counts as built: timeout, transport configuration and
    /// cookie jar setters are ignored.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            timeout: TimeoutSetting::Explicit(transport.timeout()),
            transport: Some(transport),
            ..Self::default()
        }
    }

    /// Set the request timeout. Zero clears it.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        if self.warn_if_built("timeout") {
            return self;
        }
        self.timeout = TimeoutSetting::from_duration(timeout);
        self
    }

    /// Set a single request header
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Merge headers into the configured set, overwriting existing keys
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace the query suffix appended by `get`, `post`, `put` and `delete`.
    ///
    /// Pairs are encoded in key order, so the suffix does not depend on the
    /// iteration order of the input. An empty input clears the suffix.
    pub fn set_query<I, K, V>(&mut self, query: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: BTreeMap<String, String> = query
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        self.query_string = if pairs.is_empty() {
            String::new()
        } else {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&pairs)
                .finish();
            format!("?{}", encoded)
        };
        self
    }

    /// Trust exactly the certificates in a PEM bundle.
    ///
    /// Replaces the whole transport configuration with a default one that
    /// carries the new trust store.
    pub fn set_pem_certificate(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let trust_store = TrustStore::from_pem_file(path)?;
        tracing::debug!(certificates = trust_store.len(), "loaded PEM trust store");
        Ok(self.set_transport_config(TransportConfig::with_trust_store(trust_store)))
    }

    /// Replace the transport configuration
    pub fn set_transport_config(&mut self, config: TransportConfig) -> &mut Self {
        if self.warn_if_built("transport configuration") {
            return self;
        }
        self.transport_config = config;
        self
    }

    /// Share a cookie jar with the transport
    pub fn set_cookie_jar(&mut self, cookie_jar: Arc<CookieJar>) -> &mut Self {
        if self.warn_if_built("cookie jar") {
            return self;
        }
        self.cookie_jar = Some(cookie_jar);
        self
    }

    /// Get the configured headers
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Get the encoded query suffix, `""` when none is set
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Get the effective timeout, `None` until one is set or latched
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.duration()
    }

    /// Get the timeout state
    pub fn timeout_setting(&self) -> TimeoutSetting {
        self.timeout
    }

    /// Get the transport configuration
    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport_config
    }

    /// Get the cookie jar
    pub fn cookie_jar(&self) -> Option<&Arc<CookieJar>> {
        self.cookie_jar.as_ref()
    }

    /// Check if the transport has been built
    pub fn is_built(&self) -> bool {
        self.transport.is_some()
    }

    /// Send a GET request
    pub async fn get(&mut self, url: &str) -> Result<Response> {
        let url = self.build_url(url);
        self.request("GET", &url, Vec::new()).await
    }

    /// Send a POST request
    pub async fn post(&mut self, url: &str, body: impl Into<Vec<u8>>) -> Result<Response> {
        let url = self.build_url(url);
        self.request("POST", &url, body).await
    }

    /// Send a PUT request
    pub async fn put(&mut self, url: &str, body: impl Into<Vec<u8>>) -> Result<Response> {
        let url = self.build_url(url);
        self.request("PUT", &url, body).await
    }

    /// Send a DELETE request
    pub async fn delete(&mut self, url: &str, body: impl Into<Vec<u8>>) -> Result<Response> {
        let url = self.build_url(url);
        self.request("DELETE", &url, body).await
    }

    /// Send a request with any method.
    ///
    /// The configured query suffix is not appended here. On failure the
    /// accompanying wrapper is available through [`Error::into_response`].
    pub async fn request(
        &mut self,
        method: &str,
        url: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Response> {
        let request = self.build_request(method, url, payload.into(), None)?;
        self.execute(request).await
    }

    async fn execute(&mut self, request: ReqwestRequest) -> Result<Response> {
        let transport = self.transport()?;
        let timeout = transport.timeout();
        let url = request.url().to_string();

        tracing::debug!(
            method = %request.method(),
            url,
            transport = transport.name(),
            "sending request"
        );

        let result = match transport.send(request).await {
            Ok(response) => Response::capture(response, timeout).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(response) => {
                tracing::debug!(status = response.status_code(), url, "request completed")
            }
            Err(Error::Timeout { duration }) => {
                tracing::warn!(timeout = ?duration, url, "request timed out")
            }
            Err(e) => tracing::debug!(error = %e, url, "request failed"),
        }

        result
    }

    /// Append the configured query suffix to `url`, joining with `&` when
    /// the URL already carries a query
    pub fn build_url(&self, url: &str) -> String {
        if self.query_string.is_empty() {
            url.to_string()
        } else if url.contains('?') {
            format!("{}&{}", url, &self.query_string[1..])
        } else {
            format!("{}{}", url, self.query_string)
        }
    }

    fn build_request(
        &self,
        method: &str,
        url: &str,
        payload: Vec<u8>,
        content_type: Option<&'static str>,
    ) -> Result<ReqwestRequest> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
        let url = Url::parse(url)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_request(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let mut request = ReqwestRequest::new(method, url);

        if let Some(content_type) = content_type {
            request
                .headers_mut()
                .insert(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes())?;
            let value = HeaderValue::from_str(value)?;
            request.headers_mut().insert(name, value);
        }

        if !payload.is_empty() {
            *request.body_mut() = Some(payload.into());
        }

        Ok(request)
    }

    fn transport(&mut self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }

        // The default is latched only once the transport exists.
        let mut setting = self.timeout;
        let timeout = setting.resolve();
        tracing::debug!(
            timeout = ?timeout,
            max_idle_per_host = self.transport_config.max_idle_per_host,
            custom_roots = self.transport_config.trust_store.is_some(),
            "building pooled transport"
        );

        let transport: Arc<dyn Transport> = Arc::new(PooledTransport::build(
            &self.transport_config,
            timeout,
            self.cookie_jar.clone(),
        )?);
        self.timeout = setting;
        self.transport = Some(transport.clone());
        Ok(transport)
    }

    fn warn_if_built(&self, setting: &str) -> bool {
        if self.is_built() {
            tracing::warn!(setting, "transport already built; ignoring configuration change");
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("headers", &self.headers)
            .field("query_string", &self.query_string)
            .field("timeout", &self.timeout)
            .field("transport_config", &self.transport_config)
            .field("built", &self.is_built())
            .finish()
    }
}

/// Convenience methods for JSON bodies
impl Client {
    /// Send a POST request with a JSON body.
    ///
    /// `Content-Type: application/json` is sent unless a configured header
    /// overrides it.
    pub async fn post_json<T>(&mut self, url: &str, body: &T) -> Result<Response>
    where
        T: serde::Serialize + ?Sized,
    {
        self.send_json("POST", url, body).await
    }

    /// Send a PUT request with a JSON body
    pub async fn put_json<T>(&mut self, url: &str, body: &T) -> Result<Response>
    where
        T: serde::Serialize + ?Sized,
    {
        self.send_json("PUT", url, body).await
    }

    async fn send_json<T>(&mut self, method: &str, url: &str, body: &T) -> Result<Response>
    where
        T: serde::Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body).map_err(Error::Encode)?;
        let url = self.build_url(url);
        let request = self.build_request(method, &url, body, Some("application/json"))?;
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeout::DEFAULT_REQUEST_TIMEOUT;
    use std::collections::HashMap;

    #[test]
    fn test_client_configuration() {
        let mut client = Client::new();
        client
            .set_timeout(Duration::from_nanos(10))
            .set_header("Tester", "OK");

        let headers: HashMap<&str, &str> =
            [("Content-Type", "application/json"), ("Channel", "web")].into();
        client.set_headers(headers.clone());

        assert_eq!(client.timeout(), Some(Duration::from_nanos(10)));
        assert_eq!(client.headers()["Tester"], "OK");
        for (key, value) in headers {
            assert_eq!(client.headers()[key], value);
        }
    }

    #[test]
    fn test_set_headers_last_write_wins() {
        let mut client = Client::new();
        client
            .set_headers([("a", "1"), ("b", "2")])
            .set_headers([("b", "3"), ("c", "4")]);

        let expected: BTreeMap<String, String> = [("a", "1"), ("b", "3"), ("c", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(client.headers(), &expected);
    }

    #[test]
    fn test_set_headers_copies_input() {
        let mut source = HashMap::new();
        source.insert("X-One".to_string(), "1".to_string());

        let mut client = Client::new();
        client.set_headers(source.clone());
        source.insert("X-Two".to_string(), "2".to_string());

        assert_eq!(client.headers().len(), 1);
    }

    #[test]
    fn test_set_query_is_sorted_and_replaced() {
        let mut client = Client::new();
        let query: HashMap<&str, &str> = [("b", "2"), ("a", "1")].into();
        client.set_query(query);
        assert_eq!(client.query_string(), "?a=1&b=2");

        client.set_query([("q", "hello world")]);
        assert_eq!(client.query_string(), "?q=hello+world");

        client.set_query(Vec::<(String, String)>::new());
        assert_eq!(client.query_string(), "");
    }

    #[test]
    fn test_build_url() {
        let mut client = Client::new();
        assert_eq!(client.build_url("http://localhost/x"), "http://localhost/x");

        client.set_query([("a", "1"), ("b", "2")]);
        assert_eq!(client.build_url("http://localhost/x"), "http://localhost/x?a=1&b=2");
        assert_eq!(
            client.build_url("http://localhost/x?z=9"),
            "http://localhost/x?z=9&a=1&b=2"
        );
    }

    #[test]
    fn test_build_request_normalizes_method_and_headers() {
        let mut client = Client::new();
        client.set_header("X-Trace", "abc");

        let request = client
            .build_request("post", "http://localhost/items", b"payload".to_vec(), None)
            .unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.headers()["x-trace"], "abc");
        assert!(request.body().is_some());

        let request = client
            .build_request("get", "http://localhost/items", Vec::new(), None)
            .unwrap();
        assert!(request.body().is_none());
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        let client = Client::new();
        assert!(client
            .build_request("GE T", "http://localhost/", Vec::new(), None)
            .unwrap_err()
            .is_construction());
        assert!(client
            .build_request("GET", "::not a url::", Vec::new(), None)
            .unwrap_err()
            .is_construction());
        assert!(client
            .build_request("GET", "ftp://localhost/file", Vec::new(), None)
            .unwrap_err()
            .is_construction());

        let mut client = Client::new();
        client.set_header("Bad Header", "value");
        assert!(client
            .build_request("GET", "http://localhost/", Vec::new(), None)
            .unwrap_err()
            .is_construction());
    }

    #[test]
    fn test_construction_error_does_not_latch_timeout() {
        let mut client = Client::new();
        let err = tokio_test::block_on(client.get("not a url")).unwrap_err();

        assert!(err.is_construction());
        assert_eq!(err.into_response().status_code(), 0);
        assert_eq!(client.timeout_setting(), TimeoutSetting::Unset);
        assert!(!client.is_built());
    }

    #[test]
    fn test_failed_build_does_not_latch_timeout() {
        let mut client = Client::new();
        let mut config = TransportConfig::new();
        config.trust_store = Some(TrustStore::from_der_unchecked(b"not der"));
        client.set_transport_config(config);

        let err = tokio_test::block_on(client.get("http://localhost/")).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(client.timeout_setting(), TimeoutSetting::Unset);
        assert!(!client.is_built());
    }

    #[test]
    fn test_unserializable_json_body_is_not_a_decode_error() {
        let body: HashMap<(i32, i32), i32> = [((1, 2), 3)].into();
        let mut client = Client::new();
        let err = tokio_test::block_on(client.post_json("http://localhost/", &body)).unwrap_err();

        assert!(matches!(err, Error::Encode(_)));
        assert!(!err.is_decode());
        assert!(err.is_construction());
        assert!(!client.is_built());
    }

    #[test]
    fn test_zero_timeout_is_unset() {
        let mut client = Client::new();
        client.set_timeout(Duration::from_secs(3)).set_timeout(Duration::ZERO);
        assert_eq!(client.timeout(), None);
    }

    #[tokio::test]
    async fn test_transport_built_once_with_default_timeout() {
        let mut client = Client::new();
        let transport = client.transport().unwrap();

        assert!(client.is_built());
        assert_eq!(transport.timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(client.timeout_setting(), TimeoutSetting::Default);

        client.set_timeout(Duration::from_secs(1));
        assert_eq!(client.timeout(), Some(DEFAULT_REQUEST_TIMEOUT));

        let again = client.transport().unwrap();
        assert!(Arc::ptr_eq(&transport, &again));
    }

    struct StalledTransport;

    #[async_trait::async_trait]
    impl Transport for StalledTransport {
        async fn send(&self, _request: ReqwestRequest) -> Result<reqwest::Response> {
            Err(Error::timeout(self.timeout()))
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_with_transport() {
        let mut client = Client::with_transport(Arc::new(StalledTransport));
        assert!(client.is_built());

        client.set_timeout(Duration::from_secs(5));
        assert_eq!(client.timeout(), Some(Duration::from_millis(50)));

        let err = client.get("http://localhost/").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.into_response().status_code(), 408);
    }

    #[test]
    fn test_set_pem_certificate() {
        let pem = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bundle.pem");
        let mut client = Client::new();
        client.set_transport_config(TransportConfig::new().max_idle_per_host(4));
        client.set_pem_certificate(pem).unwrap();

        let config = client.transport_config();
        assert_eq!(config.trust_store.as_ref().map(TrustStore::len), Some(2));
        assert_eq!(config.max_idle_per_host, 100);
    }

    #[test]
    fn test_set_pem_certificate_rejects_bad_der() {
        let path = std::env::temp_dir().join(format!("httpwrap_bad_der_{}.pem", std::process::id()));
        std::fs::write(
            &path,
            "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
        )
        .unwrap();

        let mut client = Client::new();
        let result = client.set_pem_certificate(&path).map(|_| ());
        std::fs::remove_file(&path).unwrap();

        let err = result.unwrap_err();
        assert!(err.is_trust_store());
        assert!(client.transport_config().trust_store.is_none());
        assert_eq!(client.timeout_setting(), TimeoutSetting::Unset);
    }

    #[test]
    fn test_set_pem_certificate_missing_file() {
        let mut client = Client::new();
        let err = client
            .set_pem_certificate("/definitely/not/here.pem")
            .unwrap_err();

        assert!(err.is_trust_store());
        assert!(client.transport_config().trust_store.is_none());
    }
}
