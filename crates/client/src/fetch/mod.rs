//! Network transport for the strategy engine.
//!
//! ### Transport seam
//! - Strategies only see the [`Transport`] trait, so tests can script the network.
//! - Every send carries a [`CacheMode`] directive chosen by the strategy.
//!
//! ### reqwest transport
//! - Forwards method, headers and body of the intercepted request.
//! - Non-2xx statuses are returned as responses, not errors; only transport
//!   failures (connect, timeout, oversize body) are `Err`.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, resolve};

use swcache_core::{AppConfig, Error, Headers, InterceptedRequest, ResponseSnapshot};

/// Per-request caching directive passed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheMode {
    /// Normal transport behavior.
    Default,
    /// Nothing along the way may keep a copy.
    NoStore,
    /// Revalidate with the origin, bypassing intermediate caches.
    NoCache,
    /// Fetch fresh from the origin (install-time precache).
    Reload,
}

impl CacheMode {
    /// Request headers expressing this directive on the wire.
    pub fn directive_headers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CacheMode::Default => &[],
            CacheMode::NoStore => &[("Cache-Control", "no-store")],
            CacheMode::NoCache | CacheMode::Reload => &[("Cache-Control", "no-cache"), ("Pragma", "no-cache")],
        }
    }
}

/// The network as seen by the strategy engine.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and buffer the response.
    ///
    /// Returns `Err` only when no response was obtained.
    async fn send(&self, request: &InterceptedRequest, mode: CacheMode) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed transport.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

/// Copy reqwest headers, skipping values that are not visible ASCII.
fn collect_headers(map: &header::HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[async_trait::async_trait]
impl Transport for FetchClient {
    async fn send(&self, request: &InterceptedRequest, mode: CacheMode) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        for (name, value) in mode.directive_headers() {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(map_send_error)?;

        let status = response.status();
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let headers = collect_headers(response.headers());
        let bytes: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(bytes.len()));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            ?mode,
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network response"
        );

        Ok(ResponseSnapshot {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
        })
    }
}
