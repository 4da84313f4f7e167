//! Transport client and per-request configuration.

use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};

use super::progress::ProgressCallback;
use super::request::ResponseType;
use crate::cookies::CookieJar;
use crate::error::{NetworkError, Result};

/// A hook applied to every outgoing request after it is built.
pub type RequestInterceptor = Arc<dyn Fn(&mut reqwest::Request) + Send + Sync>;

/// Base transport configuration, shared by every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Read timeout: the longest wait for the response head or for the next
    /// body chunk. `None` means unbounded.
    pub read_timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Whether to enable cookie storage.
    pub cookies_enabled: bool,
    /// User agent added to requests that carry none.
    pub user_agent: Option<String>,
    /// Proxy URL.
    pub proxy: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            connect_timeout: None,
            follow_redirects: true,
            max_redirects: 20,
            cookies_enabled: true,
            user_agent: Some(format!("tether/{} (Rust)", env!("CARGO_PKG_VERSION"))),
            proxy: None,
        }
    }
}

/// Builder for creating an HTTP client with custom configuration.
pub struct HttpClientBuilder {
    config: TransportConfig,
    interceptors: Vec<RequestInterceptor>,
    cookie_jar: Option<Arc<CookieJar>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::from_config(TransportConfig::default())
    }

    /// Start from an existing configuration.
    pub fn from_config(config: TransportConfig) -> Self {
        Self {
            config,
            interceptors: Vec::new(),
            cookie_jar: None,
        }
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Disable the read timeout.
    pub fn no_read_timeout(mut self) -> Self {
        self.config.read_timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Disable cookie storage.
    pub fn no_cookies(mut self) -> Self {
        self.config.cookies_enabled = false;
        self
    }

    /// Set the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Do not add a user agent to requests that carry none.
    pub fn no_user_agent(mut self) -> Self {
        self.config.user_agent = None;
        self
    }

    /// Set a proxy URL.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy_url.into());
        self
    }

    /// Register a hook applied to every outgoing request.
    pub fn interceptor<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(&mut reqwest::Request) + Send + Sync + 'static,
    {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Use an existing cookie jar instead of a fresh one.
    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Build the HTTP client.
    pub fn build(self) -> Result<HttpClient> {
        let mut builder = reqwest::Client::builder();

        // Read timeouts are enforced per request by the dispatcher.
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if self.config.follow_redirects {
            builder = builder.redirect(Policy::limited(self.config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        let cookies = self.cookie_jar.unwrap_or_default();
        if self.config.cookies_enabled {
            builder = builder.cookie_provider(cookies.clone());
        }

        if let Some(ref proxy_url) = self.config.proxy {
            let proxy =
                reqwest::Proxy::all(proxy_url).map_err(|e| NetworkError::Proxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(HttpClient {
            inner: Arc::new(HttpClientInner {
                client,
                config: Arc::new(self.config),
                interceptors: self.interceptors,
                cookies,
            }),
        })
    }
}

struct HttpClientInner {
    client: reqwest::Client,
    config: Arc<TransportConfig>,
    interceptors: Vec<RequestInterceptor>,
    cookies: Arc<CookieJar>,
}

/// The shared transport client.
///
/// Cheaply cloneable; clones share the connection pool, the base
/// configuration and the cookie jar.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

impl HttpClient {
    /// Create a builder for configuring a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Create a client with the default configuration.
    pub fn with_defaults() -> Result<Self> {
        HttpClientBuilder::new().build()
    }

    /// The shared base configuration.
    pub fn config(&self) -> &Arc<TransportConfig> {
        &self.inner.config
    }

    /// The cookie jar.
    pub fn cookies(&self) -> &Arc<CookieJar> {
        &self.inner.cookies
    }

    /// Start building a request.
    pub(crate) fn request(&self, method: reqwest::Method, url: url::Url) -> reqwest::RequestBuilder {
        self.inner.client.request(method, url)
    }

    /// Run the interceptors over `request`.
    pub fn intercept(&self, request: &mut reqwest::Request) {
        for interceptor in &self.inner.interceptors {
            interceptor(request);
        }
    }

    /// Send a prepared request.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        Ok(self.inner.client.execute(request).await?)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.inner.config)
            .field("interceptors", &self.inner.interceptors.len())
            .finish()
    }
}

/// The configuration used for one request.
#[derive(Clone)]
pub struct EffectiveConfig {
    /// Transport configuration; the shared base unless the timeout differs.
    pub config: Arc<TransportConfig>,
    /// Download progress hook, present only when byte progress is wanted.
    pub download_progress: Option<ProgressCallback>,
}

impl EffectiveConfig {
    /// The read timeout for this request.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.config.read_timeout
    }
}

impl std::fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("config", &self.config)
            .field("download_progress", &self.download_progress.is_some())
            .finish()
    }
}

/// Derives per-request configuration from the shared base.
#[derive(Debug, Clone)]
pub struct ClientConfigurator {
    base: Arc<TransportConfig>,
}

impl ClientConfigurator {
    /// Create a configurator over `base`.
    pub fn new(base: &Arc<TransportConfig>) -> Self {
        Self { base: base.clone() }
    }

    /// Derive the configuration for one request.
    ///
    /// The base is reused as-is when `read_timeout` matches it; otherwise a
    /// clone with the new read timeout is made. Download progress is attached only for
    /// incremental requests whose response type is not text.
    pub fn configure(
        &self,
        read_timeout: Option<Duration>,
        incremental_updates: bool,
        response_type: &ResponseType,
        on_progress: ProgressCallback,
    ) -> EffectiveConfig {
        let config = if read_timeout == self.base.read_timeout {
            self.base.clone()
        } else {
            Arc::new(TransportConfig {
                read_timeout,
                ..(*self.base).clone()
            })
        };
        let download_progress =
            (incremental_updates && !response_type.is_text()).then_some(on_progress);
        EffectiveConfig {
            config,
            download_progress,
        }
    }
}
