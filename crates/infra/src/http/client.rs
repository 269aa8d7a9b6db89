use std::path::{Path, PathBuf};
use std::time::Duration;

use entsync_domain::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use entsync_domain::{EntsyncError, ProxyConfig, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Certificate, Method, Proxy};
use tracing::debug;

use crate::errors::map_infra;

/// Builds authenticated HTTP sessions with fixed proxy and TLS settings.
///
/// Building a session never touches the network. The trust store is read
/// once, when the factory itself is built.
#[derive(Clone)]
pub struct SessionFactory {
    timeout: Duration,
    proxy: ProxyConfig,
    trust_roots: Option<Vec<Certificate>>,
    user_agent: String,
}

impl SessionFactory {
    /// Start building a new session factory.
    pub fn builder() -> SessionFactoryBuilder {
        SessionFactoryBuilder::default()
    }

    /// Session authorized with `Authorization: Bearer <token>`.
    pub fn build(&self, token: &str) -> Result<Session> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| EntsyncError::Config("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        self.build_with_headers(headers)
    }

    /// Session carrying arbitrary default headers (plus a JSON content type).
    pub fn build_with_headers(&self, mut headers: HeaderMap) -> Result<Session> {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .default_headers(headers);

        builder = self.apply_proxy(builder)?;

        if let Some(roots) = &self.trust_roots {
            builder = builder.tls_built_in_root_certs(false);
            for cert in roots {
                builder = builder.add_root_certificate(cert.clone());
            }
        }

        let client = builder.build().map_err(map_infra)?;
        Ok(Session { client })
    }

    /// Request timeout applied to every session.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn apply_proxy(
        &self,
        builder: reqwest::blocking::ClientBuilder,
    ) -> Result<reqwest::blocking::ClientBuilder> {
        if self.proxy.is_empty() {
            return Ok(builder.no_proxy());
        }

        let mut builder = builder;
        if let Some(url) = self.proxy.http.as_deref().filter(|url| !url.is_empty()) {
            let proxy = Proxy::http(url)
                .map_err(|e| EntsyncError::Config(format!("invalid http proxy {url}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        if let Some(url) = self.proxy.https.as_deref().filter(|url| !url.is_empty()) {
            let proxy = Proxy::https(url)
                .map_err(|e| EntsyncError::Config(format!("invalid https proxy {url}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder)
    }
}

/// Builder for [`SessionFactory`].
#[derive(Debug)]
pub struct SessionFactoryBuilder {
    timeout: Duration,
    proxy: ProxyConfig,
    trust_store: Option<PathBuf>,
    user_agent: Option<String>,
}

impl Default for SessionFactoryBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            proxy: ProxyConfig::default(),
            trust_store: None,
            user_agent: None,
        }
    }
}

impl SessionFactoryBuilder {
    /// Per-request timeout covering connect, send and read.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Outbound proxies; empty settings disable proxying altogether.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Pin TLS verification to the certificates in this PEM bundle.
    pub fn trust_store(mut self, path: Option<PathBuf>) -> Self {
        self.trust_store = path;
        self
    }

    /// Override the `User-Agent` header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Load the trust store, if any, and finish the factory.
    ///
    /// # Errors
    /// Returns `EntsyncError::Config` when the trust store cannot be read or
    /// holds no usable certificate.
    pub fn build(self) -> Result<SessionFactory> {
        let trust_roots = match &self.trust_store {
            Some(path) => Some(load_trust_store(path)?),
            None => None,
        };

        Ok(SessionFactory {
            timeout: self.timeout,
            proxy: self.proxy,
            trust_roots,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("entsync/{}", env!("CARGO_PKG_VERSION"))),
        })
    }
}

fn load_trust_store(path: &Path) -> Result<Vec<Certificate>> {
    debug!(path = %path.display(), "loading trust store");
    let pem = std::fs::read(path).map_err(|e| {
        EntsyncError::Config(format!("failed to read trust store {}: {e}", path.display()))
    })?;
    let certs = Certificate::from_pem_bundle(&pem).map_err(|e| {
        EntsyncError::Config(format!("invalid trust store {}: {e}", path.display()))
    })?;
    if certs.is_empty() {
        return Err(EntsyncError::Config(format!(
            "trust store {} contains no certificates",
            path.display()
        )));
    }
    Ok(certs)
}

/// A configured blocking HTTP client.
pub struct Session {
    client: Client,
}

impl Session {
    /// Create a request builder using the underlying client.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Execute the request once. Connection-level failures map to
    /// `EntsyncError::Transport`; HTTP statuses are left to the caller.
    pub fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().map_err(map_infra)?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request) {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(map_infra(err))
            }
        }
    }
}
