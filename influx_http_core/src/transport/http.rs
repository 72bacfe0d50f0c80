/*!
 * HTTP client collaborator.
 *
 * The transport never talks to the network directly. It builds an
 * `HttpRequest`, hands it to an `HttpClient`, and classifies the
 * `HttpResponse` itself. `UreqClient` is the production implementation.
 *
 * Uses `ureq` — a pure-Rust blocking HTTP client with no async runtime.
 * Sync calls block the caller; async writes block one of the dispatch
 * workers (see `dispatch`), so blocking I/O is fine everywhere.
 *
 * Session-wide knobs (timeouts, TLS verification, proxy) live in
 * `ClientSettings` and are pushed into the client through `configure`.
 * Basic auth is a per-request header and is added by the executor.
 */
use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::Agent;
use url::Url;

use crate::error::{Error, Result, TransportCode};

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully resolved request, ready to be handed to an `HttpClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Value of the first query parameter named `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first header named `name` (ASCII case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Uniform response shape: status code, reason phrase and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

/// Credentials for an authenticating proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    pub user: String,
    pub password: String,
}

/**
 * Proxy applied uniformly to http and https traffic.
 *
 * ```ignore
 * let proxy = Proxy::new("http://proxy.local:3128")
 *     .with_auth("svc", "hunter2");
 * transport.set_proxy(&proxy)?;
 * ```
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    url: String,
    auth: Option<ProxyAuth>,
}

impl Proxy {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth(&self) -> Option<&ProxyAuth> {
        self.auth.as_ref()
    }

    /**
     * Proxy URL with credentials folded into the user-info part, which is
     * how `ureq` picks up proxy authentication.
     */
    pub fn resolved_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::configuration(format!("invalid proxy url '{}': {e}", self.url)))?;

        if let Some(auth) = &self.auth {
            let rejected = || Error::configuration(format!("proxy url '{}' cannot carry credentials", self.url));
            url.set_username(&auth.user).map_err(|_| rejected())?;
            url.set_password(Some(&auth.password)).map_err(|_| rejected())?;
        }

        Ok(url.to_string())
    }
}

// ---------------------------------------------------------------------------
// ClientSettings
// ---------------------------------------------------------------------------

/**
 * Session-wide settings applied to every request, sync or async.
 *
 * Defaults: 10 s connect and 10 s total timeout, TLS verification off,
 * no explicit proxy (the proxy environment variables still apply).
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub verify_tls: bool,
    pub proxy: Option<Proxy>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            verify_tls: false,
            proxy: None,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/**
 * The seam between the transport and an HTTP implementation.
 *
 * Clones must share the underlying session (connection pool, settings):
 * async writes run on a clone of the transport's client.
 */
pub trait HttpClient: Clone + Send + Sync + 'static {
    /// Rebuilds session state after a settings change.
    fn configure(&mut self, settings: &ClientSettings) -> Result<()>;

    /**
     * Performs one blocking round trip.
     *
     * Any status code is a successful call at this level; only failures to
     * obtain a response become `Error::Transport`.
     */
    fn call(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/**
 * `HttpClient` backed by a `ureq::Agent`.
 *
 * Connection pooling and keep-alive are handled by the agent internally;
 * cloning shares the pool.
 */
#[derive(Clone)]
pub struct UreqClient {
    agent: Agent,
}

impl UreqClient {
    /// Builds a client from `ClientSettings::default()`.
    pub fn new() -> Result<Self> {
        Self::with_settings(&ClientSettings::default())
    }

    pub fn with_settings(settings: &ClientSettings) -> Result<Self> {
        Ok(Self {
            agent: build_agent(settings)?,
        })
    }
}

impl HttpClient for UreqClient {
    fn configure(&mut self, settings: &ClientSettings) -> Result<()> {
        self.agent = build_agent(settings)?;
        Ok(())
    }

    fn call(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let result = match request.method {
            Method::Get => {
                let mut builder = self.agent.get(&request.url);
                for (key, value) in &request.params {
                    builder = builder.query(key, value);
                }
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            Method::Post => {
                let mut builder = self.agent.post(&request.url);
                for (key, value) in &request.params {
                    builder = builder.query(key, value);
                }
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &request.body {
                    Some(body) => builder.send(body.as_str()),
                    None => builder.send_empty(),
                }
            }
        };

        let response = result.map_err(map_ureq_error)?;
        let status = response.status();
        /* Query results routinely exceed ureq's default 10 MiB body cap. */
        let mut reader = response.into_body();
        let body = reader
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(map_ureq_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

fn build_agent(settings: &ClientSettings) -> Result<Agent> {
    let proxy = match &settings.proxy {
        Some(proxy) => {
            let url = proxy.resolved_url()?;
            let proxy = ureq::Proxy::new(&url)
                .map_err(|e| Error::configuration(format!("invalid proxy: {e}")))?;
            Some(proxy)
        }
        /* Same as ureq's default: honor ALL_PROXY / HTTPS_PROXY / HTTP_PROXY. */
        None => ureq::Proxy::try_from_env(),
    };

    let tls = TlsConfig::builder()
        .disable_verification(!settings.verify_tls)
        .build();

    Ok(Agent::config_builder()
        .timeout_connect(Some(settings.connect_timeout))
        .timeout_global(Some(settings.timeout))
        .http_status_as_error(false)
        .tls_config(tls)
        .proxy(proxy)
        .build()
        .into())
}

fn map_ureq_error(err: ureq::Error) -> Error {
    let code = match &err {
        ureq::Error::Timeout(_) => TransportCode::Timeout,
        ureq::Error::HostNotFound => TransportCode::HostNotFound,
        ureq::Error::ConnectionFailed => TransportCode::Connection,
        ureq::Error::Io(_) => TransportCode::Io,
        _ => TransportCode::Other,
    };
    Error::transport(code, err.to_string())
}
