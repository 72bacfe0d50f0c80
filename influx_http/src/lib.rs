/*!
 * InfluxDB HTTP transport.
 *
 * This is the crate applications should depend on. It re-exports the
 * engine from `influx_http_core` and offers `connect`, which builds a
 * transport and applies proxy and credentials in one call.
 *
 * # Quick start
 *
 * ```ignore
 * fn main() -> influx_http::Result<()> {
 *     let transport = influx_http::connect("http://localhost:8086/?db=metrics")?;
 *
 *     transport.create_database()?;
 *     transport.send("cpu,host=a usage=0.42")?;
 *     let body = transport.query("SELECT * FROM cpu")?;
 *     println!("{body}");
 *     Ok(())
 * }
 * ```
 *
 * # Fire-and-forget writes
 *
 * ```ignore
 * use std::sync::Arc;
 *
 * let transport = influx_http::connect(influx_http::Config {
 *     on_write_error: Some(Arc::new(|err: &influx_http::Error| eprintln!("write lost: {err}"))),
 *     ..influx_http::Config::asynchronous("http://localhost:8086/?db=metrics")
 * })?;
 *
 * transport.send_async("cpu,host=a usage=0.42");
 * // the transport's drop stops the reaper; unobserved writes are abandoned
 * ```
 */

// ---------------------------------------------------------------------------
// Re-exports from influx_http_core — the public surface area
// ---------------------------------------------------------------------------

pub use influx_http_core::{
    ClientSettings, DrainPolicy, Endpoint, Error, ErrorObserver, HttpClient, HttpRequest,
    HttpResponse, Method, Options, Proxy, ProxyAuth, RequestOutcome, Result, Transport,
    TransportCode, UreqClient, QUERY_PATH, USER_AGENT, WRITE_PATH,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/**
 * Everything `connect` needs.
 *
 * Implements `From<&str>` so a bare connection string works:
 * synchronous mode, no proxy, no credentials.
 */
#[derive(Default)]
pub struct Config {
    /// Connection string, e.g. `http://localhost:8086/?db=metrics`.
    pub url: String,

    /// Start the reaper and accept `send_async`. Defaults to `false`.
    pub async_writes: bool,

    /// Receives every failed asynchronous write.
    pub on_write_error: Option<ErrorObserver>,

    pub proxy: Option<Proxy>,

    /// HTTP basic credentials as `(user, password)`.
    pub credentials: Option<(String, String)>,

    /// Remaining engine options. `async_writes` and `on_write_error` above
    /// take precedence over the matching fields here.
    pub options: Options,
}

impl Config {
    /// Asynchronous-mode config for `url` with everything else defaulted.
    pub fn asynchronous(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            async_writes: true,
            ..Default::default()
        }
    }
}

impl From<&str> for Config {
    fn from(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

impl From<String> for Config {
    fn from(url: String) -> Self {
        Self {
            url,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

/**
 * Builds a ready-to-use transport.
 *
 * Accepts either a bare connection string or a full `Config`:
 *
 * ```ignore
 * let sync = influx_http::connect("http://localhost:8086/?db=metrics")?;
 *
 * let with_proxy = influx_http::connect(influx_http::Config {
 *     proxy: Some(influx_http::Proxy::new("http://proxy.local:3128")),
 *     credentials: Some(("admin".into(), "secret".into())),
 *     .."http://localhost:8086/?db=metrics".into()
 * })?;
 * ```
 *
 * # Returns
 * `Err(Error::Configuration)` for a malformed connection string or proxy.
 */
pub fn connect(config: impl Into<Config>) -> Result<Transport> {
    let config = config.into();

    let mut options = config.options;
    options.async_writes = config.async_writes;
    if config.on_write_error.is_some() {
        options.error_observer = config.on_write_error;
    }

    let mut transport = Transport::with_options(&config.url, options)?;

    if let Some(proxy) = &config.proxy {
        transport.set_proxy(proxy)?;
    }
    if let Some((user, password)) = &config.credentials {
        transport.set_basic_authentication(user, password);
    }

    Ok(transport)
}

/// Asynchronous-mode transport for `url` with default options.
pub fn connect_async(url: &str) -> Result<Transport> {
    connect(Config::asynchronous(url))
}
