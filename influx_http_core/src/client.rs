/**
 * The transport facade — the object the rest of a client library talks to.
 *
 * Lifecycle:
 * 1. `Transport::new(url)` / `with_options` / `with_client` parse the
 *    connection string once and configure the HTTP client.
 * 2. In asynchronous mode a reaper thread is started right away. The mode
 *    is fixed for the lifetime of the transport.
 * 3. `query` / `execute` / `send` / `create_database` block on one round
 *    trip and return its outcome. `send_async` hands the write to the
 *    dispatch pool (started on first use) and returns immediately.
 * 4. Dropping the transport stops and joins the reaper. Writes still queued
 *    at that point are abandoned: they were already sent, but nobody looks
 *    at their outcome.
 *
 * Settings (`set_proxy`, `set_basic_authentication`) take `&mut self`, so
 * they cannot change while the transport is shared with other threads.
 * Configure first, then share.
 */
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::constants::{LINE_PROTOCOL_CONTENT_TYPE, QUERY_PATH, WRITE_PATH};
use crate::protocol::endpoint::Endpoint;
use crate::transport::{
    ClientSettings, Dispatcher, DrainPolicy, ErrorObserver, Executor, HttpClient, HttpRequest,
    Method, Proxy, Reaper, ReaperConfig, UreqClient, WriteQueue, DEFAULT_DISPATCH_WORKERS,
};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/**
 * Construction-time configuration.
 *
 * All fields have defaults matching the classic InfluxDB transport:
 * 10 s timeouts, no TLS verification, synchronous mode.
 *
 * # Example
 * ```ignore
 * use std::sync::Arc;
 *
 * let transport = Transport::with_options(
 *     "http://localhost:8086/?db=metrics",
 *     Options::asynchronous().with_error_observer(Arc::new(|err: &Error| {
 *         eprintln!("write lost: {err}");
 *     })),
 * )?;
 * ```
 */
#[derive(Clone)]
pub struct Options {
    /// Total time budget for one request.
    pub timeout: Duration,

    pub connect_timeout: Duration,

    /// Verify server certificates on https endpoints. Off by default.
    pub verify_tls: bool,

    /// Start a reaper and accept `send_async` writes.
    pub async_writes: bool,

    /// Pause between two reaper drains.
    pub reap_interval: Duration,

    pub drain_policy: DrainPolicy,

    /// Threads sending `send_async` writes; caps the writes in flight.
    pub dispatch_workers: usize,

    /// Receives every failed asynchronous write. Without one, failures are
    /// only logged at debug level.
    pub error_observer: Option<ErrorObserver>,
}

impl Default for Options {
    fn default() -> Self {
        let client = ClientSettings::default();
        let reaper = ReaperConfig::default();
        Self {
            timeout: client.timeout,
            connect_timeout: client.connect_timeout,
            verify_tls: client.verify_tls,
            async_writes: false,
            reap_interval: reaper.interval,
            drain_policy: reaper.policy,
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
            error_observer: None,
        }
    }
}

impl Options {
    /// Defaults with asynchronous writes enabled.
    pub fn asynchronous() -> Self {
        Self {
            async_writes: true,
            ..Default::default()
        }
    }

    pub fn with_error_observer(mut self, observer: ErrorObserver) -> Self {
        self.error_observer = Some(observer);
        self
    }

    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn with_dispatch_workers(mut self, workers: usize) -> Self {
        self.dispatch_workers = workers;
        self
    }

    fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            verify_tls: self.verify_tls,
            proxy: None,
        }
    }

    fn reaper_config(&self) -> ReaperConfig {
        ReaperConfig {
            interval: self.reap_interval,
            policy: self.drain_policy,
            observer: self.error_observer.clone(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("verify_tls", &self.verify_tls)
            .field("async_writes", &self.async_writes)
            .field("reap_interval", &self.reap_interval)
            .field("drain_policy", &self.drain_policy)
            .field("dispatch_workers", &self.dispatch_workers)
            .field("error_observer", &self.error_observer.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

pub struct Transport<C: HttpClient = UreqClient> {
    executor: Executor<C>,
    settings: ClientSettings,
    dispatch_workers: usize,
    dispatcher: OnceLock<Dispatcher<C>>,
    queue: Arc<WriteQueue>,
    reaper: Option<Reaper>,
}

impl Transport<UreqClient> {
    /// Synchronous-only transport with default options.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_options(url, Options::default())
    }

    pub fn with_options(url: &str, options: Options) -> Result<Self> {
        Self::with_client(url, options, UreqClient::new()?)
    }
}

impl<C: HttpClient> Transport<C> {
    /**
     * Builds a transport over a caller-provided HTTP client.
     *
     * # Steps
     * 1. Parse the connection string (fatal on a bad string).
     * 2. Push the option settings into the client.
     * 3. In asynchronous mode, spawn the reaper.
     *
     * # Returns
     * `Err(Error::Configuration)` on a malformed connection string or when
     * the reaper thread cannot be started.
     */
    pub fn with_client(url: &str, options: Options, mut client: C) -> Result<Self> {
        let endpoint = Endpoint::parse(url)?;

        let settings = options.client_settings();
        client.configure(&settings)?;

        let queue = Arc::new(WriteQueue::new());
        let reaper = if options.async_writes {
            Some(Reaper::spawn(queue.clone(), options.reaper_config())?)
        } else {
            None
        };

        debug!(
            base_url = endpoint.base_url(),
            database = endpoint.database(),
            async_writes = options.async_writes,
            "transport ready"
        );

        Ok(Self {
            executor: Executor::new(client, endpoint),
            settings,
            dispatch_workers: options.dispatch_workers,
            dispatcher: OnceLock::new(),
            queue,
            reaper,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.executor.endpoint()
    }

    pub fn is_async(&self) -> bool {
        self.reaper.is_some()
    }

    /// Asynchronous writes whose outcome the reaper has not observed yet.
    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    /// Runs a query and returns the raw response body.
    pub fn query(&self, query: &str) -> Result<String> {
        let request = self
            .executor
            .request(Method::Get, QUERY_PATH)
            .database()
            .param("q", query)
            .build();
        self.executor.execute(&request)
    }

    /// Runs an administrative command and returns the raw response body.
    pub fn execute(&self, command: &str) -> Result<String> {
        let request = self
            .executor
            .request(Method::Get, QUERY_PATH)
            .database()
            .param("q", command)
            .build();
        self.executor.execute(&request)
    }

    /// Writes line protocol and waits for the server to accept it.
    pub fn send(&self, line_protocol: impl Into<String>) -> Result<()> {
        let request = self.write_request(line_protocol.into());
        self.executor.execute(&request).map(drop)
    }

    /**
     * Writes line protocol without waiting for the response.
     *
     * The request is queued for the dispatch pool when this returns and
     * goes out as soon as a worker is free. Its outcome is observed later
     * by the reaper: failures go to the error observer, if any, and
     * are never reported through this or any other call.
     *
     * On a synchronous-only transport the write is still sent, but its
     * outcome is dropped unobserved.
     */
    pub fn send_async(&self, line_protocol: impl Into<String>) {
        let request = self.write_request(line_protocol.into());
        let dispatcher = self
            .dispatcher
            .get_or_init(|| Dispatcher::spawn(self.dispatch_workers));
        let pending = dispatcher.submit(self.executor.client().clone(), request);

        if self.reaper.is_some() {
            self.queue.push(pending);
        } else {
            warn!("send_async on a synchronous transport, the write outcome will not be observed");
        }
    }

    /// Creates the database named in the connection string.
    pub fn create_database(&self) -> Result<()> {
        let command = format!("CREATE DATABASE {}", self.endpoint().database());
        let request = self
            .executor
            .request(Method::Post, QUERY_PATH)
            .param("q", command)
            .build();
        self.executor.execute(&request).map(drop)
    }

    /// Sends HTTP basic credentials with every later request.
    pub fn set_basic_authentication(&mut self, user: &str, pass: &str) {
        self.executor.set_basic_authentication(user, pass);
    }

    /**
     * Routes every later request (http and https) through `proxy`.
     *
     * # Returns
     * `Err(Error::Configuration)` if the proxy URL is unusable; the previous
     * settings stay in effect.
     */
    pub fn set_proxy(&mut self, proxy: &Proxy) -> Result<()> {
        proxy.resolved_url()?;

        let mut settings = self.settings.clone();
        settings.proxy = Some(proxy.clone());
        self.executor.client_mut().configure(&settings)?;
        self.settings = settings;
        Ok(())
    }

    fn write_request(&self, line_protocol: String) -> HttpRequest {
        self.executor
            .request(Method::Post, WRITE_PATH)
            .database()
            .header("Content-Type", LINE_PROTOCOL_CONTENT_TYPE)
            .body(line_protocol)
            .build()
    }
}

impl<C: HttpClient> Drop for Transport<C> {
    fn drop(&mut self) {
        if let Some(mut reaper) = self.reaper.take() {
            reaper.stop();
        }
    }
}

impl<C: HttpClient> fmt::Debug for Transport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", self.endpoint())
            .field("settings", &self.settings)
            .field("async", &self.is_async())
            .field("dispatch_workers", &self.dispatcher.get().map(Dispatcher::workers))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::error::Error;
    use crate::mock::{response, MockClient};
    use crate::transport::HttpResponse;

    const URL: &str = "http://localhost:8086/?db=mydb";

    fn sync_transport(client: MockClient) -> Transport<MockClient> {
        Transport::with_client(URL, Options::default(), client).unwrap()
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
        let started = Instant::now();
        while !done() {
            assert!(started.elapsed() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_bad_url_is_fatal() {
        let result = Transport::with_client("http://localhost:8086", Options::default(), MockClient::with_status(200));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_construction_configures_client() {
        let client = MockClient::with_status(200);
        let transport = sync_transport(client.clone());

        assert!(!transport.is_async());
        assert_eq!(client.settings(), vec![ClientSettings::default()]);
    }

    #[test]
    fn test_send_posts_payload_once() {
        let client = MockClient::with_status(204);
        let transport = sync_transport(client.clone());

        transport.send("cpu,host=a value=0.5").unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "http://localhost:8086/write");
        assert_eq!(request.param("db"), Some("mydb"));
        assert_eq!(request.body.as_deref(), Some("cpu,host=a value=0.5"));
        assert_eq!(request.header("content-type"), Some(LINE_PROTOCOL_CONTENT_TYPE));
    }

    #[test]
    fn test_send_failure_is_raised() {
        let transport = sync_transport(MockClient::with_status(500));

        let err = transport.send("cpu value=1").unwrap_err();
        assert_eq!(
            err,
            Error::HttpStatus {
                status: 500,
                reason: "Internal Server Error".into()
            }
        );
    }

    #[test]
    fn test_query_returns_body() {
        let client = MockClient::new(|_| Ok(response(200, r#"{"results":[{"statement_id":0}]}"#)));
        let transport = sync_transport(client.clone());

        let body = transport.query("SELECT * FROM cpu").unwrap();
        assert_eq!(body, r#"{"results":[{"statement_id":0}]}"#);

        let request = &client.requests()[0];
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "http://localhost:8086/query");
        assert_eq!(request.param("db"), Some("mydb"));
        assert_eq!(request.param("q"), Some("SELECT * FROM cpu"));
    }

    #[test]
    fn test_execute_uses_query_path() {
        let client = MockClient::with_status(200);
        let transport = sync_transport(client.clone());

        transport.execute("DROP MEASUREMENT cpu").unwrap();

        let request = &client.requests()[0];
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "http://localhost:8086/query");
        assert_eq!(request.param("q"), Some("DROP MEASUREMENT cpu"));
    }

    #[test]
    fn test_create_database_twice() {
        let client = MockClient::with_status(200);
        let transport = sync_transport(client.clone());

        transport.create_database().unwrap();
        transport.create_database().unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].param("q"), Some("CREATE DATABASE mydb"));
        assert_eq!(requests[0].param("db"), None);
        assert_eq!(transport.pending_writes(), 0);
    }

    #[test]
    fn test_basic_auth_applies_to_all_requests() {
        let client = MockClient::with_status(204);
        let mut transport = sync_transport(client.clone());
        transport.set_basic_authentication("admin", "secret");

        transport.send("m v=1").unwrap();
        transport.query("SHOW DATABASES").unwrap();

        for request in client.requests() {
            assert_eq!(request.header("authorization"), Some("Basic YWRtaW46c2VjcmV0"));
        }
    }

    #[test]
    fn test_set_proxy_reconfigures_client() {
        let client = MockClient::with_status(200);
        let mut transport = sync_transport(client.clone());

        let proxy = Proxy::new("http://proxy.local:3128").with_auth("svc", "pw");
        transport.set_proxy(&proxy).unwrap();

        let settings = client.settings();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings[1].proxy.as_ref(), Some(&proxy));
    }

    #[test]
    fn test_invalid_proxy_keeps_previous_settings() {
        let client = MockClient::with_status(200);
        let mut transport = sync_transport(client.clone());

        let result = transport.set_proxy(&Proxy::new("::not a url::"));
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(client.settings().len(), 1);
    }

    #[test]
    fn test_send_async_returns_before_response() {
        let client = MockClient::with_status(204).with_delay(Duration::from_millis(500));
        let transport = Transport::with_client(URL, Options::asynchronous(), client.clone()).unwrap();

        let started = Instant::now();
        transport.send_async("cpu value=1");
        assert!(started.elapsed() < Duration::from_millis(250));

        wait_until(Duration::from_secs(5), || transport.pending_writes() == 0);
        assert_eq!(client.requests().len(), 1);
    }

    /**
     * W1 is the slowest and W3 the fastest, yet the observer sees them in
     * submission order.
     */
    #[test]
    fn test_async_failures_observed_in_submission_order() {
        let client = MockClient::new(|request: &HttpRequest| {
            let body = request.body.clone().unwrap_or_default();
            let delay = match body.as_str() {
                "w1" => 300,
                "w2" => 100,
                _ => 0,
            };
            thread::sleep(Duration::from_millis(delay));
            Ok(HttpResponse {
                status: 500,
                reason: body,
                body: String::new(),
            })
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = Options::asynchronous()
            .with_reap_interval(Duration::from_millis(10))
            .with_error_observer(Arc::new(move |err: &Error| {
                if let Error::HttpStatus { reason, .. } = err {
                    sink.lock().unwrap().push(reason.clone());
                }
            }));
        let transport = Transport::with_client(URL, options, client).unwrap();

        for write in ["w1", "w2", "w3"] {
            transport.send_async(write);
        }

        wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 3);
        assert_eq!(*seen.lock().unwrap(), vec!["w1", "w2", "w3"]);
    }

    #[test]
    fn test_per_write_policy_observes_all() {
        let client = MockClient::with_status(400);
        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        let options = Options::asynchronous()
            .with_drain_policy(DrainPolicy::PerWrite)
            .with_reap_interval(Duration::from_millis(10))
            .with_error_observer(Arc::new(move |_: &Error| *sink.lock().unwrap() += 1));
        let transport = Transport::with_client(URL, options, client).unwrap();

        for n in 0..4 {
            transport.send_async(format!("m v={n}"));
        }

        wait_until(Duration::from_secs(5), || *seen.lock().unwrap() == 4);
    }

    /**
     * Eight threads hammer one shared transport; every write is sent once
     * and every failure observed once.
     */
    #[test]
    fn test_concurrent_writers_share_one_transport() {
        let client = MockClient::with_status(400);
        let observed = Arc::new(Mutex::new(0));
        let sink = observed.clone();
        let options = Options::asynchronous()
            .with_reap_interval(Duration::from_millis(10))
            .with_error_observer(Arc::new(move |_: &Error| *sink.lock().unwrap() += 1));
        let transport = Transport::with_client(URL, options, client.clone()).unwrap();

        thread::scope(|scope| {
            for writer in 0..8 {
                let transport = &transport;
                scope.spawn(move || {
                    for n in 0..50 {
                        transport.send_async(format!("m,writer={writer} v={n}"));
                    }
                });
            }
        });

        wait_until(Duration::from_secs(10), || *observed.lock().unwrap() == 400);
        assert_eq!(transport.pending_writes(), 0);

        let mut bodies: Vec<_> = client.requests().into_iter().filter_map(|r| r.body).collect();
        bodies.sort();
        bodies.dedup();
        assert_eq!(bodies.len(), 400);
    }

    /**
     * With a 700 ms write at the head of the queue, `Batch` makes the next
     * `send_async` wait for it while `PerWrite` lets it through.
     */
    #[test]
    fn test_drain_policy_decides_whether_writers_wait() {
        for (policy, blocked) in [(DrainPolicy::Batch, true), (DrainPolicy::PerWrite, false)] {
            let client = MockClient::new(|request: &HttpRequest| {
                if request.body.as_deref() == Some("slow") {
                    thread::sleep(Duration::from_millis(700));
                }
                Ok(response(204, ""))
            });
            let options = Options::asynchronous()
                .with_drain_policy(policy)
                .with_reap_interval(Duration::from_millis(10));
            let transport = Transport::with_client(URL, options, client).unwrap();

            transport.send_async("slow");
            thread::sleep(Duration::from_millis(100));

            let started = Instant::now();
            transport.send_async("fast");
            let waited = started.elapsed();

            assert_eq!(waited >= Duration::from_millis(300), blocked, "{policy:?} waited {waited:?}");
            wait_until(Duration::from_secs(5), || transport.pending_writes() == 0);
        }
    }

    #[test]
    fn test_dispatch_pool_starts_on_first_async_write() {
        let options = Options::asynchronous().with_dispatch_workers(2);
        let transport = Transport::with_client(URL, options, MockClient::with_status(204)).unwrap();
        assert!(transport.dispatcher.get().is_none());

        transport.send_async("m v=1");
        transport.send_async("m v=2");

        assert_eq!(transport.dispatcher.get().map(Dispatcher::workers), Some(2));
        wait_until(Duration::from_secs(5), || transport.pending_writes() == 0);
    }

    #[test]
    fn test_drop_with_queued_writes_does_not_hang() {
        let client = MockClient::with_status(204).with_delay(Duration::from_millis(200));
        let options = Options::asynchronous().with_reap_interval(Duration::from_secs(60));
        let transport = Transport::with_client(URL, options, client).unwrap();

        for n in 0..5 {
            transport.send_async(format!("m v={n}"));
        }
        assert_eq!(transport.pending_writes(), 5);

        let started = Instant::now();
        drop(transport);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_send_async_on_sync_transport_still_sends() {
        let client = MockClient::with_status(204);
        let transport = sync_transport(client.clone());

        transport.send_async("m v=1");

        assert_eq!(transport.pending_writes(), 0);
        wait_until(Duration::from_secs(5), || client.requests().len() == 1);
    }
}
