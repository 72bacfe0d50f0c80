/*!
 * In-memory `HttpClient` for tests.
 */

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::transport::http::{ClientSettings, HttpClient, HttpRequest, HttpResponse};

type Responder = Arc<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// Records every request and answers through a closure. Clones share state.
#[derive(Clone)]
pub struct MockClient {
    responder: Responder,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    settings: Arc<Mutex<Vec<ClientSettings>>>,
}

impl MockClient {
    pub fn new(responder: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            settings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answers with `status` and an empty body.
    pub fn with_status(status: u16) -> Self {
        Self::new(move |_| Ok(response(status, "")))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Settings passed to `configure`, oldest first.
    pub fn settings(&self) -> Vec<ClientSettings> {
        self.settings.lock().unwrap().clone()
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    };
    HttpResponse {
        status,
        reason: reason.into(),
        body: body.into(),
    }
}

impl HttpClient for MockClient {
    fn configure(&mut self, settings: &ClientSettings) -> Result<()> {
        self.settings.lock().unwrap().push(settings.clone());
        Ok(())
    }

    fn call(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        (self.responder)(request)
    }
}
