/*!
 * Request executor: builds requests against the endpoint and classifies
 * what comes back.
 *
 * Classification is the single rule every path follows, sync or async:
 * - the client failed to get a response → `Error::Transport`
 * - the status is outside 2xx → `Error::HttpStatus`
 * - otherwise → `Ok(body)`
 */
use base64::Engine as _;

use super::http::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::error::{Error, RequestOutcome, Result};
use crate::protocol::constants::USER_AGENT;
use crate::protocol::endpoint::Endpoint;

/// Classifies a raw client result into a `RequestOutcome`.
pub fn classify(result: Result<HttpResponse>) -> RequestOutcome {
    let response = result?;
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(Error::HttpStatus {
            status: response.status,
            reason: response.reason,
        })
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/**
 * Owns the HTTP client plus the settings that are not part of the client
 * session: the endpoint and the basic-auth header.
 */
pub struct Executor<C> {
    client: C,
    endpoint: Endpoint,
    authorization: Option<String>,
}

impl<C: HttpClient> Executor<C> {
    pub fn new(client: C, endpoint: Endpoint) -> Self {
        Self {
            client,
            endpoint,
            authorization: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /**
     * Stores `Authorization: Basic base64(user:pass)` for all later requests.
     */
    pub fn set_basic_authentication(&mut self, user: &str, pass: &str) {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        self.authorization = Some(format!("Basic {token}"));
    }

    /// Starts a request against `base_url + path`.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder<'_> {
        let mut headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];
        if let Some(authorization) = &self.authorization {
            headers.push(("Authorization".to_string(), authorization.clone()));
        }

        RequestBuilder {
            endpoint: &self.endpoint,
            request: HttpRequest {
                method,
                url: self.endpoint.url(path),
                params: Vec::new(),
                headers,
                body: None,
            },
        }
    }

    /// Issues `request` and classifies the result.
    pub fn execute(&self, request: &HttpRequest) -> RequestOutcome {
        classify(self.client.call(request))
    }
}

// ---------------------------------------------------------------------------
// RequestBuilder
// ---------------------------------------------------------------------------

pub struct RequestBuilder<'a> {
    endpoint: &'a Endpoint,
    request: HttpRequest,
}

impl RequestBuilder<'_> {
    /// Adds `db=<database>` from the endpoint.
    pub fn database(mut self) -> Self {
        self.request
            .params
            .push(("db".to_string(), self.endpoint.database().to_string()));
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.request.params.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.request
            .headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    pub fn build(self) -> HttpRequest {
        self.request
    }
}
