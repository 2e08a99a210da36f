//! HTTP mock server helpers for testing outbound HTTP calls.
//!
//! This module provides a thin wrapper around `wiremock` for declarative
//! HTTP stubbing. Use it to mock the open-data API (and Cloud Storage) in
//! integration tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::common::http_mock::MockHttpServer;
//!
//! #[tokio::test]
//! async fn test_external_api_call() {
//!     let server = MockHttpServer::start().await;
//!
//!     server
//!         .expect_get("/deputados")
//!         .with_query("pagina", "1")
//!         .respond_with_json(json!({"dados": []}))
//!         .mount()
//!         .await;
//!
//!     // Point the client at server.url()
//! }
//! ```
//!
//! # Patterns
//!
//! - **Success response**: `.respond_with_json(value)`
//! - **Error response**: `.respond_with_status(503)`
//! - **Transient error**: `.respond_with_status(503).up_to_n_times(2)` mounted before the success stub
//! - **Timeout simulation**: `.respond_with_delay(Duration::from_secs(30))`
//! - **Request verification**: `.expect_times(1)` then `server.verify().await`

use std::time::Duration;

use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, Request, ResponseTemplate};

/// A running stub server.
pub struct MockHttpServer {
    server: MockServer,
}

impl MockHttpServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the server (no trailing slash).
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// The underlying `wiremock` server, for matchers this wrapper lacks.
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    pub fn expect_get(&self, route: &str) -> StubBuilder<'_> {
        StubBuilder::new(&self.server, "GET", route)
    }

    pub fn expect_post(&self, route: &str) -> StubBuilder<'_> {
        StubBuilder::new(&self.server, "POST", route)
    }

    /// Check every `expect_times` expectation.
    pub async fn verify(&self) {
        self.server.verify().await;
    }

    /// Requests received so far, in arrival order.
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Received requests whose path is `route`.
    pub async fn requests_to(&self, route: &str) -> Vec<Request> {
        self.received_requests()
            .await
            .into_iter()
            .filter(|request| request.url.path() == route)
            .collect()
    }
}

/// Builder for one stubbed route.
pub struct StubBuilder<'a> {
    server: &'a MockServer,
    mock: MockBuilder,
    status: u16,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    delay: Option<Duration>,
    expected_calls: Option<u64>,
    max_calls: Option<u64>,
}

impl<'a> StubBuilder<'a> {
    fn new(server: &'a MockServer, verb: &str, route: &str) -> Self {
        Self {
            server,
            mock: Mock::given(method(verb)).and(path(route)),
            status: 200,
            body: None,
            headers: Vec::new(),
            delay: None,
            expected_calls: None,
            max_calls: None,
        }
    }

    /// Only match requests carrying this header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.mock = self.mock.and(header(name, value));
        self
    }

    /// Only match requests carrying this query pair.
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.mock = self.mock.and(query_param(name, value));
        self
    }

    /// Respond 200 with a JSON body.
    pub fn respond_with_json(mut self, body: Value) -> Self {
        self.status = 200;
        self.body = Some(body);
        self
    }

    /// Respond with `status` (and no body unless one is added).
    pub fn respond_with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Attach a JSON body to a non-200 response.
    pub fn with_json_response(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a response header.
    pub fn with_response_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn respond_with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail `verify()` unless the stub matched exactly `n` times.
    pub fn expect_times(mut self, n: u64) -> Self {
        self.expected_calls = Some(n);
        self
    }

    /// Stop matching after `n` requests, letting later stubs answer.
    pub fn up_to_n_times(mut self, n: u64) -> Self {
        self.max_calls = Some(n);
        self
    }

    pub async fn mount(self) {
        let mut template = ResponseTemplate::new(self.status);
        if let Some(body) = self.body {
            template = template.set_body_json(body);
        }
        for (name, value) in &self.headers {
            template = template.insert_header(name.as_str(), value.as_str());
        }
        if let Some(delay) = self.delay {
            template = template.set_delay(delay);
        }

        let mut mock = self.mock.respond_with(template);
        if let Some(n) = self.max_calls {
            mock = mock.up_to_n_times(n);
        }
        if let Some(n) = self.expected_calls {
            mock = mock.expect(n);
        }
        mock.mount(self.server).await;
    }
}
