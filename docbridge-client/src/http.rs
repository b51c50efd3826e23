//! Transport boundary for all HTTP I/O.
//!
//! The session never talks to `ureq` directly; it builds an [`HttpRequest`]
//! and hands it to an [`HttpTransport`]. Non-2xx statuses are ordinary
//! responses at this layer; the session decides what a 401 means.

use std::io::Read;
use std::time::Duration;

use crate::error::HttpError;

/// Minimal HTTP method enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// HTTP headers represented as key/value pairs.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request. Query pairs are encoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Get the first header value matching `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    /// Set `name`, replacing any existing value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error messages.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport boundary for all HTTP I/O.
pub trait HttpTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

// ---------------------------------------------------------------------------
// ureq transport
// ---------------------------------------------------------------------------

/// A real, blocking HTTP transport backed by `ureq`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(60))
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self.agent.request(request.method.as_str(), &request.url);
        for (k, v) in &request.query {
            builder = builder.query(k, v);
        }
        for (k, v) in &request.headers {
            builder = builder.set(k, v);
        }

        let result = if request.body.is_empty() {
            builder.call()
        } else {
            builder.send_bytes(&request.body)
        };

        let resp = match result {
            Ok(resp) | Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => return Err(HttpError::Transport(t.to_string())),
        };

        let status = resp.status();
        let headers: HttpHeaders = resp
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = resp.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();

        let mut body = Vec::new();
        resp.into_reader()
            .read_to_end(&mut body)
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory mock transport
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    //! In-memory mock transport: no sockets, no loopback servers.

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    pub struct MockTransport {
        inner: Arc<Mutex<MockTransportInner>>,
    }

    #[derive(Default)]
    struct MockTransportInner {
        routes: HashMap<(HttpMethod, String), VecDeque<HttpResponse>>,
        requests: Vec<HttpRequest>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a response for a method + URL.
        ///
        /// Multiple responses for the same key are returned in FIFO order.
        pub fn push_response(&self, method: HttpMethod, url: impl Into<String>, response: HttpResponse) {
            let mut inner = self
                .inner
                .lock()
                .expect("mock transport lock should not be poisoned");
            inner
                .routes
                .entry((method, url.into()))
                .or_default()
                .push_back(response);
        }

        /// Register a JSON response.
        pub fn push_json(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            status: u16,
            body: serde_json::Value,
        ) {
            self.push_response(
                method,
                url,
                HttpResponse {
                    status,
                    headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                    body: body.to_string().into_bytes(),
                },
            );
        }

        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            let inner = self
                .inner
                .lock()
                .expect("mock transport lock should not be poisoned");
            inner.requests.clone()
        }

        /// Requests matching `method` whose URL ends with `suffix`.
        #[must_use]
        pub fn requests_to(&self, method: HttpMethod, suffix: &str) -> Vec<HttpRequest> {
            self.requests()
                .into_iter()
                .filter(|r| r.method == method && r.url.ends_with(suffix))
                .collect()
        }
    }

    impl HttpTransport for MockTransport {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let mut inner = self
                .inner
                .lock()
                .expect("mock transport lock should not be poisoned");

            let key = (request.method, request.url.clone());
            inner.requests.push(request);

            match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
                Some(resp) => Ok(resp),
                None => Err(HttpError::NoMockResponse {
                    method: key.0.as_str().to_string(),
                    url: key.1,
                }),
            }
        }
    }
}
