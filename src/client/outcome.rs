use crate::proxy::ProxyEntry;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use std::time::Duration;

/// A request as issued by the client
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Result of one completed request attempt
///
/// `success` follows the usual client notion of "ok": any status below 400.
/// The originating request is kept for diagnostics.
#[derive(Debug, Clone)]
pub struct HttpOutcome {
    pub status: u16,
    pub body: String,
    pub elapsed: Duration,
    pub success: bool,
    pub request: HttpRequest,
    /// Proxy the successful attempt went through, if any
    pub proxy: Option<ProxyEntry>,
}

impl HttpOutcome {
    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// Returns whether a status code counts as a successful response
pub fn is_ok_status(status: u16) -> bool {
    status < 400
}
