//! HTTP transport
//!
//! The transport performs exactly one physical request and classifies how it
//! failed. Retrying, rate limiting and proxy selection happen above it in
//! `RequestClient`.

use crate::client::outcome::HttpRequest;
use crate::proxy::ProxyEntry;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Proxy};
use std::time::Duration;
use thiserror::Error;

/// Raw response of a single attempt
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// How a single attempt failed
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The attempt did not finish within its timeout
    #[error("request timed out")]
    Timeout,

    /// The redirect chain exceeded the redirect limit
    #[error("too many redirects")]
    TooManyRedirects,

    /// Anything else: connection refused, DNS failure, TLS error, bad proxy URL
    #[error("{0}")]
    Other(String),
}

/// Performs single HTTP requests, optionally through a proxy
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &HttpRequest,
        proxy: Option<&ProxyEntry>,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

/// Transport backed by reqwest
///
/// reqwest binds proxies to a client, so proxied attempts get a client of
/// their own while direct attempts share one.
pub struct ReqwestTransport {
    direct: Client,
    max_redirects: usize,
}

impl ReqwestTransport {
    /// Builds a transport following at most `max_redirects` redirects
    ///
    /// # Example
    ///
    /// ```
    /// use listing_harvester::client::ReqwestTransport;
    ///
    /// let transport = ReqwestTransport::new(10);
    /// assert!(transport.is_ok());
    /// ```
    pub fn new(max_redirects: usize) -> Result<Self, reqwest::Error> {
        Ok(Self {
            direct: build_client(max_redirects, None)?,
            max_redirects,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        proxy: Option<&ProxyEntry>,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let proxied;
        let client = match proxy {
            Some(entry) => {
                proxied = build_client(self.max_redirects, Some(entry))
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                &proxied
            }
            None => &self.direct,
        };

        let mut builder = client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_error)?;

        Ok(RawResponse { status, body })
    }
}

fn build_client(max_redirects: usize, proxy: Option<&ProxyEntry>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .redirect(Policy::limited(max_redirects))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    builder = match proxy {
        Some(entry) => builder.proxy(Proxy::all(entry.proxy_url())?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Maps a reqwest error onto the attempt failure classes
fn classify_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_redirect() {
        TransportError::TooManyRedirects
    } else {
        TransportError::Other(error.to_string())
    }
}
