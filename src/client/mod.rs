//! Rate-limited, retrying HTTP client
//!
//! This module handles every request the harvester makes:
//! - Admission through the shared rate limiter before each attempt
//! - Proxy selection, and eviction of proxies that time out
//! - Retries with exponential backoff and jitter on timeouts
//! - Classification of the final outcome
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Status < 400 | Return outcome |
//! | Status >= 400 | Return outcome with `success == false`, logged |
//! | Timeout | Evict proxy, back off, retry up to `max_attempts` |
//! | Too many redirects | `RedirectLoop`, no retry |
//! | Any other transport error | `FatalTransport`, no retry |

mod blocking;
mod outcome;
mod retry;
mod transport;

pub use blocking::BlockingRequestClient;
pub use outcome::{is_ok_status, HttpOutcome, HttpRequest};
pub use retry::RetryPolicy;
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportError};

use crate::config::Config;
use crate::proxy::{build_proxy_pool, ProxyEntry, ProxyPool};
use crate::ratelimit::{RateLimiter, Suspension};
use crate::HarvestError;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest body excerpt written to the log for a failed status
const LOGGED_BODY_CHARS: usize = 200;

/// Per-call options for `RequestClient::fetch`
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions<'a> {
    /// Substituted for the `{}` placeholder of the URL
    pub location: Option<&'a str>,
    /// Route the request through the proxy pool
    pub use_proxy: bool,
}

impl<'a> FetchOptions<'a> {
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn proxied() -> Self {
        Self {
            location: None,
            use_proxy: true,
        }
    }

    pub fn with_location(mut self, location: &'a str) -> Self {
        self.location = Some(location);
        self
    }
}

/// Substitutes `location` for the first `{}` in `template`
pub fn interpolate(template: &str, location: &str) -> String {
    template.replacen("{}", location, 1)
}

/// HTTP client applying rate limiting, proxy rotation and retries
pub struct RequestClient {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    proxies: Option<Arc<ProxyPool>>,
    retry: RetryPolicy,
    timeout: Duration,
    default_headers: HeaderMap,
    suspension: Suspension,
    cancel: CancellationToken,
}

impl RequestClient {
    /// Creates a client with default retry policy and a 2 second timeout
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            transport,
            limiter,
            proxies: None,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(2),
            default_headers: HeaderMap::new(),
            suspension: Suspension::Cooperative,
            cancel: CancellationToken::new(),
        }
    }

    /// Builds the client described by the configuration
    ///
    /// The proxy pool is only created when proxies are enabled.
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, HarvestError> {
        let transport = ReqwestTransport::new(config.request.max_redirects)?;
        let limiter = RateLimiter::new(config.rate_limit.requests, config.rate_limit.window());

        let mut client = Self::new(Arc::new(transport), Arc::new(limiter))
            .with_retry(RetryPolicy::from_config(&config.request))
            .with_timeout(config.request.timeout())
            .with_user_agent(&config.request.user_agent)?
            .with_cancellation(cancel);

        if config.proxy.enabled {
            let pool = build_proxy_pool(&config.proxy, &config.request)?;
            client = client.with_proxy_pool(Arc::new(pool));
        }

        Ok(client)
    }

    pub fn with_proxy_pool(mut self, pool: Arc<ProxyPool>) -> Self {
        self.proxies = Some(pool);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the User-Agent sent with every request that does not carry its own
    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self, HarvestError> {
        let value = HeaderValue::from_str(user_agent).map_err(|e| {
            HarvestError::Config(crate::ConfigError::Validation(format!(
                "invalid user-agent: {}",
                e
            )))
        })?;
        self.default_headers.insert(USER_AGENT, value);
        Ok(self)
    }

    pub fn with_suspension(mut self, suspension: Suspension) -> Self {
        self.suspension = suspension;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn proxy_pool(&self) -> Option<&Arc<ProxyPool>> {
        self.proxies.as_ref()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn suspension(&self) -> Suspension {
        self.suspension
    }

    /// Performs one logical GET request
    ///
    /// If a location is given it replaces the `{}` placeholder of `url`.
    pub async fn fetch(
        &self,
        url: &str,
        options: FetchOptions<'_>,
    ) -> Result<HttpOutcome, HarvestError> {
        let url = match options.location {
            Some(location) => interpolate(url, location),
            None => url.to_string(),
        };
        self.request(HttpRequest::get(url), options.use_proxy).await
    }

    /// Performs one logical request with any method
    pub async fn request(
        &self,
        mut request: HttpRequest,
        use_proxy: bool,
    ) -> Result<HttpOutcome, HarvestError> {
        for (name, value) in &self.default_headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }

        tracing::debug!("HTTP {} {}", request.method, request.url);

        let mut attempt = 1u32;
        loop {
            let _admission = self.limiter.admit_with(self.suspension, &self.cancel).await?;

            let proxy = if use_proxy {
                Some(self.choose_proxy().await?)
            } else {
                None
            };

            let started = Instant::now();
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled),
                result = self.transport.send(&request, proxy.as_ref(), self.timeout) => result,
            };

            match result {
                Ok(raw) => return Ok(self.finish(request, raw, started.elapsed(), proxy)),
                Err(TransportError::Timeout) => {
                    self.handle_timeout(&request, proxy.as_ref());

                    if !self.retry.allows_retry(attempt) {
                        tracing::error!(
                            "Giving up on {} after {} timed out attempts",
                            request.url,
                            attempt
                        );
                        return Err(HarvestError::TransientNetworkTimeout {
                            url: request.url,
                            attempts: attempt,
                        });
                    }

                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Retrying {} in {:?} (attempt {}/{})",
                        request.url,
                        delay,
                        attempt + 1,
                        self.retry.max_attempts
                    );
                    self.suspension.pause(delay, &self.cancel).await?;
                    attempt += 1;
                }
                Err(TransportError::TooManyRedirects) => {
                    tracing::warn!("Too many redirects from {}", request.url);
                    return Err(HarvestError::RedirectLoop { url: request.url });
                }
                Err(TransportError::Other(message)) => {
                    tracing::error!(
                        "HTTP {} request to {} failed with {}",
                        request.method,
                        request.url,
                        message
                    );
                    return Err(HarvestError::FatalTransport {
                        url: request.url,
                        message,
                    });
                }
            }
        }
    }

    async fn choose_proxy(&self) -> Result<ProxyEntry, HarvestError> {
        let pool = self.proxies.as_ref().ok_or(HarvestError::EmptyPool)?;
        pool.refresh_if_needed().await?;
        let proxy = pool.select()?;
        tracing::debug!("Using proxy={}", proxy);
        Ok(proxy)
    }

    fn handle_timeout(&self, request: &HttpRequest, proxy: Option<&ProxyEntry>) {
        match (proxy, &self.proxies) {
            (Some(entry), Some(pool)) => {
                tracing::warn!(
                    "Timeout for {} through proxy {}, removing it",
                    request.url,
                    entry
                );
                pool.evict(entry);
            }
            _ => tracing::warn!("Timeout for {}", request.url),
        }
    }

    fn finish(
        &self,
        request: HttpRequest,
        raw: RawResponse,
        elapsed: Duration,
        proxy: Option<ProxyEntry>,
    ) -> HttpOutcome {
        let success = is_ok_status(raw.status);
        if !success {
            let excerpt: String = raw.body.chars().take(LOGGED_BODY_CHARS).collect();
            tracing::error!(
                "HTTP {} request to {} returned status code {} and body {}",
                request.method,
                request.url,
                raw.status,
                excerpt
            );
        }

        HttpOutcome {
            status: raw.status,
            body: raw.body,
            elapsed,
            success,
            request,
            proxy,
        }
    }
}
