use crate::client::{FetchOptions, HttpOutcome, HttpRequest, RequestClient};
use crate::ratelimit::Suspension;
use crate::HarvestError;
use tokio::runtime::{Builder, Runtime};

/// Blocking wrapper around `RequestClient`
///
/// Owns a current-thread runtime and drives every call to completion on the
/// calling thread. Rate-limit and backoff waits park the thread. Must not be
/// used from inside an async runtime: calling it there panics.
pub struct BlockingRequestClient {
    inner: RequestClient,
    runtime: Runtime,
}

impl BlockingRequestClient {
    pub fn new(client: RequestClient) -> Result<Self, HarvestError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            inner: client.with_suspension(Suspension::Blocking),
            runtime,
        })
    }

    /// Blocking version of `RequestClient::fetch`
    pub fn fetch(&self, url: &str, options: FetchOptions<'_>) -> Result<HttpOutcome, HarvestError> {
        self.runtime.block_on(self.inner.fetch(url, options))
    }

    /// Blocking version of `RequestClient::request`
    pub fn request(&self, request: HttpRequest, use_proxy: bool) -> Result<HttpOutcome, HarvestError> {
        self.runtime.block_on(self.inner.request(request, use_proxy))
    }

    pub fn inner(&self) -> &RequestClient {
        &self.inner
    }
}
