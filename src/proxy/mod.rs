//! Rotating proxy pool
//!
//! This module handles:
//! - Fetching proxy listings from an external source
//! - Refreshing the pool when it runs low or grows old
//! - Random selection and eviction of failing proxies

mod pool;
mod source;

pub use pool::{PoolSettings, ProxyEntry, ProxyPool};
pub use source::{parse_proxy_table, HtmlTableSource, ProxySource};

use crate::config::{ProxyConfig, RequestConfig};
use crate::HarvestError;
use std::sync::Arc;

/// Builds a proxy pool backed by the configured listing page
pub fn build_proxy_pool(
    proxy: &ProxyConfig,
    request: &RequestConfig,
) -> Result<ProxyPool, HarvestError> {
    let source = HtmlTableSource::new(
        &proxy.source_url,
        &proxy.country,
        &request.user_agent,
        request.timeout().max(std::time::Duration::from_secs(10)),
    )?;

    Ok(ProxyPool::new(
        Arc::new(source),
        PoolSettings {
            min_size: proxy.min_pool_size,
            refresh_offset: proxy.refresh_offset(),
        },
    ))
}
