//! Listing Harvester: a paginated listing crawler
//!
//! This crate walks search-result pages for a list of locations, collects
//! detail-page links into a frontier, and downloads the pages behind them,
//! all under a shared rate limit and an optional rotating proxy pool.

pub mod client;
pub mod config;
pub mod crawler;
pub mod output;
pub mod proxy;
pub mod ratelimit;
pub mod site;

use thiserror::Error;

/// Main error type for Listing Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request to {url} timed out after {attempts} attempts")]
    TransientNetworkTimeout { url: String, attempts: u32 },

    #[error("Too many redirects from {url}")]
    RedirectLoop { url: String },

    #[error("Transport error for {url}: {message}")]
    FatalTransport { url: String, message: String },

    #[error("No proxies available after refresh")]
    EmptyPool,

    #[error("Failed to refresh proxy list: {0}")]
    ProxyRefresh(String),

    #[error("No new links for location {location} on page {page}")]
    StallDetected { location: String, page: u32 },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crawler::CrawlState,
        to: crawler::CrawlState,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true if the error should stop the whole run rather than
    /// just the URL being fetched
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::RedirectLoop { .. } | Self::TransientNetworkTimeout { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown site: {0}")]
    UnknownSite(String),
}

/// Result type alias for Listing Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use client::{HttpOutcome, RequestClient};
pub use config::Config;
pub use crawler::{CrawlState, Crawler};
pub use proxy::{ProxyEntry, ProxyPool};
pub use ratelimit::RateLimiter;
