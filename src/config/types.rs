use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for Listing Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Site profiles keyed by site name (e.g. "realtor.com")
    pub sites: HashMap<String, SiteConfig>,
}

impl Config {
    /// Returns the profile of the site selected in `[crawl]`
    pub fn active_site(&self) -> Option<&SiteConfig> {
        self.sites.get(&self.crawl.site)
    }
}

/// Sliding-window rate limit shared by every outbound request
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests admitted within one window (0 disables limiting)
    #[serde(default = "default_rate_requests")]
    pub requests: u32,

    /// Length of the trailing window in milliseconds (0 disables limiting)
    #[serde(rename = "window-ms", default = "default_rate_window_ms")]
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_rate_requests(),
            window_ms: default_rate_window_ms(),
        }
    }
}

/// Per-request timeout, retry and header settings
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per logical request, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

/// Rotating proxy pool settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Page listing public proxies as an HTML table
    #[serde(rename = "source-url", default = "default_proxy_source")]
    pub source_url: String,

    /// Only rows whose country column equals this value are kept
    #[serde(default = "default_country")]
    pub country: String,

    /// Seconds after which the pool is refreshed regardless of its size
    #[serde(rename = "refresh-offset-secs", default = "default_refresh_offset")]
    pub refresh_offset_secs: u64,

    /// The pool is refreshed whenever it holds fewer entries than this
    #[serde(rename = "min-pool-size", default = "default_min_pool_size")]
    pub min_pool_size: usize,
}

impl ProxyConfig {
    pub fn refresh_offset(&self) -> Duration {
        Duration::from_secs(self.refresh_offset_secs)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_url: default_proxy_source(),
            country: default_country(),
            refresh_offset_secs: default_refresh_offset(),
            min_pool_size: default_min_pool_size(),
        }
    }
}

/// What to do when a page adds nothing to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StallPolicy {
    /// Record the location as stalled and continue with the next one
    #[default]
    Skip,
    /// Stop the whole run at the first stall
    Abort,
}

/// Crawl targets and budgets
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Key into `[sites]`
    pub site: String,

    /// Maximum number of links collected per location
    pub depth: usize,

    /// Locations in "City, ST" form
    pub locations: Vec<String>,

    #[serde(rename = "on-stall", default)]
    pub on_stall: StallPolicy,

    #[serde(rename = "scrape-concurrency", default = "default_scrape_concurrency")]
    pub scrape_concurrency: usize,
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for all written files
    #[serde(default = "default_output_dir")]
    pub directory: String,

    /// URL list file name, relative to `directory`
    #[serde(rename = "url-list", default = "default_url_list")]
    pub url_list: String,

    /// Directory for exported detail pages, relative to `directory`
    #[serde(rename = "pages-dir", default = "default_pages_dir")]
    pub pages_dir: String,

    /// File name prefix for dated snapshot pages
    #[serde(rename = "snapshot-prefix", default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            url_list: default_url_list(),
            pages_dir: default_pages_dir(),
            snapshot_prefix: default_snapshot_prefix(),
        }
    }
}

/// How a "City, ST" location is written into a search URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStyle {
    /// `Winter-Park_FL`
    #[default]
    Underscore,
    /// `Winter-Park-FL`
    Hyphen,
}

/// Site-specific URL conventions
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL detail paths are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Search URL with a single `{}` placeholder for the location
    #[serde(rename = "search-template")]
    pub search_template: String,

    /// Path prefix that identifies detail-page links
    #[serde(rename = "detail-prefix")]
    pub detail_prefix: String,

    /// CSS selector whose presence marks the end of the results
    #[serde(rename = "not-found-selector", default = "default_not_found_selector")]
    pub not_found_selector: String,

    #[serde(rename = "location-style", default)]
    pub location_style: LocationStyle,
}

fn default_rate_requests() -> u32 {
    10
}

fn default_rate_window_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; rv:91.0) Gecko/20100101 Firefox/91.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_proxy_source() -> String {
    "https://free-proxy-list.net/".to_string()
}

fn default_country() -> String {
    "United States".to_string()
}

fn default_refresh_offset() -> u64 {
    300
}

fn default_min_pool_size() -> usize {
    5
}

fn default_scrape_concurrency() -> usize {
    4
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_url_list() -> String {
    "urls.txt".to_string()
}

fn default_pages_dir() -> String {
    "test_data".to_string()
}

fn default_snapshot_prefix() -> String {
    "real_estate_listing_data".to_string()
}

fn default_not_found_selector() -> String {
    "#error-404".to_string()
}
