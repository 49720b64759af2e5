//! Crawler module for paginated listing crawls
//!
//! This module contains the crawl logic, including:
//! - The pagination state machine and its cursor
//! - The deduplicating URL frontier
//! - Detail-link extraction from result pages
//! - The scrape pass over collected URLs
//! - Overall run coordination

mod cursor;
mod extract;
mod frontier;
mod navigator;
mod state;

pub use cursor::CrawlCursor;
pub use extract::{HtmlLinkExtractor, LinkExtractor};
pub use frontier::Frontier;
pub use navigator::{
    CrawlSettings, Crawler, LocationOutcome, LocationReport, NavigateReport, ScrapeReport,
};
pub use state::CrawlState;

use crate::client::RequestClient;
use crate::config::Config;
use crate::output::{Exporter, FileStore, PageNaming};
use crate::ratelimit::Suspension;
use crate::site::SiteProfile;
use crate::{ConfigError, HarvestError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

/// What a run does after collecting URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Collect URLs and write the URL list
    #[default]
    Collect,
    /// Also download each detail page under its last path segment
    Export,
    /// Also download each page under a dated, numbered name
    Scrape,
}

/// Outcome of a complete run
#[derive(Debug)]
pub struct RunSummary {
    pub navigate: NavigateReport,
    pub url_list: PathBuf,
    pub pages: Option<ScrapeReport>,
}

/// Resolves the configured site into a profile
pub fn site_profile(config: &Config) -> Result<SiteProfile, ConfigError> {
    let site = config
        .active_site()
        .ok_or_else(|| ConfigError::UnknownSite(config.crawl.site.clone()))?;
    SiteProfile::from_config(&config.crawl.site, site)
}

/// Formats the configured "City, ST" locations for the configured site
pub fn formatted_locations(config: &Config) -> Result<Vec<String>, ConfigError> {
    let site = site_profile(config)?;
    config
        .crawl
        .locations
        .iter()
        .map(|location| site.format_location(location))
        .collect()
}

fn assemble_crawler(config: &Config, client: RequestClient) -> Result<Crawler, HarvestError> {
    let site = site_profile(config)?;
    let extractor = HtmlLinkExtractor::new(&site)?;
    Ok(Crawler::new(
        Arc::new(client),
        site,
        Arc::new(extractor),
        CrawlSettings::from_config(config),
    ))
}

/// Builds a crawler with the client, site and extractor the configuration describes
pub fn build_crawler(config: &Config, cancel: CancellationToken) -> Result<Crawler, HarvestError> {
    let client = RequestClient::from_config(config, cancel)?;
    assemble_crawler(config, client)
}

/// Runs a complete crawl operation
///
/// This is the main entry point for a run. It will:
/// 1. Build the client, proxy pool and crawler
/// 2. Walk the result pages of every configured location
/// 3. Write the URL list
/// 4. Download pages, depending on `mode`
///
/// The URL list is written even if navigation fails part way.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `mode` - What to do with the collected URLs
/// * `cancel` - Cancels the run at the next wait or request
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run completed; stalls skipped are in the report
/// * `Err(HarvestError)` - The run was aborted
pub async fn run(
    config: &Config,
    mode: RunMode,
    cancel: CancellationToken,
) -> Result<RunSummary, HarvestError> {
    let locations = formatted_locations(config)?;
    let mut crawler = build_crawler(config, cancel)?;

    let output = Path::new(&config.output.directory);
    let url_list = output.join(&config.output.url_list);

    tracing::info!(
        "Crawling {} locations on {} (depth {})",
        locations.len(),
        config.crawl.site,
        config.crawl.depth
    );

    let result = match mode {
        RunMode::Collect => crawler.navigate(&locations).await.map(|nav| (nav, None)),
        RunMode::Export => {
            let exporter = Exporter::new(FileStore::new(output.join(&config.output.pages_dir)));
            exporter
                .collect_pages(&mut crawler, &locations)
                .await
                .map(|report| (report.navigate, Some(report.pages)))
        }
        RunMode::Scrape => match crawler.navigate(&locations).await {
            Ok(nav) => {
                let store = FileStore::new(output);
                let naming = PageNaming::dated_today(&config.output.snapshot_prefix);
                crawler
                    .scrape(&store, &naming)
                    .await
                    .map(|pages| (nav, Some(pages)))
            }
            Err(e) => Err(e),
        },
    };

    let saved = crawler.save_urls(&url_list);
    let (navigate, pages) = result?;
    saved?;

    for stalled in navigate.stalled() {
        tracing::warn!(
            "Location {} stalled after {} links",
            stalled.location,
            stalled.collected
        );
    }

    Ok(RunSummary {
        navigate,
        url_list,
        pages,
    })
}

/// Crawler for callers without an async runtime
///
/// Owns a current-thread runtime; rate-limit and backoff waits park the
/// calling thread. Must not be used from inside an async runtime.
pub struct BlockingCrawler {
    crawler: Crawler,
    runtime: Runtime,
}

impl BlockingCrawler {
    pub fn new(
        client: RequestClient,
        site: SiteProfile,
        extractor: Arc<dyn LinkExtractor>,
        settings: CrawlSettings,
    ) -> Result<Self, HarvestError> {
        let client = client.with_suspension(Suspension::Blocking);
        Ok(Self {
            crawler: Crawler::new(Arc::new(client), site, extractor, settings),
            runtime: Builder::new_current_thread().enable_all().build()?,
        })
    }

    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, HarvestError> {
        let client =
            RequestClient::from_config(config, cancel)?.with_suspension(Suspension::Blocking);
        Ok(Self {
            crawler: assemble_crawler(config, client)?,
            runtime: Builder::new_current_thread().enable_all().build()?,
        })
    }

    /// Blocking version of `Crawler::navigate`
    pub fn navigate<L: AsRef<str>>(
        &mut self,
        locations: &[L],
    ) -> Result<NavigateReport, HarvestError> {
        self.runtime.block_on(self.crawler.navigate(locations))
    }

    /// Blocking version of `Crawler::scrape`; pages are downloaded one at a time
    pub fn scrape(
        &self,
        store: &dyn crate::output::PageStore,
        naming: &PageNaming,
    ) -> Result<ScrapeReport, HarvestError> {
        self.runtime.block_on(self.crawler.scrape(store, naming))
    }

    pub fn save_urls(&self, path: &Path) -> Result<(), HarvestError> {
        self.crawler.save_urls(path)
    }

    pub fn crawler(&self) -> &Crawler {
        &self.crawler
    }
}
