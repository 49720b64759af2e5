//! Pagination state machine and scrape pass
//!
//! `navigate` walks the result pages of each location in order, collecting
//! detail links until the depth budget is spent, the site reports the end
//! of results, or a page adds nothing new. `scrape` downloads every
//! collected URL afterwards.

use crate::client::{FetchOptions, RequestClient};
use crate::config::{Config, StallPolicy};
use crate::crawler::cursor::CrawlCursor;
use crate::crawler::extract::LinkExtractor;
use crate::crawler::frontier::Frontier;
use crate::crawler::state::CrawlState;
use crate::output::{write_url_list, PageNaming, PageStore};
use crate::ratelimit::Suspension;
use crate::site::SiteProfile;
use crate::HarvestError;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Crawl behavior independent of the site
#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    /// Links collected per location
    pub depth: usize,
    pub on_stall: StallPolicy,
    /// Route requests through the client's proxy pool
    pub use_proxy: bool,
    /// Downloads in flight during `scrape`
    pub scrape_concurrency: usize,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            depth: config.crawl.depth,
            on_stall: config.crawl.on_stall,
            use_proxy: config.proxy.enabled,
            scrape_concurrency: config.crawl.scrape_concurrency,
        }
    }
}

/// How the walk over one location ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOutcome {
    /// The depth budget was spent
    DepthReached,
    /// The site reported the end of results
    Exhausted,
    /// A page added no new links
    Stalled { page: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationReport {
    pub location: String,
    pub outcome: LocationOutcome,
    /// New links collected for this location
    pub collected: usize,
    /// Result pages requested for this location
    pub pages: u32,
}

/// Summary of one `navigate` run
#[derive(Debug, Clone, Default)]
pub struct NavigateReport {
    pub locations: Vec<LocationReport>,
}

impl NavigateReport {
    /// Returns false if any location stalled
    pub fn is_success(&self) -> bool {
        !self
            .locations
            .iter()
            .any(|l| matches!(l.outcome, LocationOutcome::Stalled { .. }))
    }

    pub fn stalled(&self) -> impl Iterator<Item = &LocationReport> {
        self.locations
            .iter()
            .filter(|l| matches!(l.outcome, LocationOutcome::Stalled { .. }))
    }

    pub fn collected(&self) -> usize {
        self.locations.iter().map(|l| l.collected).sum()
    }
}

/// Summary of one `scrape` pass
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub saved: Vec<PathBuf>,
    /// URLs that could not be downloaded
    pub failed: Vec<String>,
}

/// A fetched result page
struct FetchedPage {
    body: String,
    ok: bool,
}

/// Paginated listing crawler
pub struct Crawler {
    client: Arc<RequestClient>,
    site: SiteProfile,
    extractor: Arc<dyn LinkExtractor>,
    settings: CrawlSettings,
    cursor: CrawlCursor,
    frontier: Frontier,
    state: CrawlState,
}

impl Crawler {
    pub fn new(
        client: Arc<RequestClient>,
        site: SiteProfile,
        extractor: Arc<dyn LinkExtractor>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            client,
            site,
            extractor,
            cursor: CrawlCursor::new(settings.depth),
            settings,
            frontier: Frontier::new(),
            state: CrawlState::Idle,
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn cursor(&self) -> &CrawlCursor {
        &self.cursor
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    pub fn client(&self) -> &Arc<RequestClient> {
        &self.client
    }

    fn transition(&mut self, next: CrawlState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("Crawl state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Walks the result pages of each location in order
    ///
    /// Locations must already be in the site's URL form (e.g. `Orlando_FL`).
    ///
    /// # Returns
    ///
    /// * `Ok(NavigateReport)` - Every location was walked; check `is_success`
    ///   for stalls skipped along the way
    /// * `Err(HarvestError::StallDetected)` - A location stalled under the abort policy
    /// * `Err(HarvestError)` - A fatal transport, proxy or cancellation error
    pub async fn navigate<L: AsRef<str>>(
        &mut self,
        locations: &[L],
    ) -> Result<NavigateReport, HarvestError> {
        // A dropped run may have left the machine mid-walk
        if !self.state.is_terminal() {
            tracing::debug!("Discarding unfinished run in state {}", self.state);
            self.state = CrawlState::Errored;
            self.cursor.reset();
        }
        self.transition(CrawlState::Idle)?;

        let mut report = NavigateReport::default();

        for location in locations {
            let location = location.as_ref();
            tracing::info!("Starting scrape for {}", location);

            let walked = match self.walk_location(location).await {
                Ok(walked) => walked,
                Err(e) => {
                    tracing::error!("Crawl of {} failed: {}", location, e);
                    self.state = CrawlState::Errored;
                    self.cursor.reset();
                    return Err(e);
                }
            };

            if let LocationOutcome::Stalled { page } = walked.outcome {
                if self.settings.on_stall == StallPolicy::Abort {
                    return Err(HarvestError::StallDetected {
                        location: location.to_string(),
                        page,
                    });
                }
            }
            report.locations.push(walked);
        }

        self.transition(CrawlState::Done)?;
        tracing::info!("Collected {} urls", self.frontier.len());
        Ok(report)
    }

    async fn walk_location(&mut self, location: &str) -> Result<LocationReport, HarvestError> {
        self.transition(CrawlState::FetchingPage)?;

        let mut page = 1;
        let mut pages = 0;
        let mut url = self.site.search_url(location, page);

        loop {
            let fetched = self.fetch_page(&url).await?;
            pages += 1;
            self.transition(CrawlState::ExtractingLinks)?;

            let outcome = match fetched {
                Some(fetched) if self.extractor.is_not_found(&fetched.body) => {
                    tracing::info!("End of results for {} at page {}", location, page);
                    Some(LocationOutcome::Exhausted)
                }
                Some(fetched) if fetched.ok => {
                    let added = self.collect_links(&fetched.body);
                    tracing::debug!("Page {} of {} added {} links", page, location, added);
                    self.check_progress(added, page)
                }
                _ => self.check_progress(0, page),
            };

            if let Some(outcome) = outcome {
                let collected = self.cursor.collected;
                self.finish_location(location, outcome, collected, page)?;
                self.cursor.reset();
                return Ok(LocationReport {
                    location: location.to_string(),
                    outcome,
                    collected,
                    pages,
                });
            }

            self.transition(CrawlState::AdvancingPage)?;
            page = self.cursor.next_page();
            url = self.site.search_url(location, page);
            self.transition(CrawlState::FetchingPage)?;
        }
    }

    /// Decides whether the location is finished after a page added `added` links
    fn check_progress(&self, added: usize, page: u32) -> Option<LocationOutcome> {
        if self.cursor.depth_reached() {
            Some(LocationOutcome::DepthReached)
        } else if added == 0 {
            Some(LocationOutcome::Stalled { page })
        } else {
            None
        }
    }

    fn finish_location(
        &mut self,
        location: &str,
        outcome: LocationOutcome,
        collected: usize,
        page: u32,
    ) -> Result<(), HarvestError> {
        match outcome {
            LocationOutcome::DepthReached => {
                self.transition(CrawlState::DepthReached)?;
                tracing::info!("Depth limit reached for {} ({} links)", location, collected);
            }
            LocationOutcome::Exhausted => {
                tracing::info!("Collected {} links for {}", collected, location);
            }
            LocationOutcome::Stalled { .. } => {
                self.transition(CrawlState::Errored)?;
                tracing::warn!(
                    "Something went wrong: page {} of {} added no new links",
                    page,
                    location
                );
            }
        }
        Ok(())
    }

    /// Fetches a result page
    ///
    /// Non-fatal failures yield `None` so the page counts as adding nothing.
    async fn fetch_page(&self, url: &str) -> Result<Option<FetchedPage>, HarvestError> {
        let options = FetchOptions {
            location: None,
            use_proxy: self.settings.use_proxy,
        };

        match self.client.fetch(url, options).await {
            Ok(outcome) => Ok(Some(FetchedPage {
                ok: outcome.success,
                body: outcome.body,
            })),
            Err(e) if !e.is_fatal() => {
                tracing::warn!("Could not fetch {}: {}", url, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Adds new detail links from `body` until the depth budget is spent
    fn collect_links(&mut self, body: &str) -> usize {
        let mut added = 0;
        for link in self.extractor.extract_links(body) {
            if self.cursor.depth_reached() {
                break;
            }
            if self.frontier.insert(link) {
                self.cursor.record();
                added += 1;
            }
        }
        added
    }

    /// Downloads `scrape` keeps in flight
    ///
    /// A blocking wait parks the thread that polls every in-flight download,
    /// so a blocking client downloads one page at a time.
    pub fn scrape_concurrency(&self) -> usize {
        match self.client.suspension() {
            Suspension::Blocking => 1,
            Suspension::Cooperative => self.settings.scrape_concurrency.max(1),
        }
    }

    /// Downloads every frontier URL into `store`
    ///
    /// Up to `scrape_concurrency()` downloads run at once; results are handled
    /// in frontier order. URLs that fail with a non-fatal error or a non-ok
    /// status are listed in `failed`.
    pub async fn scrape(
        &self,
        store: &dyn PageStore,
        naming: &PageNaming,
    ) -> Result<ScrapeReport, HarvestError> {
        let options = FetchOptions {
            location: None,
            use_proxy: self.settings.use_proxy,
        };
        let client = &self.client;

        tracing::info!("Scraping {} pages", self.frontier.len());

        let mut downloads = stream::iter(self.frontier.iter().enumerate())
            .map(|(index, url)| async move { (index, url, client.fetch(url, options).await) })
            .buffered(self.scrape_concurrency());

        let mut report = ScrapeReport::default();
        while let Some((index, url, result)) = downloads.next().await {
            match result {
                Ok(outcome) if outcome.success => {
                    let path = store.save(&naming.file_name(index, url), &outcome.body)?;
                    report.saved.push(path);
                }
                Ok(outcome) => {
                    tracing::warn!("Skipping {}: status {}", url, outcome.status);
                    report.failed.push(url.clone());
                }
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("Skipping {}: {}", url, e);
                    report.failed.push(url.clone());
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Saved {} pages ({} failed)",
            report.saved.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Writes the frontier to `path`, one URL per line
    pub fn save_urls(&self, path: &Path) -> Result<(), HarvestError> {
        write_url_list(path, self.frontier.urls())
    }
}
