//! Crawl state definitions
//!
//! The crawler walks one location at a time through these states. Terminal
//! states may be left again only by starting a new `navigate` run.

use std::fmt;

/// Current state of the pagination state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlState {
    /// No run in progress
    #[default]
    Idle,

    /// A result page is being requested
    FetchingPage,

    /// Links are being collected from the last fetched page
    ExtractingLinks,

    /// The page cursor is moving to the next result page
    AdvancingPage,

    /// The depth budget of the current location is spent
    DepthReached,

    /// A location stalled or a fatal error stopped the run
    Errored,

    /// Every location has been processed
    Done,
}

impl CrawlState {
    /// Returns true if no further step follows without a new run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle | Self::Errored | Self::Done)
    }

    /// Returns true if `next` may directly follow this state
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;

        match (self, next) {
            (Idle | Done | Errored, Idle) => true,
            (Idle, FetchingPage | Done) => true,
            (FetchingPage, ExtractingLinks | Errored) => true,
            // Exhausted locations end directly from extraction
            (ExtractingLinks, AdvancingPage | DepthReached | Errored | FetchingPage | Done) => {
                true
            }
            (AdvancingPage, FetchingPage) => true,
            (DepthReached, FetchingPage | Done) => true,
            // A skipped stall moves on to the next location
            (Errored, FetchingPage | Done) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingPage => "fetching_page",
            Self::ExtractingLinks => "extracting_links",
            Self::AdvancingPage => "advancing_page",
            Self::DepthReached => "depth_reached",
            Self::Errored => "errored",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
