/// First paginated page; page 1 is the bare search URL
pub const FIRST_PAGINATED_PAGE: u32 = 2;

/// Per-location pagination position and depth window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlCursor {
    /// Next paginated page to request
    pub page: u32,
    /// Links collected in the current depth window
    pub collected: usize,
    /// Links to collect before the location is complete
    pub depth: usize,
}

impl CrawlCursor {
    pub fn new(depth: usize) -> Self {
        Self {
            page: FIRST_PAGINATED_PAGE,
            collected: 0,
            depth,
        }
    }

    /// Counts one newly collected link
    pub fn record(&mut self) {
        self.collected += 1;
    }

    pub fn depth_reached(&self) -> bool {
        self.collected >= self.depth
    }

    /// Links that may still be collected in this depth window
    pub fn remaining(&self) -> usize {
        self.depth.saturating_sub(self.collected)
    }

    /// Returns the page to request next and moves past it
    pub fn next_page(&mut self) -> u32 {
        let page = self.page;
        self.page += 1;
        page
    }

    /// Starts a new depth window from page 2
    pub fn reset(&mut self) {
        self.collected = 0;
        self.page = FIRST_PAGINATED_PAGE;
    }
}
