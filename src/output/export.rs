use crate::crawler::{Crawler, NavigateReport, ScrapeReport};
use crate::output::{PageNaming, PageStore};
use crate::HarvestError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one URL per line, in the given order
///
/// Parent directories are created as needed and an existing file is replaced.
pub fn write_url_list<S: AsRef<str>>(path: &Path, urls: &[S]) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for url in urls {
        writeln!(writer, "{}", url.as_ref())?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} URLs to {}", urls.len(), path.display());
    Ok(())
}

/// Result of an export: the crawl and the downloaded detail pages
#[derive(Debug)]
pub struct ExportReport {
    pub navigate: NavigateReport,
    pub pages: ScrapeReport,
}

/// Collects detail pages for a set of locations into a page store
pub struct Exporter<S: PageStore> {
    store: S,
}

impl<S: PageStore> Exporter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Navigates every location, then saves each discovered detail page
    /// under its last path segment
    pub async fn collect_pages<L: AsRef<str>>(
        &self,
        crawler: &mut Crawler,
        locations: &[L],
    ) -> Result<ExportReport, HarvestError> {
        let navigate = crawler.navigate(locations).await?;
        let pages = crawler.scrape(&self.store, &PageNaming::DetailSlug).await?;

        tracing::info!(
            "Exported {} of {} pages",
            pages.saved.len(),
            crawler.frontier().len()
        );

        Ok(ExportReport { navigate, pages })
    }
}
