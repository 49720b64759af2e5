//! Proxy listing sources
//!
//! The default source downloads a public proxy-list page and reads the first
//! HTML table on it, keeping the rows for one country.

use crate::proxy::pool::ProxyEntry;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

/// Column headers the listing table is expected to carry
const ADDRESS_COLUMN: &str = "IP Address";
const PORT_COLUMN: &str = "Port";
const COUNTRY_COLUMN: &str = "Country";

/// Anything that can produce a fresh list of proxies
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetches the current listing
    ///
    /// Failures are reported as `HarvestError::ProxyRefresh`.
    async fn fetch_entries(&self) -> Result<Vec<ProxyEntry>, HarvestError>;
}

/// Proxy source backed by an HTML table on a web page
pub struct HtmlTableSource {
    client: Client,
    url: String,
    country: String,
}

impl HtmlTableSource {
    /// Creates a source reading `url` and keeping rows whose country is `country`
    pub fn new(
        url: impl Into<String>,
        country: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            country: country.into(),
        })
    }
}

#[async_trait]
impl ProxySource for HtmlTableSource {
    async fn fetch_entries(&self) -> Result<Vec<ProxyEntry>, HarvestError> {
        tracing::debug!("Fetching proxy listing from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| HarvestError::ProxyRefresh(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::ProxyRefresh(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::ProxyRefresh(format!("{}: {}", self.url, e)))?;

        parse_proxy_table(&body, &self.country).map_err(HarvestError::ProxyRefresh)
    }
}

/// Parses the first table of a proxy-list page
///
/// The table must have header cells named "IP Address", "Port" and
/// "Country". Rows for other countries and rows with an unparsable port are
/// skipped.
///
/// # Example
///
/// ```
/// use listing_harvester::proxy::parse_proxy_table;
///
/// let html = r#"<table>
///   <thead><tr><th>IP Address</th><th>Port</th><th>Country</th></tr></thead>
///   <tbody><tr><td>203.0.113.7</td><td>3128</td><td>United States</td></tr></tbody>
/// </table>"#;
/// let entries = parse_proxy_table(html, "United States").unwrap();
/// assert_eq!(entries[0].port, 3128);
/// ```
pub fn parse_proxy_table(html: &str, country: &str) -> Result<Vec<ProxyEntry>, String> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let header_selector = selector("th")?;
    let cell_selector = selector("td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| "no table found in proxy listing".to_string())?;

    let headers: Vec<String> = table
        .select(&row_selector)
        .find(|row| row.select(&header_selector).next().is_some())
        .map(|row| row.select(&header_selector).map(cell_text).collect())
        .ok_or_else(|| "proxy table has no header row".to_string())?;

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("proxy table has no '{}' column", name))
    };
    let address_col = column(ADDRESS_COLUMN)?;
    let port_col = column(PORT_COLUMN)?;
    let country_col = column(COUNTRY_COLUMN)?;

    let mut entries = Vec::new();
    for row in table.select(&row_selector) {
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }

        let (Some(address), Some(port), Some(row_country)) = (
            cells.get(address_col),
            cells.get(port_col),
            cells.get(country_col),
        ) else {
            tracing::trace!("Skipping short proxy row: {:?}", cells);
            continue;
        };

        if row_country != country {
            continue;
        }

        match port.parse::<u16>() {
            Ok(port) if !address.is_empty() => entries.push(ProxyEntry::new(address, port)),
            _ => tracing::debug!("Skipping malformed proxy row: {}:{}", address, port),
        }
    }

    Ok(entries)
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector '{}': {:?}", css, e))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}
