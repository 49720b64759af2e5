//! Detail-link extraction from result pages
//!
//! This module handles:
//! - Finding links to detail pages (by path prefix)
//! - Resolving them against the site's base URL
//! - Detecting the site's "no results" marker

use crate::site::SiteProfile;
use crate::ConfigError;
use scraper::{Html, Selector};
use url::Url;

/// Pulls detail-page links out of a result page
pub trait LinkExtractor: Send + Sync {
    /// Returns absolute detail-page URLs in document order
    fn extract_links(&self, html: &str) -> Vec<String>;

    /// Returns true if the page is the site's end-of-results page
    fn is_not_found(&self, html: &str) -> bool;
}

/// `LinkExtractor` for sites whose detail pages share a path prefix
pub struct HtmlLinkExtractor {
    base_url: Url,
    detail_prefix: String,
    anchors: Selector,
    not_found: Selector,
}

impl HtmlLinkExtractor {
    /// Creates an extractor for the given site
    ///
    /// # Returns
    ///
    /// * `Ok(HtmlLinkExtractor)` - Selectors compiled
    /// * `Err(ConfigError::Validation)` - The not-found selector is not valid CSS
    pub fn new(site: &SiteProfile) -> Result<Self, ConfigError> {
        let anchors = Selector::parse("a[href]")
            .map_err(|e| ConfigError::Validation(format!("anchor selector: {:?}", e)))?;
        let not_found = Selector::parse(&site.not_found_selector).map_err(|e| {
            ConfigError::Validation(format!(
                "not-found selector '{}': {:?}",
                site.not_found_selector, e
            ))
        })?;

        Ok(Self {
            base_url: site.base_url.clone(),
            detail_prefix: site.detail_prefix.clone(),
            anchors,
            not_found,
        })
    }

    /// Resolves `href` and keeps it only if it is a detail page of this site
    fn resolve_detail_link(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let absolute = self.base_url.join(href).ok()?;
        if absolute.scheme() != "http" && absolute.scheme() != "https" {
            return None;
        }
        if absolute.host_str() != self.base_url.host_str() {
            return None;
        }
        if !absolute.path().starts_with(&self.detail_prefix) {
            return None;
        }

        Some(absolute.to_string())
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);

        document
            .select(&self.anchors)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| self.resolve_detail_link(href))
            .collect()
    }

    fn is_not_found(&self, html: &str) -> bool {
        Html::parse_document(html)
            .select(&self.not_found)
            .next()
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocationStyle, SiteConfig};

    fn extractor() -> HtmlLinkExtractor {
        let site = SiteProfile::from_config(
            "realtor.com",
            &SiteConfig {
                base_url: "https://www.realtor.com".to_string(),
                search_template: "https://www.realtor.com/realestateandhomes-search/{}"
                    .to_string(),
                detail_prefix: "/realestateandhomes-detail/".to_string(),
                not_found_selector: "#error-404".to_string(),
                location_style: LocationStyle::Underscore,
            },
        )
        .unwrap();
        HtmlLinkExtractor::new(&site).unwrap()
    }

    #[test]
    fn test_extracts_detail_links_only() {
        let html = r##"
            <html><body>
                <a href="/realestateandhomes-detail/123-Main-St_Orlando_FL_32801">A</a>
                <a href="/realestateandhomes-search/Orlando_FL/pg-2">Next</a>
                <a href="https://www.realtor.com/realestateandhomes-detail/9-Oak-Ave_Orlando_FL_32803">B</a>
                <a href="https://elsewhere.com/realestateandhomes-detail/x">Other site</a>
                <a href="mailto:agent@example.com">Mail</a>
                <a href="#top">Top</a>
            </body></html>
        "##;

        let links = extractor().extract_links(html);
        assert_eq!(
            links,
            vec![
                "https://www.realtor.com/realestateandhomes-detail/123-Main-St_Orlando_FL_32801",
                "https://www.realtor.com/realestateandhomes-detail/9-Oak-Ave_Orlando_FL_32803",
            ]
        );
    }

    #[test]
    fn test_not_found_marker() {
        let extractor = extractor();
        assert!(extractor.is_not_found(r#"<html><body><div id="error-404">Sorry</div></body></html>"#));
        assert!(!extractor.is_not_found("<html><body><p>Results</p></body></html>"));
    }

    #[test]
    fn test_empty_document() {
        assert!(extractor().extract_links("").is_empty());
    }

    #[test]
    fn test_invalid_not_found_selector() {
        let mut site = SiteProfile::from_config(
            "example",
            &SiteConfig {
                base_url: "https://example.com".to_string(),
                search_template: "https://example.com/{}".to_string(),
                detail_prefix: "/detail/".to_string(),
                not_found_selector: "#ok".to_string(),
                location_style: LocationStyle::Hyphen,
            },
        )
        .unwrap();
        site.not_found_selector = "[[".to_string();
        assert!(HtmlLinkExtractor::new(&site).is_err());
    }
}
