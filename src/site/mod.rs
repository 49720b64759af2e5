//! Site profiles and location formatting
//!
//! A `SiteProfile` captures the URL conventions of one listing site: where
//! search results live, how result pages are numbered and which links point
//! at detail pages.

use crate::config::{LocationStyle, SiteConfig};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validated URL conventions of one listing site
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Key of the site in the configuration
    pub name: String,
    pub base_url: Url,
    /// Search URL with a single `{}` placeholder for the location
    pub search_template: String,
    /// Path prefix of detail-page links
    pub detail_prefix: String,
    pub not_found_selector: String,
    pub location_style: LocationStyle,
}

impl SiteProfile {
    /// Builds a profile from its configuration entry
    ///
    /// # Arguments
    ///
    /// * `name` - Site key, used in log messages
    /// * `config` - The `[sites.<name>]` table
    ///
    /// # Returns
    ///
    /// * `Ok(SiteProfile)` - The base URL parsed
    /// * `Err(ConfigError::InvalidUrl)` - The base URL is not a valid URL
    pub fn from_config(name: &str, config: &SiteConfig) -> ConfigResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        Ok(Self {
            name: name.to_string(),
            base_url,
            search_template: config.search_template.clone(),
            detail_prefix: config.detail_prefix.clone(),
            not_found_selector: config.not_found_selector.clone(),
            location_style: config.location_style,
        })
    }

    /// URL of a result page for an already formatted location
    ///
    /// Page 1 is the bare search URL; later pages append `/pg-<n>`.
    pub fn search_url(&self, location: &str, page: u32) -> String {
        let first = crate::client::interpolate(&self.search_template, location);
        if page <= 1 {
            first
        } else {
            format!("{}/pg-{}", first.trim_end_matches('/'), page)
        }
    }

    /// Formats a "City, ST" location the way this site expects
    pub fn format_location(&self, location: &str) -> ConfigResult<String> {
        format_location(self.location_style, location)
    }
}

/// Formats a "City Name, ST" location for use in a search URL
///
/// Words of the city are joined with hyphens. The state code is attached
/// with an underscore or a hyphen depending on `style`.
///
/// # Example
///
/// ```
/// use listing_harvester::config::LocationStyle;
/// use listing_harvester::site::format_location;
///
/// let formatted = format_location(LocationStyle::Underscore, "Winter Park, FL").unwrap();
/// assert_eq!(formatted, "Winter-Park_FL");
/// ```
pub fn format_location(style: LocationStyle, location: &str) -> ConfigResult<String> {
    let (city, state) = location.split_once(',').ok_or_else(|| {
        ConfigError::Validation(format!(
            "location '{}' must have the form 'City, ST'",
            location
        ))
    })?;

    let city = city.split_whitespace().collect::<Vec<_>>().join("-");
    let state = state.trim();

    if city.is_empty() || state.is_empty() || state.contains(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "location '{}' must have the form 'City, ST'",
            location
        )));
    }

    let separator = match style {
        LocationStyle::Underscore => '_',
        LocationStyle::Hyphen => '-',
    };

    Ok(format!("{}{}{}", city, separator, state))
}
