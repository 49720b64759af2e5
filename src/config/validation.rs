use crate::config::types::{
    Config, CrawlConfig, OutputConfig, ProxyConfig, RequestConfig, SiteConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_request_config(&config.request)?;
    validate_proxy_config(&config.proxy)?;
    validate_crawl_config(&config.crawl)?;
    validate_output_config(&config.output)?;

    for (name, site) in &config.sites {
        validate_site_config(name, site)?;
    }

    if !config.sites.contains_key(&config.crawl.site) {
        return Err(ConfigError::UnknownSite(config.crawl.site.clone()));
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-max-ms ({}) must be >= backoff-base-ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    Url::parse(&config.source_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy source-url: {}", e)))?;

    if config.country.trim().is_empty() {
        return Err(ConfigError::Validation(
            "proxy country cannot be empty".to_string(),
        ));
    }

    if config.min_pool_size == 0 {
        return Err(ConfigError::Validation(
            "min-pool-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.depth == 0 {
        return Err(ConfigError::Validation("depth must be >= 1".to_string()));
    }

    if config.scrape_concurrency < 1 || config.scrape_concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "scrape-concurrency must be between 1 and 64, got {}",
            config.scrape_concurrency
        )));
    }

    for location in &config.locations {
        if location.trim().is_empty() {
            return Err(ConfigError::Validation(
                "locations cannot contain empty entries".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.url_list.is_empty() {
        return Err(ConfigError::Validation(
            "url-list cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_site_config(name: &str, site: &SiteConfig) -> Result<(), ConfigError> {
    Url::parse(&site.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base-url for '{}': {}", name, e))
    })?;

    let placeholders = site.search_template.matches("{}").count();
    if placeholders != 1 {
        return Err(ConfigError::Validation(format!(
            "search-template for '{}' must contain exactly one '{{}}', found {}",
            name, placeholders
        )));
    }

    Url::parse(&site.search_template.replace("{}", "placeholder")).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid search-template for '{}': {}", name, e))
    })?;

    if site.detail_prefix.is_empty() {
        return Err(ConfigError::Validation(format!(
            "detail-prefix for '{}' cannot be empty",
            name
        )));
    }

    if scraper::Selector::parse(&site.not_found_selector).is_err() {
        return Err(ConfigError::Validation(format!(
            "not-found-selector for '{}' is not a valid CSS selector: '{}'",
            name, site.not_found_selector
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationStyle;

    fn site() -> SiteConfig {
        SiteConfig {
            base_url: "https://www.realtor.com".to_string(),
            search_template: "https://www.realtor.com/realestateandhomes-search/{}".to_string(),
            detail_prefix: "/realestateandhomes-detail/".to_string(),
            not_found_selector: "#error-404".to_string(),
            location_style: LocationStyle::Underscore,
        }
    }

    #[test]
    fn test_validate_site_config() {
        assert!(validate_site_config("realtor.com", &site()).is_ok());

        let mut no_placeholder = site();
        no_placeholder.search_template = "https://www.realtor.com/search".to_string();
        assert!(validate_site_config("realtor.com", &no_placeholder).is_err());

        let mut two_placeholders = site();
        two_placeholders.search_template = "https://www.realtor.com/{}/{}".to_string();
        assert!(validate_site_config("realtor.com", &two_placeholders).is_err());

        let mut bad_base = site();
        bad_base.base_url = "not a url".to_string();
        assert!(matches!(
            validate_site_config("realtor.com", &bad_base),
            Err(ConfigError::InvalidUrl(_))
        ));

        let mut bad_selector = site();
        bad_selector.not_found_selector = "###".to_string();
        assert!(validate_site_config("realtor.com", &bad_selector).is_err());
    }

    #[test]
    fn test_validate_request_config() {
        assert!(validate_request_config(&RequestConfig::default()).is_ok());

        let zero_attempts = RequestConfig {
            max_attempts: 0,
            ..RequestConfig::default()
        };
        assert!(validate_request_config(&zero_attempts).is_err());

        let inverted_backoff = RequestConfig {
            backoff_base_ms: 2000,
            backoff_max_ms: 1000,
            ..RequestConfig::default()
        };
        assert!(validate_request_config(&inverted_backoff).is_err());
    }

    #[test]
    fn test_disabled_proxy_skips_validation() {
        let config = ProxyConfig {
            enabled: false,
            country: String::new(),
            ..ProxyConfig::default()
        };
        assert!(validate_proxy_config(&config).is_ok());

        let enabled = ProxyConfig {
            country: String::new(),
            ..ProxyConfig::default()
        };
        assert!(validate_proxy_config(&enabled).is_err());
    }
}
