use crate::config::types::{Config, CrawlerConfig, FetchMode, ProxyConfig, SeedConfig, UserAgentConfig};
use crate::extract::FieldSpec;
use crate::ConfigError;
use scraper::Selector;
use std::collections::BTreeMap;
use url::Url;

/// Upper bound on concurrent fetches
pub const MAX_CONCURRENCY_LIMIT: u32 = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_proxy_config(&config.proxy)?;
    validate_seeds(&config.seeds)?;
    validate_fields(&config.fields)?;
    Ok(())
}

/// Validates crawler configuration
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_concurrency_limit(config.concurrency_limit)?;

    if !config.base_delay.is_finite() || config.base_delay < 0.0 {
        return Err(ConfigError::Validation(format!(
            "base_delay must be a finite number >= 0, got {}",
            config.base_delay
        )));
    }

    if !config.timeout.is_finite() || config.timeout <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "timeout must be > 0 seconds, got {}",
            config.timeout
        )));
    }

    if !config.robots_timeout.is_finite() || config.robots_timeout <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "robots_timeout must be > 0 seconds, got {}",
            config.robots_timeout
        )));
    }

    if !config.cancel_grace.is_finite() || config.cancel_grace < 0.0 {
        return Err(ConfigError::Validation(format!(
            "cancel_grace must be >= 0 seconds, got {}",
            config.cancel_grace
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.fetch_mode == FetchMode::RenderService {
        let endpoint = config.render_endpoint.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "render_endpoint is required when fetch_mode is render-service".to_string(),
            )
        })?;
        Url::parse(endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid render_endpoint '{}': {}", endpoint, e))
        })?;
    }

    Ok(())
}

/// Validates a concurrency ceiling
pub fn validate_concurrency_limit(limit: u32) -> Result<(), ConfigError> {
    if limit < 1 || limit > MAX_CONCURRENCY_LIMIT {
        return Err(ConfigError::Validation(format!(
            "concurrency_limit must be between 1 and {}, got {}",
            MAX_CONCURRENCY_LIMIT, limit
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    if config.robots_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "robots_token cannot be empty".to_string(),
        ));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

/// Validates proxy addresses
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for proxy in &config.proxy_list {
        let url = Url::parse(proxy).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid proxy address '{}': {}", proxy, e))
        })?;
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Proxy address '{}' has no host",
                proxy
            )));
        }
    }
    Ok(())
}

/// Validates seed URLs
fn validate_seeds(config: &SeedConfig) -> Result<(), ConfigError> {
    for seed in &config.urls {
        crate::url::parse_seed(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
    }
    Ok(())
}

/// Validates that every field selector compiles
pub fn validate_fields(fields: &BTreeMap<String, FieldSpec>) -> Result<(), ConfigError> {
    for (name, spec) in fields {
        if spec.selector.trim().is_empty() {
            return Err(ConfigError::InvalidSelector {
                field: name.clone(),
                message: "selector cannot be empty".to_string(),
            });
        }

        Selector::parse(&spec.selector).map_err(|e| ConfigError::InvalidSelector {
            field: name.clone(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::AttributeMode;

    #[test]
    fn test_valid_default_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.crawler.concurrency_limit = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_excessive_concurrency_rejected() {
        let mut config = Config::default();
        config.crawler.concurrency_limit = MAX_CONCURRENCY_LIMIT + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_negative_base_delay_rejected() {
        let mut config = Config::default();
        config.crawler.base_delay = -1.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_base_delay_allowed() {
        let mut config = Config::default();
        config.crawler.base_delay = 0.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.crawler.timeout = 0.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        let mut config = Config::default();
        config.crawler.max_pages = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_render_service_requires_endpoint() {
        let mut config = Config::default();
        config.crawler.fetch_mode = FetchMode::RenderService;
        assert!(validate(&config).is_err());

        config.crawler.render_endpoint = Some("http://127.0.0.1:3000/render".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_crawler_name() {
        let mut config = Config::default();
        config.user_agent.crawler_name = "bad name!".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let mut config = Config::default();
        config.proxy.proxy_list = vec!["not a proxy".to_string()];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_malformed_seed_rejected() {
        let mut config = Config::default();
        config.seeds.urls = vec!["ftp://example.com/file".to_string()];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut config = Config::default();
        config.fields.insert(
            "broken".to_string(),
            FieldSpec {
                selector: "div[[".to_string(),
                attribute: AttributeMode::Text,
                multiple: false,
                default: None,
            },
        );
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }
}
