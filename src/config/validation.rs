use crate::config::types::{CollectionConfig, Config, FetcherConfig, LinkEntry, OutputConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_collection_config(&config.collection)?;
    validate_links(&config.links)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be at least 1 second".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_collection_config(config: &CollectionConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.first_id < 1 {
        return Err(ConfigError::Validation(
            "first_id must be >= 1".to_string(),
        ));
    }

    if config.first_id > config.last_id {
        return Err(ConfigError::Validation(format!(
            "first_id ({}) must not exceed last_id ({})",
            config.first_id, config.last_id
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_links(links: &[LinkEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in links {
        if entry.field.is_empty() || entry.attribute.is_empty() {
            return Err(ConfigError::Validation(format!(
                "link entry needs both field and attribute, got field='{}' attribute='{}'",
                entry.field, entry.attribute
            )));
        }

        if !seen.insert(entry.field.as_str()) {
            return Err(ConfigError::Validation(format!(
                "link field '{}' is declared more than once",
                entry.field
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
