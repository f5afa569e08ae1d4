use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Overrides `collection.base-url`
pub const ENV_BASE_URL: &str = "HARVEST_BASE_URL";

/// Overrides `output.database-path`
pub const ENV_DATABASE_PATH: &str = "HARVEST_DATABASE_PATH";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads the configuration file if it exists, otherwise the built-in defaults,
/// then applies environment overrides and validates the result
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)?
    } else {
        tracing::info!(
            "No config file at {}, using built-in defaults",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Applies `HARVEST_*` environment variables on top of a loaded configuration
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(base_url) = lookup(ENV_BASE_URL) {
        tracing::debug!("{} overrides base-url", ENV_BASE_URL);
        config.collection.base_url = base_url;
    }
    if let Some(path) = lookup(ENV_DATABASE_PATH) {
        tracing::debug!("{} overrides database-path", ENV_DATABASE_PATH);
        config.output.database_path = path;
    }
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The hash is recorded with every harvest run so runs made with different
/// settings can be told apart.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the serialized configuration
/// * `Err(ConfigError)` - The configuration could not be serialized
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let content = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
