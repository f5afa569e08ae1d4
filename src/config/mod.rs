//! Configuration module for Swapi-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every setting has a built-in default, so a missing file is not an error for
//! [`load_config_or_default`].
//!
//! # Example
//!
//! ```no_run
//! use swapi_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Batch size: {}", config.collection.batch_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CollectionConfig, Config, FetcherConfig, LinkEntry, OutputConfig};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_or_default,
    ENV_BASE_URL, ENV_DATABASE_PATH,
};
pub use validation::validate;
