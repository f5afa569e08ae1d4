use serde::{Deserialize, Serialize};

/// Main configuration structure for Swapi-Harvest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default = "default_links")]
    pub links: Vec<LinkEntry>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            collection: CollectionConfig::default(),
            links: default_links(),
            output: OutputConfig::default(),
        }
    }
}

/// Request pacing and HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// Maximum number of requests in flight at once
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Minimum time each request slot stays occupied (milliseconds)
    #[serde(rename = "minimum-time-per-request")]
    pub minimum_time_per_request: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 3,
            minimum_time_per_request: 1000,
            request_timeout: 30,
            user_agent: format!("swapi-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// The primary collection and how it is batched
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionConfig {
    /// Collection URL; primaries are fetched from `{base-url}/{id}`
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "first-id")]
    pub first_id: u32,

    /// Inclusive upper bound of the id range
    #[serde(rename = "last-id")]
    pub last_id: u32,

    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Separator used when a list field is flattened into one column
    #[serde(rename = "list-delimiter")]
    pub list_delimiter: String,

    /// Treat dropped primaries (non-200 or failed fetch) as a failed run
    #[serde(rename = "report-dropped", default)]
    pub report_dropped: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://swapi.dev/api/people".to_string(),
            first_id: 1,
            last_id: 83,
            batch_size: 10,
            list_delimiter: ", ".to_string(),
            report_dropped: false,
        }
    }
}

/// One link field and the attribute extracted from the resource it points to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkEntry {
    pub field: String,
    pub attribute: String,
}

impl LinkEntry {
    pub fn new(field: &str, attribute: &str) -> Self {
        Self {
            field: field.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./swapi.db".to_string(),
        }
    }
}

fn default_links() -> Vec<LinkEntry> {
    vec![
        LinkEntry::new("homeworld", "name"),
        LinkEntry::new("films", "title"),
        LinkEntry::new("species", "name"),
        LinkEntry::new("starships", "name"),
        LinkEntry::new("vehicles", "name"),
    ]
}
