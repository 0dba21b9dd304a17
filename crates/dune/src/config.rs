//! Connection settings for the Dune API.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.dune.com";
pub const DEFAULT_PERFORMANCE: &str = "medium";

#[derive(Debug, Clone)]
pub struct DuneConfig {
    pub base_url: String,
    pub api_key: String,
    /// Execution tier requested from the engine ("medium" or "large").
    pub performance: String,
    /// Delay between execution status checks.
    pub poll_interval: Duration,
    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
}

impl DuneConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

impl Default for DuneConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            performance: DEFAULT_PERFORMANCE.to_string(),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}
