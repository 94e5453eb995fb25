use std::time::Duration;

/// Default ADS endpoint.
pub const DEFAULT_API_URL: &str = "https://ads.atmosphere.copernicus.eu/api";

/// Configuration for the ADS client.
#[derive(Debug, Clone)]
pub struct CamsConfig {
    /// API root, without the `/retrieve/v1` suffix.
    pub api_url: String,
    /// Personal access token sent as `PRIVATE-TOKEN`.
    pub api_key: String,
    /// Timeout of each individual HTTP request.
    pub request_timeout: Duration,
    /// Delay between job status polls.
    pub poll_interval: Duration,
    /// Give up on a queued job after this long.
    pub max_wait: Duration,
}

impl Default for CamsConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(600),
        }
    }
}

impl CamsConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }
}
