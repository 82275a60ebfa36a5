use serde::Deserialize;

/// Per-upstream-host throttle.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,
    #[serde(default = "default_min_request_delay_ms")]
    pub min_request_delay_ms: u64,
}

fn default_max_requests_per_minute() -> u32 {
    30
}

fn default_min_request_delay_ms() -> u64 {
    1000
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        crate::envy_load!("rate_limit", "RATE_LIMIT_")
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
            min_request_delay_ms: default_min_request_delay_ms(),
        }
    }
}
