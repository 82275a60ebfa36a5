use serde::Deserialize;

/// Backoff policy for upstream `429` responses.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_retry_delay_ms() -> u64 {
    2000
}

impl RetryConfig {
    pub fn from_env() -> Self {
        crate::envy_load!("retry", "RETRY_")
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
        }
    }
}
