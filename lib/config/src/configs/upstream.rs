use serde::Deserialize;

/// Global upstream fetch budget applied across the entire Retry loop.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        crate::envy_load!("upstream", "UPSTREAM_")
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}
