use serde::Deserialize;

/// Response cache sizing and per-host TTL selection.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_default_ttl_ms")]
    pub default_ttl_ms: u64,
    #[serde(default = "default_coingecko_ttl_ms")]
    pub coingecko_ttl_ms: u64,
    #[serde(default = "default_api_ttl_ms")]
    pub api_ttl_ms: u64,
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    #[serde(default = "default_max_cached_body_bytes")]
    pub max_cached_body_bytes: usize,
    /// Open question: whether responses to paid calls are
    /// eligible for the cache at all. `true` matches the source behavior
    /// (cache runs regardless of `isPaid`); `false` exempts paid calls so
    /// a client can never be charged for a response served from cache.
    #[serde(default = "default_cache_paid_responses")]
    pub cache_paid_responses: bool,
}

fn default_default_ttl_ms() -> u64 {
    30_000
}

fn default_coingecko_ttl_ms() -> u64 {
    60_000
}

fn default_api_ttl_ms() -> u64 {
    45_000
}

fn default_max_cache_size() -> usize {
    100
}

fn default_max_cached_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_cache_paid_responses() -> bool {
    true
}

impl CacheConfig {
    pub fn from_env() -> Self {
        crate::envy_load!("cache", "CACHE_")
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_default_ttl_ms(),
            coingecko_ttl_ms: default_coingecko_ttl_ms(),
            api_ttl_ms: default_api_ttl_ms(),
            max_cache_size: default_max_cache_size(),
            max_cached_body_bytes: default_max_cached_body_bytes(),
            cache_paid_responses: default_cache_paid_responses(),
        }
    }
}
