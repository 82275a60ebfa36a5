//! Environment-variable configuration for the gateway, grouped into
//! per-concern sub-structs, each loaded via `envy::prefixed`.

pub mod configs;

pub use configs::{
    CacheConfig, HeaderPolicyConfig, InspectConfig, PaymentConfig, RateLimitConfig, RetryConfig,
    ServerConfig, UpstreamConfig,
};
pub use configs::payment::CaptureFailurePolicy;

/// Aggregate configuration for the gateway process.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub inspect: InspectConfig,
    pub headers: HeaderPolicyConfig,
    pub payment: PaymentConfig,
    pub upstream: UpstreamConfig,
}

impl GatewayConfig {
    /// Parses the configuration options' values from the environment
    /// variables. Panics if a required option is missing or malformed.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            retry: RetryConfig::from_env(),
            cache: CacheConfig::from_env(),
            inspect: InspectConfig::from_env(),
            headers: HeaderPolicyConfig::from_env(),
            payment: PaymentConfig::from_env(),
            upstream: UpstreamConfig::from_env(),
        }
    }
}
