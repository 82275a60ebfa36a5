// Public re-exports
pub use self::{
    cache::CacheConfig, headers::HeaderPolicyConfig, inspect::InspectConfig,
    payment::PaymentConfig, rate_limit::RateLimitConfig, retry::RetryConfig,
    server::ServerConfig, upstream::UpstreamConfig,
};

pub mod cache;
pub mod headers;
pub mod inspect;
pub mod payment;
pub mod rate_limit;
pub mod retry;
pub mod server;
pub mod upstream;

/// Convenience macro that loads a structure from the environment, given a
/// variable-name prefix.
///
/// # Panics
///
/// Panics if the config cannot be loaded from the environment variables
/// (e.g. a required field without a default is missing, or malformed).
#[macro_export]
macro_rules! envy_load {
    ($name:expr, $prefix:expr) => {
        envy::prefixed($prefix)
            .from_env()
            .unwrap_or_else(|err| panic!("Cannot load config <{}>: {}", $name, err))
    };
}
