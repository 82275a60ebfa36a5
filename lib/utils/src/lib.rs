//! Small environment-variable helpers shared by `mcpay_config` and the
//! gateway binary, in the same spirit as the workspace's internal
//! `zksync_utils` env helpers.

use std::env;
use std::fmt::Debug;
use std::str::FromStr;

/// Reads a required environment variable, panicking with its name on failure.
pub fn get_env(name: &str) -> String {
    env::var(name).unwrap_or_else(|e| panic!("Env var {} missing, error: {}", name, e))
}

/// Parses a required environment variable via `FromStr`.
pub fn parse_env<F>(name: &str) -> F
where
    F: FromStr,
    F::Err: Debug,
{
    get_env(name)
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse environment variable {}: {:?}", name, e))
}

/// Parses an optional environment variable; returns `None` if unset.
pub fn parse_env_if_exists<F>(name: &str) -> Option<F>
where
    F: FromStr,
    F::Err: Debug,
{
    env::var(name)
        .ok()
        .map(|value| value.parse().unwrap_or_else(|e| {
            panic!("Failed to parse environment variable {}: {:?}", name, e)
        }))
}

/// Parses a required environment variable with a custom string transform
/// applied before `FromStr` (e.g. stripping a `0x` prefix).
pub fn parse_env_with<F>(name: &str, transform: impl FnOnce(&str) -> &str) -> F
where
    F: FromStr,
    F::Err: Debug,
{
    let value = get_env(name);
    transform(&value)
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse environment variable {}: {:?}", name, e))
}

/// Parses a required environment variable as a default-separated list.
pub fn parse_env_list<F>(name: &str) -> Vec<F>
where
    F: FromStr,
    F::Err: Debug,
{
    get_env(name)
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .unwrap_or_else(|e| panic!("Failed to parse list entry of {}: {:?}", name, e))
        })
        .collect()
}

/// Base64-encodes the first `len` bytes of `data` (or fewer, if shorter).
pub fn fingerprint(data: &[u8], len: usize) -> String {
    let cut = &data[..data.len().min(len)];
    base64::encode(cut)
}
