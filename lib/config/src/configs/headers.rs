use std::env;

/// Header block-list applied when building the upstream request.
///
/// Loaded by hand rather than through `envy_load!`, since it carries a
/// list-valued field (`BLOCKED_HEADER_PREFIXES` is a comma-separated env
/// var) that the `envy` crate can't deserialize on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPolicyConfig {
    /// Lower-case header-name prefixes stripped before forwarding upstream.
    pub blocked_header_prefixes: Vec<String>,
}

fn default_blocked_header_prefixes() -> Vec<String> {
    vec![
        "x-vercel-".to_string(),
        "cf-".to_string(),
        "x-forwarded-".to_string(),
    ]
}

impl HeaderPolicyConfig {
    pub fn from_env() -> Self {
        let blocked_header_prefixes = match env::var("BLOCKED_HEADER_PREFIXES") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => default_blocked_header_prefixes(),
        };

        Self {
            blocked_header_prefixes,
        }
    }
}

impl Default for HeaderPolicyConfig {
    fn default() -> Self {
        Self {
            blocked_header_prefixes: default_blocked_header_prefixes(),
        }
    }
}
