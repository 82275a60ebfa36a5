//! Thin wrapper around `tracing` used by every binary in this workspace.
//!
//! Mirrors the logging surface the rest of the gateway expects: a single
//! `init()` call installs a `tracing-subscriber` formatter driven by
//! `RUST_LOG`, and optionally a Sentry guard when `SENTRY_DSN` is set.
//! Nothing in the gateway should reach for `println!`/`eprintln!` or the
//! bare `log` macros directly; everything goes through `tracing`.

pub use tracing::{debug, error, info, trace, warn};

use std::env;
use tracing_subscriber::EnvFilter;

/// Guard returned by [`init`]. Dropping it flushes any pending Sentry
/// events; keep it alive for the lifetime of `main`.
pub struct VlogGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Installs the global tracing subscriber and, if `SENTRY_DSN` is set,
/// an error-reporting client. Call once, at the top of `main`.
pub fn init() -> VlogGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let sentry_guard = env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    VlogGuard {
        _sentry: sentry_guard,
    }
}
