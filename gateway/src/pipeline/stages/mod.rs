//! The fourteen pipeline stages plus the shared `mirror`
//! helper and the pure `retry` fetch wrapper `Upstream` calls into.

pub mod analytics;
pub mod auth_resolve;
pub mod browser_headers;
pub mod cache_read;
pub mod cache_write;
pub mod forward;
pub mod inspect;
pub mod jsonrpc_gate;
pub mod mirror;
pub mod payment_capture;
pub mod payment_preauth;
pub mod rate_limit;
pub mod retry;
pub mod timing;
pub mod upstream;

use std::sync::Arc;

use crate::pipeline::{Pipeline, Stage};
use crate::state::AppState;

/// Assembles the pipeline in the declared stage order. `Retry`
/// has no standalone entry here — see `retry`'s module docs for why.
pub fn build_default_pipeline(state: &AppState) -> Pipeline {
    let stages: Vec<Arc<dyn Stage>> = vec![
        auth_resolve::AuthResolveStage::new(state.store.clone(), state.sessions.clone()),
        timing::TimingStage::new(),
        jsonrpc_gate::JsonRpcGateStage::new(),
        inspect::InspectStage::new(state.store.clone(), state.config.inspect.clone()),
        browser_headers::BrowserHeadersStage::new(
            state.config.headers.clone(),
            state.config.server.gateway_origin.clone(),
        ),
        forward::ForwardStage::new(),
        cache_read::CacheReadStage::new(state.cache.clone(), &state.config.cache),
        rate_limit::RateLimitStage::new(state.rate_limits.clone()),
        payment_preauth::PaymentPreAuthStage::new(
            state.store.clone(),
            state.facilitator.clone(),
            state.auto_signer.clone(),
            state.config.payment.clone(),
        ),
        upstream::UpstreamStage::new(
            state.upstream.clone(),
            state.config.retry.clone(),
            state.config.upstream.clone(),
        ),
        cache_write::CacheWriteStage::new(state.cache.clone(), state.config.cache.clone()),
        payment_capture::PaymentCaptureStage::new(
            state.store.clone(),
            state.facilitator.clone(),
            state.config.payment.clone(),
        ),
        analytics::AnalyticsStage::new(state.store.clone()),
    ];
    Pipeline::new(stages)
}
