//! Shared, long-lived leaf state the pipeline's stages close over. One
//! `AppState` is constructed at process start and cloned (cheaply, via
//! `Arc`) into every request.

use std::sync::Arc;

use mcpay_config::GatewayConfig;

use crate::auto_signer::AutoSigner;
use crate::cache::ResponseCache;
use crate::facilitator::Facilitator;
use crate::identity::SessionProvider;
use crate::rate_limit::RateLimitTable;
use crate::store::Store;
use crate::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<dyn Store>,
    pub facilitator: Arc<dyn Facilitator>,
    pub auto_signer: Arc<dyn AutoSigner>,
    pub sessions: Arc<dyn SessionProvider>,
    pub cache: Arc<ResponseCache>,
    pub rate_limits: Arc<RateLimitTable>,
    pub upstream: Arc<dyn UpstreamClient>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn Store>,
        facilitator: Arc<dyn Facilitator>,
        auto_signer: Arc<dyn AutoSigner>,
        sessions: Arc<dyn SessionProvider>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(&config.cache));
        let rate_limits = Arc::new(RateLimitTable::new(&config.rate_limit));
        Self {
            config: Arc::new(config),
            store,
            facilitator,
            auto_signer,
            sessions,
            cache,
            rate_limits,
            upstream,
        }
    }
}
