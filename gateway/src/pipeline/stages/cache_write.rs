//! Stage 12: `CacheWrite`. Stores successful `GET` responses
//! with a host-specific TTL. A no-op for cache hits (nothing changed) and,
//! per the `cache_paid_responses` policy toggle, for paid calls
//! when the operator has opted paid responses out of the cache.

use std::sync::Arc;
use std::time::Instant;

use mcpay_config::CacheConfig;

use crate::cache::{select_ttl, CacheEntry, ResponseCache};
use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};

pub struct CacheWriteStage {
    pub cache: Arc<ResponseCache>,
    pub config: CacheConfig,
}

impl CacheWriteStage {
    pub fn new(cache: Arc<ResponseCache>, config: CacheConfig) -> Arc<Self> {
        Arc::new(Self { cache, config })
    }
}

#[async_trait::async_trait]
impl Stage for CacheWriteStage {
    fn name(&self) -> &'static str {
        "CacheWrite"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        let Some(key) = ctx.cache_key.clone() else {
            return Ok(StageOutcome::Continue);
        };
        let Some(response) = &ctx.upstream_response else {
            return Ok(StageOutcome::Continue);
        };
        if response.from_cache || response.status.as_u16() >= 400 {
            return Ok(StageOutcome::Continue);
        }
        let is_paid = ctx.tool_call.as_ref().map(|t| t.is_paid).unwrap_or(false);
        if is_paid && !self.config.cache_paid_responses {
            return Ok(StageOutcome::Continue);
        }

        let Some(request) = &ctx.upstream_request else {
            return Ok(StageOutcome::Continue);
        };
        let Some(host) = request.url.host_str() else {
            return Ok(StageOutcome::Continue);
        };

        self.cache.insert(
            key,
            CacheEntry {
                status: response.status.as_u16(),
                status_text: response.status.canonical_reason().unwrap_or_default().to_string(),
                headers: response.headers.clone(),
                body: response.body.clone(),
                inserted_at: Instant::now(),
                ttl: select_ttl(host, &self.config),
            },
        );

        Ok(StageOutcome::Continue)
    }
}
