//! Stage 8: `RateLimit`. Skipped entirely for cache hits —
//! `CacheRead` having already populated `upstream_response` means no
//! upstream call is coming, so there is nothing to throttle.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};
use crate::rate_limit::RateLimitTable;

pub struct RateLimitStage {
    pub table: Arc<RateLimitTable>,
}

impl RateLimitStage {
    pub fn new(table: Arc<RateLimitTable>) -> Arc<Self> {
        Arc::new(Self { table })
    }
}

#[async_trait::async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "RateLimit"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        if ctx.upstream_response.is_some() {
            return Ok(StageOutcome::Continue);
        }
        let Some(request) = &ctx.upstream_request else {
            return Ok(StageOutcome::Continue);
        };
        let Some(host) = request.url.host_str() else {
            return Ok(StageOutcome::Continue);
        };
        self.table.acquire(host).await;
        Ok(StageOutcome::Continue)
    }
}
