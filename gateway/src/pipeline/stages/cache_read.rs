//! Stage 7: `CacheRead`. Serves idempotent `GET`s from
//! `ResponseCache` on a hit, short-circuiting `RateLimit` through
//! `PaymentCapture` (each of those stages no-ops once `upstream_response`
//! is already populated). A hit still flows through to `Analytics`.

use std::sync::Arc;

use actix_web::http::Method;
use mcpay_config::CacheConfig;

use crate::cache::{cache_key, ResponseCache};
use crate::context::{RequestContext, UpstreamResponse};
use crate::pipeline::stages::mirror::mirror;
use crate::pipeline::{Stage, StageOutcome};

pub struct CacheReadStage {
    pub cache: Arc<ResponseCache>,
    pub cache_paid_responses: bool,
}

impl CacheReadStage {
    pub fn new(cache: Arc<ResponseCache>, config: &CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            cache,
            cache_paid_responses: config.cache_paid_responses,
        })
    }
}

#[async_trait::async_trait]
impl Stage for CacheReadStage {
    fn name(&self) -> &'static str {
        "CacheRead"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        if ctx.inbound.method != Method::GET {
            return Ok(StageOutcome::Continue);
        }

        let is_paid = ctx.tool_call.as_ref().map(|t| t.is_paid).unwrap_or(false);
        if is_paid && !self.cache_paid_responses {
            return Ok(StageOutcome::Continue);
        }

        let key = cache_key(ctx.inbound.method.as_str(), ctx.inbound.url.as_str(), &ctx.inbound.body);
        ctx.cache_key = Some(key.clone());

        if let Some(entry) = self.cache.get(&key) {
            metrics::increment_counter!("gateway.cache.hit");
            let status = actix_web::http::StatusCode::from_u16(entry.status)
                .unwrap_or(actix_web::http::StatusCode::OK);
            let response = UpstreamResponse {
                status,
                headers: entry.headers.clone(),
                body: entry.body.clone(),
                from_cache: true,
            };
            ctx.response = Some(mirror(&response, &[]));
            ctx.upstream_response = Some(response);
        } else {
            metrics::increment_counter!("gateway.cache.miss");
        }

        Ok(StageOutcome::Continue)
    }
}
