//! Stage 11: `Upstream`. Issues the upstream request (wrapped
//! in the 429-only retry policy from `retry::fetch_with_retry`) and
//! buffers the response onto the context. Skipped entirely for cache hits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::http::StatusCode;
use actix_web::ResponseError;

use crate::context::{RequestContext, UpstreamResponse};
use crate::errors::PipelineError;
use crate::pipeline::stages::retry::fetch_with_retry;
use crate::pipeline::{Stage, StageOutcome};
use crate::upstream::UpstreamClient;
use mcpay_config::{RetryConfig, UpstreamConfig};

pub struct UpstreamStage {
    pub client: Arc<dyn UpstreamClient>,
    pub retry: RetryConfig,
    pub upstream: UpstreamConfig,
}

impl UpstreamStage {
    pub fn new(client: Arc<dyn UpstreamClient>, retry: RetryConfig, upstream: UpstreamConfig) -> Arc<Self> {
        Arc::new(Self { client, retry, upstream })
    }
}

#[async_trait::async_trait]
impl Stage for UpstreamStage {
    fn name(&self) -> &'static str {
        "Upstream"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        if ctx.response.is_some() || ctx.upstream_response.is_some() {
            return Ok(StageOutcome::Continue);
        }
        let Some(request) = ctx.upstream_request.clone() else {
            return Ok(StageOutcome::Terminal(PipelineError::NotFound.error_response()));
        };

        let budget = Duration::from_millis(self.upstream.timeout_ms);
        let started = Instant::now();
        let outcome = tokio::time::timeout(budget, fetch_with_retry(self.client.as_ref(), &request, &self.retry)).await;
        metrics::histogram!("gateway.upstream.latency_ms", started.elapsed().as_millis() as f64);

        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                let body = PipelineError::UpstreamUnreachable(err.to_string()).error_response();
                return Ok(StageOutcome::Terminal(body));
            }
            Err(_) => {
                let body = PipelineError::UpstreamUnreachable("timed out".to_string()).error_response();
                return Ok(StageOutcome::Terminal(body));
            }
        };

        ctx.upstream_response = Some(UpstreamResponse {
            status: StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY),
            headers: raw.headers,
            body: raw.body,
            from_cache: false,
        });

        Ok(StageOutcome::Continue)
    }
}
