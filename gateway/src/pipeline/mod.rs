//! The pipeline runner. Stages are
//! plain values implementing the `Stage` capability; the runner is a loop
//! over an ordered `Vec<Box<dyn Stage>>`, not recursion or hidden
//! middleware magic. Stages are re-entrant and hold no per-request state
//! of their own — everything lives in `RequestContext`.

pub mod stages;

use actix_web::HttpResponse;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::errors::unhandled;

/// What a stage did with the request.
pub enum StageOutcome {
    /// Pass control to the next stage.
    Continue,
    /// Short-circuit: this response goes straight to the client, verbatim.
    Terminal(HttpResponse),
}

#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs the stage. An `Err` here means the stage itself malfunctioned
    /// (as opposed to producing a well-formed terminal error response);
    /// the runner converts it into a `500` tagged with this stage's name.
    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error>;
}

/// Owns the ordered stage list and drives one request through it.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub async fn run(&self, ctx: &mut RequestContext) -> HttpResponse {
        for stage in &self.stages {
            let outcome = stage.run(ctx).await;
            match outcome {
                Ok(StageOutcome::Continue) => continue,
                Ok(StageOutcome::Terminal(response)) => return response,
                Err(err) => {
                    vlog::error!(
                        stage = stage.name(),
                        request_id = %ctx.request_id,
                        "pipeline stage failed: {:#}",
                        err
                    );
                    return actix_web::ResponseError::error_response(&unhandled(stage.name(), err));
                }
            }
        }

        // Every stage ran to completion without producing a response or
        // error; `Upstream`/`CacheRead` is expected to have populated one.
        ctx.response.take().unwrap_or_else(|| {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "pipeline completed without producing a response",
                "stage": "pipeline",
            }))
        })
    }
}
