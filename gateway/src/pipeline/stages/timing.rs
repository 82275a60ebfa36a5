//! Stage 2: `Timing`. `RequestContext::new` already
//! stamps `started_at` at pipeline entry so every later stage (and the
//! runner's `500` path) can compute elapsed time; this stage exists as an
//! explicit pipeline position so the start timestamp is visibly part of
//! the declared stage order rather than an implicit constructor side effect.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};

pub struct TimingStage;

impl TimingStage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait::async_trait]
impl Stage for TimingStage {
    fn name(&self) -> &'static str {
        "Timing"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        vlog::trace!(request_id = %ctx.request_id, "request started");
        Ok(StageOutcome::Continue)
    }
}
