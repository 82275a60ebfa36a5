//! Stage 1: `AuthResolve`.

use std::sync::Arc;

use crate::identity::{SharedSessionProvider, SharedStore};
use crate::pipeline::{Stage, StageOutcome};
use crate::{context::RequestContext, identity};

pub struct AuthResolveStage {
    pub store: SharedStore,
    pub sessions: SharedSessionProvider,
}

#[async_trait::async_trait]
impl Stage for AuthResolveStage {
    fn name(&self) -> &'static str {
        "AuthResolve"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        // Inspect (stage 4) does the authoritative JSON-RPC parse, but the
        // `api_key` body field is an identity source
        // and AuthResolve runs first; parse the already-buffered body here
        // too rather than waiting on Inspect's result.
        let is_json = ctx
            .inbound
            .header("content-type")
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        let parsed_body = if is_json && !ctx.inbound.body.is_empty() {
            serde_json::from_slice::<serde_json::Value>(&ctx.inbound.body).ok()
        } else {
            None
        };

        let (user, method) = identity::resolve(
            self.store.as_ref(),
            self.sessions.as_ref(),
            &ctx.inbound,
            parsed_body.as_ref(),
        )
        .await;
        vlog::debug!(request_id = %ctx.request_id, auth_method = method.as_str(), "resolved identity");
        ctx.user = user;
        ctx.auth_method = method;
        Ok(StageOutcome::Continue)
    }
}

impl AuthResolveStage {
    pub fn new(store: SharedStore, sessions: SharedSessionProvider) -> Arc<Self> {
        Arc::new(Self { store, sessions })
    }
}
