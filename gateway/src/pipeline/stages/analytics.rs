//! Stage 14: `Analytics`. Records one `ToolUsage` row per
//! request. Fire-and-forget relative to the HTTP reply: a store failure
//! here is logged and never turns into an error response, since the
//! client's response was already decided by the time this stage runs.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::context::RequestContext;
use crate::identity::SharedStore;
use crate::pipeline::{Stage, StageOutcome};
use crate::store::ToolUsageRecord;

pub struct AnalyticsStage {
    pub store: SharedStore,
}

impl AnalyticsStage {
    pub fn new(store: SharedStore) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

fn response_status_label(ctx: &RequestContext) -> String {
    if let Some(upstream) = &ctx.upstream_response {
        return upstream.status.as_u16().to_string();
    }
    if let Some(response) = &ctx.response {
        if response.status() == actix_web::http::StatusCode::PAYMENT_REQUIRED {
            return "payment_failed".to_string();
        }
        return response.status().as_u16().to_string();
    }
    "unknown".to_string()
}

fn client_ip(ctx: &RequestContext) -> Option<String> {
    ctx.inbound
        .header("x-forwarded-for")
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .or_else(|| ctx.inbound.header("x-real-ip").map(str::to_string))
}

fn parsed_result(ctx: &RequestContext) -> Option<Value> {
    let upstream = ctx.upstream_response.as_ref()?;
    match serde_json::from_slice::<Value>(&upstream.body) {
        Ok(value) => Some(value),
        Err(_) => Some(json!({ "response": String::from_utf8_lossy(&upstream.body) })),
    }
}

#[async_trait::async_trait]
impl Stage for AnalyticsStage {
    fn name(&self) -> &'static str {
        "Analytics"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        let usage = ToolUsageRecord {
            tool_id: ctx.tool_call.as_ref().and_then(|t| t.tool_id.clone()),
            user_id: ctx.user.as_ref().map(|u| u.id.clone()),
            response_status: response_status_label(ctx),
            execution_time_ms: ctx.elapsed_ms(),
            ip_address: client_ip(ctx),
            user_agent: ctx.inbound.header("user-agent").map(str::to_string),
            request_data: json!({
                "toolName": ctx.tool_call.as_ref().map(|t| t.tool_name.clone()),
                "args": ctx.tool_call.as_ref().map(|t| t.args.clone()),
                "authMethod": ctx.auth_method.as_str(),
            }),
            result: parsed_result(ctx),
        };

        if let Err(err) = self.store.record_tool_usage(usage).await {
            vlog::warn!(request_id = %ctx.request_id, "failed to record tool usage: {}", err);
        }

        Ok(StageOutcome::Continue)
    }
}
