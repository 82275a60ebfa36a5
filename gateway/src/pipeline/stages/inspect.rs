//! Stage 4: `Inspect`. Reads the buffered body, resolves the
//! addressed server by `publicId`, and, for a `tools/call` invocation,
//! resolves the tool and picks a pricing entry.

use std::sync::Arc;

use actix_web::ResponseError;
use mcpay_config::InspectConfig;
use serde_json::Value;

use crate::context::{PricingEntry, RequestContext, ToolCall};
use crate::errors::PipelineError;
use crate::identity::SharedStore;
use crate::pipeline::{Stage, StageOutcome};

pub struct InspectStage {
    pub store: SharedStore,
    pub config: InspectConfig,
}

impl InspectStage {
    pub fn new(store: SharedStore, config: InspectConfig) -> Arc<Self> {
        Arc::new(Self { store, config })
    }
}

/// Splits a gateway path `/mcp/:publicId/...` into `(publicId, rest)`.
fn split_gateway_path(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_start_matches('/');
    let mut parts = trimmed.splitn(3, '/');
    let prefix = parts.next()?;
    if prefix != "mcp" {
        return None;
    }
    let public_id = parts.next()?;
    if public_id.is_empty() {
        return None;
    }
    Some((public_id, parts.next().unwrap_or("")))
}

/// Pricing selection rule: only `active=true` entries are eligible;
/// prefer `network="base"`, else the first eligible entry.
fn pick_pricing(entries: &[PricingEntry]) -> Option<PricingEntry> {
    let active: Vec<&PricingEntry> = entries.iter().filter(|p| p.active).collect();
    active
        .iter()
        .find(|p| p.network == "base")
        .or_else(|| active.first())
        .map(|p| (*p).clone())
}

#[async_trait::async_trait]
impl Stage for InspectStage {
    fn name(&self) -> &'static str {
        "Inspect"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        if ctx.inbound.body.len() > self.config.max_request_body_bytes {
            let err = PipelineError::BodyTooLarge(ctx.inbound.body.len());
            return Ok(StageOutcome::Terminal(err.error_response()));
        }

        let Some((public_id, _rest)) = split_gateway_path(ctx.inbound.url.path()) else {
            return Ok(StageOutcome::Continue);
        };

        match self.store.get_server_by_public_id(public_id).await {
            Ok(Some(server)) => ctx.server = Some(server),
            Ok(None) => return Ok(StageOutcome::Continue),
            Err(err) => {
                vlog::warn!(request_id = %ctx.request_id, "store failure resolving server: {}", err);
                return Ok(StageOutcome::Continue);
            }
        }

        let is_json = ctx
            .inbound
            .header("content-type")
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        if !is_json || ctx.inbound.body.is_empty() {
            return Ok(StageOutcome::Continue);
        }

        let Ok(body): Result<Value, _> = serde_json::from_slice(&ctx.inbound.body) else {
            return Ok(StageOutcome::Continue);
        };
        if body.get("method").and_then(Value::as_str) != Some("tools/call") {
            return Ok(StageOutcome::Continue);
        }
        let Some(params) = body.get("params") else {
            return Ok(StageOutcome::Continue);
        };
        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return Ok(StageOutcome::Continue);
        };
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);

        let server = ctx.server.clone().expect("server resolved above");
        let tools = match self.store.list_tools_by_server(&server.internal_id).await {
            Ok(tools) => tools,
            Err(err) => {
                vlog::warn!(request_id = %ctx.request_id, "store failure listing tools: {}", err);
                return Ok(StageOutcome::Continue);
            }
        };
        let Some(tool) = tools.into_iter().find(|t| t.name == tool_name) else {
            return Ok(StageOutcome::Continue);
        };

        let picked = pick_pricing(&tool.pricing);
        let is_paid = picked.is_some();
        let pay_to = if is_paid {
            Some(server.receiver_address.clone())
        } else {
            None
        };

        ctx.tool_call = Some(ToolCall {
            server_public_id: server.public_id.clone(),
            tool_name: tool_name.to_string(),
            args,
            server_internal_id: Some(server.internal_id.clone()),
            tool_id: Some(tool.id.clone()),
            is_paid,
            pay_to,
            pricing: tool.pricing.clone(),
        });
        ctx.picked_pricing = picked;
        ctx.tool = Some(tool);

        Ok(StageOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(network: &str, active: bool) -> PricingEntry {
        PricingEntry {
            id: format!("p-{network}"),
            max_amount_required_raw: "50000".to_string(),
            token_decimals: 6,
            network: network.to_string(),
            asset_address: "0xabc".to_string(),
            active,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn path_splitting_extracts_public_id_and_rest() {
        assert_eq!(split_gateway_path("/mcp/srv1/rpc"), Some(("srv1", "rpc")));
        assert_eq!(split_gateway_path("/mcp/srv1"), Some(("srv1", "")));
        assert_eq!(split_gateway_path("/other/srv1"), None);
    }

    #[test]
    fn pricing_prefers_base_network() {
        let entries = vec![entry("base-sepolia", true), entry("base", true)];
        let picked = pick_pricing(&entries).unwrap();
        assert_eq!(picked.network, "base");
    }

    #[test]
    fn pricing_ignores_inactive_entries() {
        let entries = vec![entry("base", false), entry("base-sepolia", true)];
        let picked = pick_pricing(&entries).unwrap();
        assert_eq!(picked.network, "base-sepolia");
    }

    #[test]
    fn pricing_is_none_when_nothing_active() {
        let entries = vec![entry("base", false)];
        assert!(pick_pricing(&entries).is_none());
    }
}
