//! Stage 3: `JsonRpcGate`. Enforces the
//! JSON-RPC 2.0 / MCP `Accept` convention on `POST` and rejects batch and
//! notification request forms that the rest of the pipeline is not built
//! to handle (single `tools/call` per request, always expecting a reply).
//!
//! Batch/notification detection is done by deserializing into
//! `jsonrpc_core`'s own `Request`/`Call` types rather than hand-rolled
//! `serde_json::Value` shape-sniffing, the same crate the teacher's RPC
//! server uses for its request/response envelopes.

use std::sync::Arc;

use actix_web::http::Method;
use actix_web::ResponseError;
use jsonrpc_core::{Call, Request as JsonRpcRequest};

use crate::context::RequestContext;
use crate::errors::PipelineError;
use crate::pipeline::{Stage, StageOutcome};

pub struct JsonRpcGateStage;

impl JsonRpcGateStage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

fn accept_is_valid(accept: &str) -> bool {
    let tokens: Vec<String> = accept
        .split(',')
        .map(|t| t.split(';').next().unwrap_or("").trim().to_lowercase())
        .collect();
    tokens.iter().any(|t| t == "application/json" || t == "*/*")
        && tokens.iter().any(|t| t == "text/event-stream" || t == "*/*")
}

#[async_trait::async_trait]
impl Stage for JsonRpcGateStage {
    fn name(&self) -> &'static str {
        "JsonRpcGate"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        if ctx.inbound.method != Method::POST {
            return Ok(StageOutcome::Continue);
        }

        if let Some(accept) = ctx.inbound.header("accept") {
            if !accept_is_valid(accept) {
                let err = PipelineError::ClientMalformed(
                    "Accept header must include application/json and text/event-stream".to_string(),
                );
                return Ok(StageOutcome::Terminal(err.error_response()));
            }
        } else {
            let err = PipelineError::ClientMalformed("missing Accept header".to_string());
            return Ok(StageOutcome::Terminal(err.error_response()));
        }

        if ctx.inbound.body.is_empty() {
            return Ok(StageOutcome::Continue);
        }

        let Ok(request) = serde_json::from_slice::<JsonRpcRequest>(&ctx.inbound.body) else {
            // Malformed or non-JSON-RPC-shaped JSON is Inspect's concern (it
            // re-parses and treats this request as an opaque proxy call);
            // JsonRpcGate only gates shapes it can positively identify as
            // JSON-RPC.
            return Ok(StageOutcome::Continue);
        };

        match request {
            JsonRpcRequest::Batch(_) => {
                let err = PipelineError::ClientMalformed("batch JSON-RPC requests are not supported".to_string());
                Ok(StageOutcome::Terminal(err.error_response()))
            }
            JsonRpcRequest::Single(Call::Notification(_)) => {
                let err = PipelineError::ClientMalformed("JSON-RPC notifications are not supported".to_string());
                Ok(StageOutcome::Terminal(err.error_response()))
            }
            JsonRpcRequest::Single(_) => Ok(StageOutcome::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_requires_both_tokens() {
        assert!(accept_is_valid("application/json, text/event-stream"));
        assert!(accept_is_valid("text/event-stream;q=0.9, application/json"));
        assert!(!accept_is_valid("application/json"));
        assert!(!accept_is_valid("text/html"));
        assert!(accept_is_valid("*/*"));
    }
}
