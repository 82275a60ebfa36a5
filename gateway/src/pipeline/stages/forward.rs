//! Stage 6: `Forward`. Builds the upstream URL by rebasing the
//! inbound URL onto `mcpOrigin` (scheme, host, port, path prefix) and
//! merging `mcpOrigin`'s own query parameters over the client's. No
//! network call happens here — this only finishes assembling
//! `UpstreamRequest` from the headers `BrowserHeaders` already built.

use std::sync::Arc;

use actix_web::ResponseError;

use crate::context::{RequestContext, UpstreamRequest};
use crate::errors::PipelineError;
use crate::pipeline::{Stage, StageOutcome};

pub struct ForwardStage;

impl ForwardStage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

/// Rebuilds the upstream URL: `mcpOrigin`'s scheme/host/port, its path
/// taking over where the gateway's `/mcp/:publicId` prefix left off, and
/// its query parameters overwriting any client-supplied ones with the
/// same key.
fn build_upstream_url(inbound: &url::Url, mcp_origin: &url::Url) -> Result<url::Url, url::ParseError> {
    let trimmed = inbound.path().trim_start_matches('/');
    let mut rest_segments = trimmed.splitn(3, '/');
    rest_segments.next(); // "mcp"
    rest_segments.next(); // publicId
    let rest = rest_segments.next().unwrap_or("");

    let mut upstream = mcp_origin.clone();
    let base_path = mcp_origin.path().trim_end_matches('/');
    let joined_path = if rest.is_empty() {
        base_path.to_string()
    } else {
        format!("{base_path}/{rest}")
    };
    upstream.set_path(&joined_path);

    let mut merged: Vec<(String, String)> = inbound
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    for (k, v) in mcp_origin.query_pairs() {
        merged.retain(|(existing_k, _)| existing_k != k.as_ref());
        merged.push((k.into_owned(), v.into_owned()));
    }
    if merged.is_empty() {
        upstream.set_query(None);
    } else {
        upstream
            .query_pairs_mut()
            .clear()
            .extend_pairs(merged.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(upstream)
}

#[async_trait::async_trait]
impl Stage for ForwardStage {
    fn name(&self) -> &'static str {
        "Forward"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        let Some(server) = ctx.server.clone() else {
            return Ok(StageOutcome::Terminal(PipelineError::NotFound.error_response()));
        };

        let url = match build_upstream_url(&ctx.inbound.url, &server.mcp_origin) {
            Ok(url) => url,
            Err(_) => return Ok(StageOutcome::Terminal(PipelineError::NotFound.error_response())),
        };

        let headers = ctx.outbound_headers.take().unwrap_or_default();

        ctx.upstream_request = Some(UpstreamRequest {
            url,
            method: ctx.inbound.method.clone(),
            headers,
            body: ctx.inbound.body.clone(),
        });

        Ok(StageOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuilds_path_and_merges_query_preferring_mcp_origin() {
        let inbound: url::Url = "https://gateway.example/mcp/srv1/coins/list?vs=usd&ids=btc"
            .parse()
            .unwrap();
        let origin: url::Url = "https://api.coingecko.com/api/v3?x_cg_pro_api_key=abc&vs=eur"
            .parse()
            .unwrap();

        let built = build_upstream_url(&inbound, &origin).unwrap();
        assert_eq!(built.host_str(), Some("api.coingecko.com"));
        assert_eq!(built.path(), "/api/v3/coins/list");

        let pairs: std::collections::HashMap<_, _> = built.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("vs"), Some(&"eur".to_string()));
        assert_eq!(pairs.get("ids"), Some(&"btc".to_string()));
        assert_eq!(pairs.get("x_cg_pro_api_key"), Some(&"abc".to_string()));
    }

    #[test]
    fn no_trailing_path_segment_keeps_origin_path() {
        let inbound: url::Url = "https://gateway.example/mcp/srv1".parse().unwrap();
        let origin: url::Url = "https://srv1.example/rpc".parse().unwrap();
        let built = build_upstream_url(&inbound, &origin).unwrap();
        assert_eq!(built.path(), "/rpc");
    }
}
